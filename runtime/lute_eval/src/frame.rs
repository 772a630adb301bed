//! Call frames and breadcrumbs.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use lute_ir::{BlockId, ExprId, Name, StmtId};

use crate::object::ValueHandle;

/// A resumable activation record for one in-flight syntax node.
///
/// A breadcrumb is pushed immediately before its node begins evaluation and
/// popped immediately after it completes; the `stage` counter selects the
/// next micro-step, and partial results (a saved left operand, collected
/// call arguments, accumulated string text) live inside the breadcrumb so
/// the whole computation can be suspended between any two stages.
#[derive(Debug)]
pub enum Breadcrumb {
    /// Statement sequence; `cursor` indexes the next statement.
    Block { block: BlockId, cursor: usize },
    /// `if`: stage 0 evaluates the condition, stage 1 picks a branch,
    /// stage 2 completes.
    If { stmt: StmtId, stage: u32, marker: u32 },
    /// `while`: like `If`, but stage 2 resets to stage 0 so the condition
    /// is re-tested after each run of the body.
    While { stmt: StmtId, stage: u32, marker: u32 },
    /// Assignment: stage 0 evaluates a non-name left side, stage 1 the
    /// right side, stage 2 performs the store and rolls back temporaries.
    Assign {
        stmt: StmtId,
        stage: u32,
        marker: u32,
        saved_left: Option<ValueHandle>,
    },
    /// Bare expression statement.
    Evaluate { stmt: StmtId, stage: u32, marker: u32 },
    /// `return`: evaluates its expression, then discards the frame's
    /// remaining breadcrumbs.
    Return { stmt: StmtId, stage: u32 },
    /// Binary operator: left, then right, then dispatch.
    BinaryOp {
        expr: ExprId,
        stage: u32,
        saved_left: Option<ValueHandle>,
    },
    UnaryOp { expr: ExprId, stage: u32 },
    PropertyLookup { expr: ExprId, stage: u32 },
    /// Call: callee, then each argument, then the invocation. `stage`
    /// alternates between "evaluate sub-expression N" and "collect its
    /// result".
    Call {
        expr: ExprId,
        stage: u32,
        callee: Option<ValueHandle>,
        args: SmallVec<[ValueHandle; 4]>,
    },
    /// Interpolated string: pieces alternate literal text and embedded
    /// expressions; the rendered text accumulates in the breadcrumb.
    InterpolatedString {
        expr: ExprId,
        stage: u32,
        text: String,
    },
}

/// A per-call activation.
///
/// While a frame exists its breadcrumb stack is non-empty (the top
/// breadcrumb is the exact next unit of work); the frame is destroyed, and
/// its storage released, when the stack empties.
#[derive(Debug)]
pub struct Frame {
    /// Human-readable description for call-stack traces ("function 'fib'").
    pub desc: String,
    /// Local variables: name → handle into the shared storage stack.
    pub locals: FxHashMap<Name, ValueHandle>,
    pub crumbs: Vec<Breadcrumb>,
    /// Position in the storage stack at frame creation. Never regresses;
    /// storage above it belongs to this frame.
    pub boundary: u32,
    /// File offset of the node currently executing, for diagnostics.
    pub offset: u32,
}

impl Frame {
    pub fn new(desc: String, boundary: u32, offset: u32) -> Self {
        Frame {
            desc,
            locals: FxHashMap::default(),
            crumbs: Vec::new(),
            boundary,
            offset,
        }
    }
}
