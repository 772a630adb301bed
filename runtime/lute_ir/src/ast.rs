//! Flat arena syntax tree.
//!
//! Nodes reference each other through `u32` index newtypes instead of boxes:
//! the [`Ast`] owns every expression, statement, block and function of one
//! parsed file in contiguous vectors. Argument and string-piece lists are
//! ranges into flat side arrays. This keeps tree nodes `Copy`-sized, and it
//! lets the interpreter's suspended state hold plain ids with no lifetime
//! ties into the tree.

use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;

use crate::{Attributes, Name};

macro_rules! arena_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

arena_id!(
    /// Index into [`Ast::exprs`].
    ExprId
);
arena_id!(
    /// Index into [`Ast::stmts`].
    StmtId
);
arena_id!(
    /// Index into [`Ast::blocks`].
    BlockId
);
arena_id!(
    /// Index into [`Ast::functions`].
    FuncId
);

/// Contiguous run of call arguments in [`Ast::arg_lists`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ExprRange {
    pub start: u32,
    pub len: u32,
}

/// Contiguous run of string pieces in [`Ast::pieces`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PieceRange {
    pub start: u32,
    pub len: u32,
}

/// Binary operators, in dispatch order.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Multiply,
    Divide,
    Modulo,
    Add,
    Subtract,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    DoubleEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    /// Precedence level; smaller binds tighter.
    pub fn precedence(self) -> u32 {
        match self {
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 3,
            BinaryOp::Add | BinaryOp::Subtract => 4,
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => 6,
            BinaryOp::DoubleEqual => 7,
            BinaryOp::LogicalAnd => 11,
            BinaryOp::LogicalOr => 12,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::DoubleEqual => "==",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }
}

/// Unary operators. All bind at precedence 2.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Negate,
    LogicalNot,
    BitComplement,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitComplement => "~",
        }
    }
}

/// Expression node.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    /// File offset of the token that introduced this node.
    pub offset: u32,
}

/// Expression variants. Children are arena indices.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ExprKind {
    /// Identifier reference.
    NameLookup(Name),
    /// Integer literal.
    IntLiteral(u32),
    /// Interpolated string: literal pieces with optional embedded
    /// expressions.
    InterpolatedString(PieceRange),
    /// `object.name`
    PropertyLookup { object: ExprId, name: Name },
    /// `left op right`
    BinaryOp {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    /// `op operand`
    UnaryOp { op: UnaryOp, operand: ExprId },
    /// `callee(args...)`
    Call { callee: ExprId, args: ExprRange },
}

/// One segment of an interpolated string: literal text (possibly empty)
/// followed by an optional embedded expression.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct StringPiece {
    pub literal: Name,
    pub embed: Option<ExprId>,
}

/// Statement node.
pub struct Stmt {
    pub kind: StmtKind,
    /// File offset of the token that introduced this node.
    pub offset: u32,
}

/// Statement variants.
pub enum StmtKind {
    If {
        condition: ExprId,
        true_block: BlockId,
        false_block: Option<BlockId>,
    },
    While {
        condition: ExprId,
        body: BlockId,
    },
    Assign {
        left: ExprId,
        right: ExprId,
        attributes: Attributes,
    },
    Evaluate {
        expr: ExprId,
        attributes: Attributes,
    },
    Return {
        expr: ExprId,
    },
    Custom(CustomBlock),
}

impl fmt::Debug for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {}", self.kind, self.offset)
    }
}

impl fmt::Debug for StmtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StmtKind::If {
                condition,
                true_block,
                false_block,
            } => f
                .debug_struct("If")
                .field("condition", condition)
                .field("true_block", true_block)
                .field("false_block", false_block)
                .finish(),
            StmtKind::While { condition, body } => f
                .debug_struct("While")
                .field("condition", condition)
                .field("body", body)
                .finish(),
            StmtKind::Assign { left, right, .. } => f
                .debug_struct("Assign")
                .field("left", left)
                .field("right", right)
                .finish(),
            StmtKind::Evaluate { expr, .. } => {
                f.debug_struct("Evaluate").field("expr", expr).finish()
            }
            StmtKind::Return { expr } => f.debug_struct("Return").field("expr", expr).finish(),
            StmtKind::Custom(custom) => f.debug_tuple("Custom").field(custom).finish(),
        }
    }
}

/// Host-recognized statement outside the core grammar.
///
/// The payload is opaque to the runtime; only the host hook that produced it
/// during parsing knows how to execute it.
pub struct CustomBlock {
    /// The keyword that introduced the block.
    pub kind: Name,
    /// Host-owned payload.
    pub payload: Box<dyn Any>,
    /// Optional nested block parsed through the shared block parser.
    pub body: Option<BlockId>,
}

impl fmt::Debug for CustomBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomBlock")
            .field("kind", &self.kind)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

/// Ordered sequence of statements.
#[derive(Debug, Default)]
pub struct Block {
    pub stmts: Vec<StmtId>,
}

/// Script-defined function. Lives for the file's lifetime; call sites refer
/// to it by [`FuncId`].
#[derive(Debug)]
pub struct Function {
    pub name: Name,
    pub params: Vec<Name>,
    pub body: BlockId,
    pub offset: u32,
}

/// Arena owning the entire syntax tree of one parsed file.
#[derive(Default)]
pub struct Ast {
    pub exprs: Vec<Expr>,
    pub stmts: Vec<Stmt>,
    pub blocks: Vec<Block>,
    pub functions: Vec<Function>,
    pub pieces: Vec<StringPiece>,
    pub arg_lists: Vec<ExprId>,
    function_map: FxHashMap<Name, FuncId>,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    pub fn alloc_expr(&mut self, kind: ExprKind, offset: u32) -> ExprId {
        let id = ExprId::new(arena_index(self.exprs.len()));
        self.exprs.push(Expr { kind, offset });
        id
    }

    pub fn alloc_stmt(&mut self, kind: StmtKind, offset: u32) -> StmtId {
        let id = StmtId::new(arena_index(self.stmts.len()));
        self.stmts.push(Stmt { kind, offset });
        id
    }

    pub fn alloc_block(&mut self, block: Block) -> BlockId {
        let id = BlockId::new(arena_index(self.blocks.len()));
        self.blocks.push(block);
        id
    }

    /// Register a function and index it by name. A later definition with the
    /// same name shadows an earlier one.
    pub fn alloc_function(&mut self, function: Function) -> FuncId {
        let id = FuncId::new(arena_index(self.functions.len()));
        self.function_map.insert(function.name, id);
        self.functions.push(function);
        id
    }

    /// Append a collected piece list, returning its range.
    pub fn alloc_pieces(&mut self, pieces: Vec<StringPiece>) -> PieceRange {
        let start = arena_index(self.pieces.len());
        let len = arena_index(pieces.len());
        self.pieces.extend(pieces);
        PieceRange { start, len }
    }

    /// Append a collected argument list, returning its range.
    pub fn alloc_args(&mut self, args: Vec<ExprId>) -> ExprRange {
        let start = arena_index(self.arg_lists.len());
        let len = arena_index(args.len());
        self.arg_lists.extend(args);
        ExprRange { start, len }
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    #[inline]
    pub fn pieces(&self, range: PieceRange) -> &[StringPiece] {
        &self.pieces[range.start as usize..(range.start + range.len) as usize]
    }

    #[inline]
    pub fn args(&self, range: ExprRange) -> &[ExprId] {
        &self.arg_lists[range.start as usize..(range.start + range.len) as usize]
    }

    /// Look up a script function by name.
    pub fn lookup_function(&self, name: Name) -> Option<FuncId> {
        self.function_map.get(&name).copied()
    }
}

fn arena_index(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("arena exceeded {} nodes", u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_read_back() {
        let mut ast = Ast::new();
        let lit = ast.alloc_expr(ExprKind::IntLiteral(7), 0);
        let name = ast.alloc_expr(ExprKind::NameLookup(Name::from_raw(3)), 4);
        let sum = ast.alloc_expr(
            ExprKind::BinaryOp {
                op: BinaryOp::Add,
                left: lit,
                right: name,
            },
            2,
        );

        let ExprKind::BinaryOp { op, left, right } = ast.expr(sum).kind else {
            panic!("expected binary op");
        };
        assert_eq!(op, BinaryOp::Add);
        assert_eq!(ast.expr(left).kind, ExprKind::IntLiteral(7));
        assert_eq!(ast.expr(right).kind, ExprKind::NameLookup(Name::from_raw(3)));
    }

    #[test]
    fn arg_ranges_slice_the_flat_array() {
        let mut ast = Ast::new();
        let a = ast.alloc_expr(ExprKind::IntLiteral(1), 0);
        let b = ast.alloc_expr(ExprKind::IntLiteral(2), 2);
        let range = ast.alloc_args(vec![a, b]);
        assert_eq!(ast.args(range), &[a, b]);
    }

    #[test]
    fn later_function_shadows_earlier() {
        let mut ast = Ast::new();
        let body = ast.alloc_block(Block::default());
        let name = Name::from_raw(9);
        ast.alloc_function(Function {
            name,
            params: vec![],
            body,
            offset: 0,
        });
        let second = ast.alloc_function(Function {
            name,
            params: vec![],
            body,
            offset: 40,
        });
        assert_eq!(ast.lookup_function(name), Some(second));
    }

    #[test]
    fn precedence_table_matches_grammar() {
        assert!(BinaryOp::Multiply.precedence() < BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() < BinaryOp::LessThan.precedence());
        assert!(BinaryOp::DoubleEqual.precedence() < BinaryOp::LogicalAnd.precedence());
        assert!(BinaryOp::LogicalAnd.precedence() < BinaryOp::LogicalOr.precedence());
    }
}
