//! The step machine.
//!
//! `step()` inspects the tail breadcrumb of the tail frame and dispatches
//! on its kind; each handler is an explicit state machine over the
//! breadcrumb's `stage`. Control returns to the caller after every bounded
//! unit of work, with the whole in-flight computation represented as data
//! on the frame and breadcrumb stacks — never on the native call stack.

use smallvec::SmallVec;
use tracing::trace;

use lute_diagnostic::{DiagnosticSink, LineMap};
use lute_ir::{Ast, BlockId, ExprId, ExprKind, FuncId, Name, SharedInterner, StmtId, StmtKind};

use crate::builtins::{BOUND_METHOD_TYPE, FUNCTION_TYPE};
use crate::error::RuntimeError;
use crate::frame::{Breadcrumb, Frame};
use crate::hooks::EvalHooks;
use crate::object::{BoundMethod, CallArgs, Instance, ObjectStack, TypeDesc, ValueHandle};

/// Outcome of one `step()` call.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Step {
    /// One bounded unit of work was performed; call again.
    Progress,
    /// No frames remain; the invocation is complete.
    Done,
}

/// Mutable evaluation state: the syntax tree being executed, the shared
/// value-storage stack, the frame stack, and the in-flight result value.
///
/// Hooks receive this to push values, inspect the current frame, or
/// schedule blocks. It belongs to exactly one interpreter instance; nothing
/// here is synchronized.
pub struct EvalState<'a> {
    pub ast: &'a Ast,
    pub(crate) interner: SharedInterner,
    pub(crate) line_map: &'a LineMap,
    pub(crate) sink: &'a mut (dyn DiagnosticSink + 'a),
    pub storage: ObjectStack,
    /// Value produced by the most recently completed expression.
    pub return_value: Option<ValueHandle>,
    pub(crate) frames: Vec<Frame>,
}

impl<'a> EvalState<'a> {
    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    pub fn instance(&self, handle: ValueHandle) -> &Instance {
        self.storage.get(handle)
    }

    /// Typed read of a value's payload.
    pub fn value<T: std::any::Any>(&self, handle: ValueHandle) -> Option<&T> {
        self.storage.get(handle).downcast_ref::<T>()
    }

    /// Push a temporary; it lives until the current statement completes.
    pub fn push_temp(&mut self, instance: Instance) -> ValueHandle {
        self.storage.push(instance)
    }

    /// Push an instance and make it the current result value.
    pub fn set_result(&mut self, instance: Instance) -> ValueHandle {
        let handle = self.storage.push(instance);
        self.return_value = Some(handle);
        handle
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Look up a local variable of the current frame.
    pub fn lookup_local(&self, name: Name) -> Option<ValueHandle> {
        self.frames.last().and_then(|f| f.locals.get(&name).copied())
    }

    /// Schedule a nested block on the current frame; it executes during the
    /// following steps. Custom-block hooks use this to run their bodies.
    pub fn enter_block(&mut self, block: BlockId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.crumbs.push(Breadcrumb::Block { block, cursor: 0 });
        }
    }

    /// Emit a diagnostic through the host's sink.
    pub fn report(&mut self, message: &str) {
        self.sink.report(message);
    }
}

/// The interpreter: evaluation state plus the host's hooks.
pub struct Interpreter<'a> {
    state: EvalState<'a>,
    hooks: Box<dyn EvalHooks + 'a>,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        ast: &'a Ast,
        interner: SharedInterner,
        line_map: &'a LineMap,
        sink: &'a mut (dyn DiagnosticSink + 'a),
        hooks: Box<dyn EvalHooks + 'a>,
    ) -> Self {
        Interpreter {
            state: EvalState {
                ast,
                interner,
                line_map,
                sink,
                storage: ObjectStack::new(),
                return_value: None,
                frames: Vec::new(),
            },
            hooks,
        }
    }

    pub fn state(&self) -> &EvalState<'a> {
        &self.state
    }

    /// Begin executing a statement block on a fresh base frame. Drive with
    /// [`step`](Self::step) or [`finish`](Self::finish).
    pub fn enter_block(&mut self, block: BlockId, desc: impl Into<String>) {
        let boundary = self.state.storage.len();
        let mut frame = Frame::new(desc.into(), boundary, 0);
        frame.crumbs.push(Breadcrumb::Block { block, cursor: 0 });
        self.state.frames.push(frame);
    }

    /// Begin a call to a script-defined function with the given argument
    /// values.
    pub fn call_function(
        &mut self,
        func: FuncId,
        args: Vec<Instance>,
    ) -> Result<(), RuntimeError> {
        let function = self.state.ast.function(func);
        let name = self.state.interner.lookup(function.name);
        if args.len() != function.params.len() {
            // A frame must exist for the error path to locate.
            let frame = Frame::new(format!("function '{name}'"), self.state.storage.len(), function.offset);
            self.state.frames.push(frame);
            return Err(self.fail(&format!(
                "function '{}' expects {} argument(s); got {}",
                name,
                function.params.len(),
                args.len()
            )));
        }
        let boundary = self.state.storage.len();
        let mut frame = Frame::new(format!("function '{name}'"), boundary, function.offset);
        for (param, instance) in function.params.iter().zip(args) {
            let handle = self.state.storage.push(instance);
            frame.locals.insert(*param, handle);
        }
        frame.crumbs.push(Breadcrumb::Block {
            block: function.body,
            cursor: 0,
        });
        self.state.frames.push(frame);
        Ok(())
    }

    /// The result value left by the last completed invocation, if any.
    pub fn result(&self) -> Option<&Instance> {
        self.state
            .return_value
            .map(|handle| self.state.storage.get(handle))
    }

    /// Discard all frames and storage. Always safe: no state lives outside
    /// the explicit stacks.
    pub fn cancel(&mut self) {
        self.state.frames.clear();
        self.state.storage.release_to(0);
        self.state.return_value = None;
    }

    /// Perform one bounded unit of work.
    pub fn step(&mut self) -> Result<Step, RuntimeError> {
        let Some(frame) = self.state.frames.last() else {
            return Ok(Step::Done);
        };
        if frame.crumbs.is_empty() {
            self.teardown_frame();
            return Ok(Step::Progress);
        }

        let crumb = {
            let frame = self.top_frame_mut();
            let Some(crumb) = frame.crumbs.pop() else {
                unreachable!("frame with empty breadcrumb stack survived teardown");
            };
            crumb
        };
        match crumb {
            Breadcrumb::Block { block, cursor } => self.step_block(block, cursor)?,
            Breadcrumb::If {
                stmt,
                stage,
                marker,
            } => self.step_if(stmt, stage, marker)?,
            Breadcrumb::While {
                stmt,
                stage,
                marker,
            } => self.step_while(stmt, stage, marker)?,
            Breadcrumb::Assign {
                stmt,
                stage,
                marker,
                saved_left,
            } => self.step_assign(stmt, stage, marker, saved_left)?,
            Breadcrumb::Evaluate {
                stmt,
                stage,
                marker,
            } => self.step_evaluate(stmt, stage, marker)?,
            Breadcrumb::Return { stmt, stage } => self.step_return(stmt, stage)?,
            Breadcrumb::BinaryOp {
                expr,
                stage,
                saved_left,
            } => self.step_binary(expr, stage, saved_left)?,
            Breadcrumb::UnaryOp { expr, stage } => self.step_unary(expr, stage)?,
            Breadcrumb::PropertyLookup { expr, stage } => self.step_property(expr, stage)?,
            Breadcrumb::Call {
                expr,
                stage,
                callee,
                args,
            } => self.step_call(expr, stage, callee, args)?,
            Breadcrumb::InterpolatedString { expr, stage, text } => {
                self.step_string(expr, stage, text)?;
            }
        }
        Ok(Step::Progress)
    }

    /// Loop [`step`](Self::step) until all frames have emptied.
    pub fn finish(&mut self) -> Result<(), RuntimeError> {
        loop {
            if self.step()? == Step::Done {
                return Ok(());
            }
        }
    }

    // Statement handlers

    fn step_block(&mut self, block: BlockId, cursor: usize) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let stmts = &ast.block(block).stmts;
        if cursor >= stmts.len() {
            // Block complete; the crumb stays popped. If it was the frame's
            // last, teardown happens on the next step.
            return Ok(());
        }
        let stmt = stmts[cursor];
        self.push(Breadcrumb::Block {
            block,
            cursor: cursor + 1,
        });
        self.begin_stmt(stmt)
    }

    fn begin_stmt(&mut self, stmt: StmtId) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let node = ast.stmt(stmt);
        self.top_frame_mut().offset = node.offset;
        match &node.kind {
            StmtKind::If { .. } => self.push(Breadcrumb::If {
                stmt,
                stage: 0,
                marker: 0,
            }),
            StmtKind::While { .. } => self.push(Breadcrumb::While {
                stmt,
                stage: 0,
                marker: 0,
            }),
            StmtKind::Assign { .. } => self.push(Breadcrumb::Assign {
                stmt,
                stage: 0,
                marker: 0,
                saved_left: None,
            }),
            StmtKind::Evaluate { .. } => self.push(Breadcrumb::Evaluate {
                stmt,
                stage: 0,
                marker: 0,
            }),
            StmtKind::Return { .. } => self.push(Breadcrumb::Return { stmt, stage: 0 }),
            StmtKind::Custom(custom) => {
                let result = self.hooks.custom_block(&mut self.state, custom);
                self.state.return_value = None;
                if let Err(message) = result {
                    return Err(self.fail(&message));
                }
            }
        }
        Ok(())
    }

    fn step_if(&mut self, stmt: StmtId, stage: u32, marker: u32) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let StmtKind::If {
            condition,
            true_block,
            false_block,
        } = &ast.stmt(stmt).kind
        else {
            unreachable!("if breadcrumb on a non-if statement");
        };
        match stage {
            0 => {
                let marker = self.state.storage.len();
                self.push(Breadcrumb::If {
                    stmt,
                    stage: 1,
                    marker,
                });
                self.begin_expr(*condition)
            }
            1 => {
                let truth = self.take_condition()?;
                self.state.storage.release_to(marker);
                self.push(Breadcrumb::If {
                    stmt,
                    stage: 2,
                    marker,
                });
                let chosen = if truth {
                    Some(*true_block)
                } else {
                    *false_block
                };
                if let Some(block) = chosen {
                    self.push(Breadcrumb::Block { block, cursor: 0 });
                }
                Ok(())
            }
            _ => Ok(()), // Stage 2: the branch finished; the crumb pops.
        }
    }

    fn step_while(&mut self, stmt: StmtId, stage: u32, marker: u32) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let StmtKind::While { condition, body } = &ast.stmt(stmt).kind else {
            unreachable!("while breadcrumb on a non-while statement");
        };
        match stage {
            0 => {
                let marker = self.state.storage.len();
                self.push(Breadcrumb::While {
                    stmt,
                    stage: 1,
                    marker,
                });
                self.begin_expr(*condition)
            }
            1 => {
                let truth = self.take_condition()?;
                self.state.storage.release_to(marker);
                if truth {
                    self.push(Breadcrumb::While {
                        stmt,
                        stage: 2,
                        marker,
                    });
                    self.push(Breadcrumb::Block {
                        block: *body,
                        cursor: 0,
                    });
                }
                // Condition false: the crumb pops and the loop ends.
                Ok(())
            }
            _ => {
                // The body finished; re-test the condition.
                self.push(Breadcrumb::While {
                    stmt,
                    stage: 0,
                    marker,
                });
                Ok(())
            }
        }
    }

    fn step_assign(
        &mut self,
        stmt: StmtId,
        stage: u32,
        marker: u32,
        saved_left: Option<ValueHandle>,
    ) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let StmtKind::Assign { left, right, .. } = &ast.stmt(stmt).kind else {
            unreachable!("assign breadcrumb on a non-assign statement");
        };
        let left_is_name = matches!(ast.expr(*left).kind, ExprKind::NameLookup(_));
        match stage {
            0 => {
                let marker = self.state.storage.len();
                self.push(Breadcrumb::Assign {
                    stmt,
                    stage: 1,
                    marker,
                    saved_left: None,
                });
                if left_is_name {
                    // A plain name resolves directly to a storage slot; it
                    // is never evaluated.
                    Ok(())
                } else {
                    self.begin_expr(*left)
                }
            }
            1 => {
                let saved_left = if left_is_name {
                    None
                } else {
                    Some(self.take_value()?)
                };
                self.push(Breadcrumb::Assign {
                    stmt,
                    stage: 2,
                    marker,
                    saved_left,
                });
                self.begin_expr(*right)
            }
            _ => self.finish_assign(stmt, marker, saved_left),
        }
    }

    /// Stage 2 of an assignment: perform the store, then roll back
    /// temporaries above the statement marker.
    fn finish_assign(
        &mut self,
        stmt: StmtId,
        marker: u32,
        saved_left: Option<ValueHandle>,
    ) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let StmtKind::Assign {
            left, attributes, ..
        } = &ast.stmt(stmt).kind
        else {
            unreachable!("assign breadcrumb on a non-assign statement");
        };
        let rv = self.take_value()?;

        if let ExprKind::NameLookup(name) = ast.expr(*left).kind {
            self.state.return_value = Some(rv);
            if self.hooks.assign_to_local(&mut self.state, attributes, name) {
                self.state.return_value = None;
                self.state.storage.release_to(marker);
                return Ok(());
            }
            self.state.return_value = None;

            let existing = self.state.lookup_local(name);
            if let Some(existing) = existing {
                if rv.slot != existing.slot {
                    // Overwrite the existing local in place.
                    let instance = self.claim_value(rv, marker);
                    let handle = self.state.storage.store(existing.slot, instance);
                    self.top_frame_mut().locals.insert(name, handle);
                }
                self.state.storage.release_to(marker);
            } else {
                let handle = if self.state.storage.is_top(rv) && rv.slot >= marker {
                    // Promote the fresh temporary into a permanent slot:
                    // everything between the marker and the value goes, the
                    // value itself moves down without a copy.
                    self.state.storage.release_keep_top(marker)
                } else {
                    let instance = self.state.storage.get(rv).clone_instance();
                    self.state.storage.release_to(marker);
                    self.state.storage.push(instance)
                };
                self.top_frame_mut().locals.insert(name, handle);
            }
        } else {
            // Store through the evaluated left-hand handle.
            let Some(dest) = saved_left else {
                return Err(self.fail("assignment target produced no value"));
            };
            if dest.slot != rv.slot {
                let instance = self.claim_value(rv, marker);
                self.state.storage.store(dest.slot, instance);
            }
            self.state.storage.release_to(marker);
        }
        Ok(())
    }

    /// Take ownership of the value behind `rv`: move it off the stack when
    /// it is the top temporary, copy it otherwise.
    fn claim_value(&mut self, rv: ValueHandle, marker: u32) -> Instance {
        if self.state.storage.is_top(rv) && rv.slot >= marker {
            match self.state.storage.pop() {
                Some(instance) => instance,
                None => unreachable!("is_top implies a poppable instance"),
            }
        } else {
            self.state.storage.get(rv).clone_instance()
        }
    }

    fn step_evaluate(&mut self, stmt: StmtId, stage: u32, marker: u32) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let StmtKind::Evaluate { expr, attributes } = &ast.stmt(stmt).kind else {
            unreachable!("evaluate breadcrumb on a non-evaluate statement");
        };
        match stage {
            0 => {
                let marker = self.state.storage.len();
                self.push(Breadcrumb::Evaluate {
                    stmt,
                    stage: 1,
                    marker,
                });
                self.begin_expr(*expr)
            }
            _ => {
                let ok = self.hooks.on_evaluate(&mut self.state, attributes);
                self.state.return_value = None;
                self.state.storage.release_to(marker);
                if ok {
                    Ok(())
                } else {
                    Err(self.fail("expression statement rejected by host"))
                }
            }
        }
    }

    fn step_return(&mut self, stmt: StmtId, stage: u32) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let StmtKind::Return { expr } = &ast.stmt(stmt).kind else {
            unreachable!("return breadcrumb on a non-return statement");
        };
        if stage == 0 {
            self.push(Breadcrumb::Return { stmt, stage: 1 });
            self.begin_expr(*expr)
        } else {
            // Discard the frame's remaining breadcrumbs; teardown (with
            // return-value fixup) happens on the next step.
            self.top_frame_mut().crumbs.clear();
            Ok(())
        }
    }

    // Expression handlers

    /// Start evaluating an expression: leaves complete immediately into
    /// `return_value`; compound nodes push their breadcrumb.
    fn begin_expr(&mut self, expr: ExprId) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let node = ast.expr(expr);
        self.top_frame_mut().offset = node.offset;
        match node.kind {
            ExprKind::NameLookup(name) => {
                if let Some(handle) = self.state.lookup_local(name) {
                    self.state.return_value = Some(handle);
                    return Ok(());
                }
                match self.hooks.resolve_name(&mut self.state, name) {
                    Some(instance) => {
                        self.state.set_result(instance);
                        Ok(())
                    }
                    None => {
                        let text = self.state.interner.lookup(name);
                        Err(self.fail(&format!("cannot resolve identifier '{text}'")))
                    }
                }
            }
            ExprKind::IntLiteral(value) => {
                self.state.set_result(Instance::int(value));
                Ok(())
            }
            ExprKind::InterpolatedString(_) => {
                self.push(Breadcrumb::InterpolatedString {
                    expr,
                    stage: 0,
                    text: String::new(),
                });
                Ok(())
            }
            ExprKind::PropertyLookup { .. } => {
                self.push(Breadcrumb::PropertyLookup { expr, stage: 0 });
                Ok(())
            }
            ExprKind::BinaryOp { .. } => {
                self.push(Breadcrumb::BinaryOp {
                    expr,
                    stage: 0,
                    saved_left: None,
                });
                Ok(())
            }
            ExprKind::UnaryOp { .. } => {
                self.push(Breadcrumb::UnaryOp { expr, stage: 0 });
                Ok(())
            }
            ExprKind::Call { .. } => {
                self.push(Breadcrumb::Call {
                    expr,
                    stage: 0,
                    callee: None,
                    args: SmallVec::new(),
                });
                Ok(())
            }
        }
    }

    fn step_binary(
        &mut self,
        expr: ExprId,
        stage: u32,
        saved_left: Option<ValueHandle>,
    ) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let ExprKind::BinaryOp { op, left, right } = ast.expr(expr).kind else {
            unreachable!("binary breadcrumb on a non-binary expression");
        };
        match stage {
            0 => {
                self.push(Breadcrumb::BinaryOp {
                    expr,
                    stage: 1,
                    saved_left: None,
                });
                self.begin_expr(left)
            }
            1 => {
                let left_value = self.take_value()?;
                self.push(Breadcrumb::BinaryOp {
                    expr,
                    stage: 2,
                    saved_left: Some(left_value),
                });
                self.begin_expr(right)
            }
            _ => {
                let Some(left_value) = saved_left else {
                    return Err(self.fail("operator lost its left operand"));
                };
                let right_value = self.take_value()?;
                let Some(dispatch) = left_value.ty.methods.binary_op else {
                    return Err(self.fail(&format!(
                        "cannot apply '{}' to {}",
                        op.symbol(),
                        left_value.ty.name
                    )));
                };
                match dispatch(&mut self.state, op, left_value, right_value) {
                    Ok(instance) => {
                        self.state.set_result(instance);
                        Ok(())
                    }
                    Err(message) => Err(self.fail(&message)),
                }
            }
        }
    }

    fn step_unary(&mut self, expr: ExprId, stage: u32) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let ExprKind::UnaryOp { op, operand } = ast.expr(expr).kind else {
            unreachable!("unary breadcrumb on a non-unary expression");
        };
        if stage == 0 {
            self.push(Breadcrumb::UnaryOp { expr, stage: 1 });
            self.begin_expr(operand)
        } else {
            let value = self.take_value()?;
            let Some(dispatch) = value.ty.methods.unary_op else {
                return Err(self.fail(&format!(
                    "cannot apply '{}' to {}",
                    op.symbol(),
                    value.ty.name
                )));
            };
            match dispatch(&mut self.state, op, value) {
                Ok(instance) => {
                    self.state.set_result(instance);
                    Ok(())
                }
                Err(message) => Err(self.fail(&message)),
            }
        }
    }

    fn step_property(&mut self, expr: ExprId, stage: u32) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let ExprKind::PropertyLookup { object, name } = ast.expr(expr).kind else {
            unreachable!("property breadcrumb on a non-property expression");
        };
        if stage == 0 {
            self.push(Breadcrumb::PropertyLookup { expr, stage: 1 });
            self.begin_expr(object)
        } else {
            let value = self.take_value()?;
            let Some(dispatch) = value.ty.methods.property_lookup else {
                let property = self.state.interner.lookup(name);
                return Err(self.fail(&format!(
                    "cannot look up property '{property}' on {}",
                    value.ty.name
                )));
            };
            match dispatch(&mut self.state, value, name) {
                Ok(instance) => {
                    self.state.set_result(instance);
                    Ok(())
                }
                Err(message) => Err(self.fail(&message)),
            }
        }
    }

    fn step_call(
        &mut self,
        expr: ExprId,
        stage: u32,
        callee: Option<ValueHandle>,
        mut args: SmallVec<[ValueHandle; 4]>,
    ) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let ExprKind::Call {
            callee: callee_expr,
            args: arg_range,
        } = ast.expr(expr).kind
        else {
            unreachable!("call breadcrumb on a non-call expression");
        };
        let arg_ids = ast.args(arg_range);
        let arg_count = arg_ids.len() as u32;

        match stage {
            0 => {
                self.push(Breadcrumb::Call {
                    expr,
                    stage: 1,
                    callee: None,
                    args,
                });
                self.begin_expr(callee_expr)
            }
            1 => {
                let handle = self.take_value()?;
                self.push(Breadcrumb::Call {
                    expr,
                    stage: 2,
                    callee: Some(handle),
                    args,
                });
                Ok(())
            }
            s if s - 2 < 2 * arg_count => {
                let k = s - 2;
                let index = (k / 2) as usize;
                if k % 2 == 0 {
                    self.push(Breadcrumb::Call {
                        expr,
                        stage: s + 1,
                        callee,
                        args,
                    });
                    self.begin_expr(arg_ids[index])
                } else {
                    // Arguments pass by value: a result that is not the top
                    // temporary is copied onto the stack.
                    let rv = self.take_value()?;
                    let handle = if self.state.storage.is_top(rv) {
                        rv
                    } else {
                        let instance = self.state.storage.get(rv).clone_instance();
                        self.state.storage.push(instance)
                    };
                    args.push(handle);
                    self.push(Breadcrumb::Call {
                        expr,
                        stage: s + 1,
                        callee,
                        args,
                    });
                    Ok(())
                }
            }
            s if s - 2 == 2 * arg_count => self.invoke(expr, s + 1, callee, args),
            _ => Ok(()), // Finish stage: a script call returned; rv is set.
        }
    }

    /// Dispatch a call once the callee and all arguments are evaluated.
    fn invoke(
        &mut self,
        expr: ExprId,
        finish_stage: u32,
        callee: Option<ValueHandle>,
        args: SmallVec<[ValueHandle; 4]>,
    ) -> Result<(), RuntimeError> {
        let Some(mut callee) = callee else {
            return Err(self.fail("call lost its callee"));
        };

        // Unwrap bound methods into receiver + function.
        let mut receiver = None;
        if TypeDesc::same(callee.ty, &BOUND_METHOD_TYPE) {
            let Some(bound) = self.state.value::<BoundMethod>(callee).copied() else {
                return Err(self.fail("corrupt bound method"));
            };
            receiver = Some(bound.receiver);
            callee = bound.func;
        }

        if TypeDesc::same(callee.ty, &FUNCTION_TYPE) {
            if receiver.is_some() {
                return Err(self.fail("script functions cannot be called as bound methods"));
            }
            let Some(&func_id) = self.state.value::<FuncId>(callee) else {
                return Err(self.fail("corrupt function value"));
            };
            let ast = self.state.ast;
            let function = ast.function(func_id);
            let name = self.state.interner.lookup(function.name);
            if args.len() != function.params.len() {
                return Err(self.fail(&format!(
                    "function '{}' expects {} argument(s); got {}",
                    name,
                    function.params.len(),
                    args.len()
                )));
            }
            trace!(function = %name, "call");

            // The caller's crumb waits at the finish stage while the new
            // frame runs; no native recursion is introduced.
            self.push(Breadcrumb::Call {
                expr,
                stage: finish_stage,
                callee: Some(callee),
                args: SmallVec::new(),
            });
            let boundary = self.state.storage.len();
            let mut frame = Frame::new(format!("function '{name}'"), boundary, function.offset);
            for (param, handle) in function.params.iter().zip(args.iter()) {
                frame.locals.insert(*param, *handle);
            }
            frame.crumbs.push(Breadcrumb::Block {
                block: function.body,
                cursor: 0,
            });
            self.state.frames.push(frame);
            Ok(())
        } else if let Some(dispatch) = callee.ty.methods.call {
            let call_args = CallArgs {
                receiver,
                args: &args,
            };
            match dispatch(&mut self.state, callee, &call_args) {
                Ok(instance) => {
                    self.state.set_result(instance);
                    Ok(())
                }
                Err(message) => Err(self.fail(&message)),
            }
        } else {
            Err(self.fail(&format!("cannot call '{}' as a function", callee.ty.name)))
        }
    }

    fn step_string(&mut self, expr: ExprId, stage: u32, text: String) -> Result<(), RuntimeError> {
        let ast = self.state.ast;
        let ExprKind::InterpolatedString(range) = ast.expr(expr).kind else {
            unreachable!("string breadcrumb on a non-string expression");
        };
        let pieces = ast.pieces(range);
        let index = (stage / 2) as usize;

        if index >= pieces.len() {
            // All pieces rendered: the finished string becomes the result.
            self.state.set_result(Instance::string(text));
            return Ok(());
        }

        let piece = pieces[index];
        if stage % 2 == 0 {
            let mut text = text;
            self.state
                .interner
                .with_str(piece.literal, |s| text.push_str(s));
            if let Some(embed) = piece.embed {
                self.push(Breadcrumb::InterpolatedString {
                    expr,
                    stage: stage + 1,
                    text,
                });
                self.begin_expr(embed)
            } else {
                self.push(Breadcrumb::InterpolatedString {
                    expr,
                    stage: stage + 2,
                    text,
                });
                Ok(())
            }
        } else {
            let rv = self.take_value()?;
            let Some(print) = rv.ty.methods.print else {
                return Err(self.fail(&format!(
                    "cannot interpolate a value of type {}",
                    rv.ty.name
                )));
            };
            let mut text = text;
            print(&self.state, rv, &mut text);
            self.push(Breadcrumb::InterpolatedString {
                expr,
                stage: stage + 1,
                text,
            });
            Ok(())
        }
    }

    // Frame lifecycle and failure path

    /// Destroy the finished top frame: release its storage slice in reverse
    /// order, keeping a result value that sits on top of the stack alive by
    /// re-binding it at the collapsed boundary (no copy).
    fn teardown_frame(&mut self) {
        let Some(frame) = self.state.frames.pop() else {
            return;
        };
        trace!(frame = %frame.desc, "frame complete");
        let boundary = frame.boundary;
        let storage = &mut self.state.storage;
        match self.state.return_value {
            Some(rv) if storage.len() > boundary && storage.is_top(rv) => {
                let handle = storage.release_keep_top(boundary);
                self.state.return_value = Some(handle);
            }
            Some(rv) if rv.slot >= boundary => {
                // The result is a mid-frame value about to be released;
                // move a copy below the collapsing boundary.
                let instance = storage.get(rv).clone_instance();
                storage.release_to(boundary);
                let handle = storage.push(instance);
                self.state.return_value = Some(handle);
            }
            _ => storage.release_to(boundary),
        }
    }

    /// Single failure path: report a location-tagged message with a
    /// call-stack trace, unwind the whole invocation, and leave the
    /// interpreter reusable.
    fn fail(&mut self, message: &str) -> RuntimeError {
        let mut text = match self.state.frames.last() {
            Some(frame) => format!(
                "{}: error: {message}",
                self.state.line_map.locate(frame.offset)
            ),
            None => format!("error: {message}"),
        };
        for frame in self.state.frames.iter().rev().skip(1) {
            let location = self.state.line_map.locate(frame.offset);
            text.push_str(&format!("\n{location}: called from {}", frame.desc));
        }
        self.state.sink.report(&text);

        let base = self.state.frames.first().map_or(0, |f| f.boundary);
        self.state.frames.clear();
        self.state.storage.release_to(base);
        self.state.return_value = None;
        RuntimeError::new(text)
    }

    // Small helpers

    fn push(&mut self, crumb: Breadcrumb) {
        self.top_frame_mut().crumbs.push(crumb);
    }

    fn top_frame_mut(&mut self) -> &mut Frame {
        let Some(frame) = self.state.frames.last_mut() else {
            unreachable!("no active frame");
        };
        frame
    }

    fn take_value(&mut self) -> Result<ValueHandle, RuntimeError> {
        match self.state.return_value.take() {
            Some(handle) => Ok(handle),
            None => Err(self.fail("expression produced no value")),
        }
    }

    fn take_condition(&mut self) -> Result<bool, RuntimeError> {
        let handle = self.take_value()?;
        match self.state.value::<bool>(handle) {
            Some(truth) => Ok(*truth),
            None => Err(self.fail(&format!(
                "condition must be a bool; got {}",
                handle.ty.name
            ))),
        }
    }
}
