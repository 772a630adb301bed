//! Host extension points for the interpreter.

use lute_ir::{Attributes, CustomBlock, Name};

use crate::interpreter::EvalState;
use crate::object::Instance;

/// Hooks a host installs to supply names, execute custom statements and
/// post-process results.
///
/// Every method receives the mutable evaluation state: hooks may push
/// values, read locals of the current frame, or schedule a nested block on
/// the current frame's breadcrumb stack
/// (see [`EvalState::enter_block`]).
pub trait EvalHooks {
    /// Resolve a name after local variables have been checked. The returned
    /// instance becomes a temporary of the current statement.
    ///
    /// The default resolves script functions from the file's function
    /// table, so a host with no globals of its own needs no hook code.
    fn resolve_name(&mut self, state: &mut EvalState, name: Name) -> Option<Instance> {
        state.ast.lookup_function(name).map(Instance::function)
    }

    /// Execute a custom-block statement produced by a parse hook. Return an
    /// error message to fail the current invocation. To run the block's
    /// nested body, call [`EvalState::enter_block`]; it executes in the
    /// following steps.
    fn custom_block(&mut self, state: &mut EvalState, custom: &CustomBlock) -> Result<(), String> {
        let _ = state;
        let _ = custom;
        Err("custom blocks are not supported by this host".to_string())
    }

    /// Post-process the result of a bare expression statement. The result
    /// value (if any) is still live in `state.return_value`. Returning
    /// `false` fails the current invocation.
    fn on_evaluate(&mut self, state: &mut EvalState, attributes: &Attributes) -> bool {
        let _ = (state, attributes);
        true
    }

    /// Claim an assignment to `name` before the interpreter stores it.
    /// Return `true` if handled; the right-hand value is still in
    /// `state.return_value`.
    fn assign_to_local(&mut self, state: &mut EvalState, attributes: &Attributes, name: Name) -> bool {
        let _ = (state, attributes, name);
        false
    }
}

/// Hook implementation for hosts that only need script-defined functions.
#[derive(Default)]
pub struct DefaultHooks;

impl EvalHooks for DefaultHooks {}
