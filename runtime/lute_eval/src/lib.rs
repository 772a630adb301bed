//! Step-driven interpreter for the Lute scripting language.
//!
//! Execution state lives entirely on explicit, heap-resident stacks: a stack
//! of call frames, each owning a stack of breadcrumbs (resumable activation
//! records for in-flight syntax nodes) and a slice of a shared value-storage
//! stack. One [`Interpreter::step`] call performs one bounded unit of
//! progress; [`Interpreter::finish`] loops it to completion. Because nothing
//! is held on the native call stack, execution can be suspended after any
//! step, resumed arbitrarily later, or discarded outright — which is what
//! makes cooperative multitasking of many scripts possible without threads
//! or coroutines.
//!
//! Values are dynamically typed: each [`Instance`] pairs payload data with a
//! [`TypeDesc`] whose method table supplies binary/unary operators, property
//! lookup, call and printing for that kind. The embedding host adds its own
//! value kinds the same way, and extends name resolution and statement
//! execution through [`EvalHooks`].

mod builtins;
mod error;
mod frame;
mod hooks;
mod interpreter;
mod object;

#[cfg(test)]
mod tests;

pub use builtins::{
    BOOL_TYPE, BOUND_METHOD_TYPE, FUNCTION_TYPE, INT_TYPE, NATIVE_FN_TYPE, STR_TYPE,
};
pub use error::RuntimeError;
pub use frame::{Breadcrumb, Frame};
pub use hooks::{DefaultHooks, EvalHooks};
pub use interpreter::{EvalState, Interpreter, Step};
pub use object::{
    BoundMethod, CallArgs, Instance, MethodTable, NativeFn, ObjectStack, OpResult, TypeDesc,
    ValueHandle,
};
