//! Built-in value kinds and their method tables.
//!
//! Integers are unsigned 32-bit; logical operators live on bools; strings
//! support concatenation and equality. Script functions, native functions
//! and bound methods are values too — calls dispatch on the callee's type.

use std::any::Any;

use lute_ir::{BinaryOp, FuncId, UnaryOp};

use crate::interpreter::EvalState;
use crate::object::{
    BoundMethod, CallArgs, Instance, MethodTable, NativeFn, OpResult, TypeDesc, ValueHandle,
};

pub static INT_TYPE: TypeDesc = TypeDesc {
    name: "int",
    clone_data: int_clone,
    methods: MethodTable {
        binary_op: Some(int_binary_op),
        unary_op: Some(int_unary_op),
        property_lookup: None,
        call: None,
        print: Some(int_print),
    },
};

pub static BOOL_TYPE: TypeDesc = TypeDesc {
    name: "bool",
    clone_data: bool_clone,
    methods: MethodTable {
        binary_op: Some(bool_binary_op),
        unary_op: Some(bool_unary_op),
        property_lookup: None,
        call: None,
        print: Some(bool_print),
    },
};

pub static STR_TYPE: TypeDesc = TypeDesc {
    name: "string",
    clone_data: str_clone,
    methods: MethodTable {
        binary_op: Some(str_binary_op),
        unary_op: None,
        property_lookup: None,
        call: None,
        print: Some(str_print),
    },
};

/// Script-defined function; payload is its [`FuncId`].
pub static FUNCTION_TYPE: TypeDesc = TypeDesc {
    name: "function",
    clone_data: function_clone,
    methods: MethodTable::EMPTY,
};

pub static NATIVE_FN_TYPE: TypeDesc = TypeDesc {
    name: "native function",
    clone_data: native_clone,
    methods: MethodTable {
        call: Some(native_call),
        ..MethodTable::EMPTY
    },
};

pub static BOUND_METHOD_TYPE: TypeDesc = TypeDesc {
    name: "bound method",
    clone_data: bound_clone,
    methods: MethodTable::EMPTY,
};

impl Instance {
    pub fn int(value: u32) -> Instance {
        Instance::new(&INT_TYPE, value)
    }

    pub fn boolean(value: bool) -> Instance {
        Instance::new(&BOOL_TYPE, value)
    }

    pub fn string(value: String) -> Instance {
        Instance::new(&STR_TYPE, value)
    }

    pub fn function(func: FuncId) -> Instance {
        Instance::new(&FUNCTION_TYPE, func)
    }

    pub fn native(func: NativeFn) -> Instance {
        Instance::new(&NATIVE_FN_TYPE, func)
    }

    pub fn bound_method(receiver: ValueHandle, func: ValueHandle) -> Instance {
        Instance::new(&BOUND_METHOD_TYPE, BoundMethod { receiver, func })
    }
}

// int

fn int_clone(instance: &Instance) -> Box<dyn Any> {
    Box::new(expect_payload::<u32>(instance))
}

fn int_value(state: &EvalState, handle: ValueHandle) -> Result<u32, String> {
    state
        .value::<u32>(handle)
        .copied()
        .ok_or_else(|| format!("expected an int; got {}", handle.ty.name))
}

fn int_binary_op(
    state: &mut EvalState,
    op: BinaryOp,
    left: ValueHandle,
    right: ValueHandle,
) -> OpResult {
    let a = int_value(state, left)?;
    let b = int_value(state, right)
        .map_err(|_| mismatch(op, left, right))?;
    let result = match op {
        BinaryOp::Multiply => Instance::int(a.wrapping_mul(b)),
        BinaryOp::Divide => {
            if b == 0 {
                return Err("division by zero".to_string());
            }
            Instance::int(a / b)
        }
        BinaryOp::Modulo => {
            if b == 0 {
                return Err("modulo by zero".to_string());
            }
            Instance::int(a % b)
        }
        BinaryOp::Add => Instance::int(a.wrapping_add(b)),
        BinaryOp::Subtract => Instance::int(a.wrapping_sub(b)),
        BinaryOp::LessThan => Instance::boolean(a < b),
        BinaryOp::LessThanOrEqual => Instance::boolean(a <= b),
        BinaryOp::GreaterThan => Instance::boolean(a > b),
        BinaryOp::GreaterThanOrEqual => Instance::boolean(a >= b),
        BinaryOp::DoubleEqual => Instance::boolean(a == b),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            return Err(mismatch(op, left, right));
        }
    };
    Ok(result)
}

fn int_unary_op(state: &mut EvalState, op: UnaryOp, operand: ValueHandle) -> OpResult {
    let value = int_value(state, operand)?;
    match op {
        UnaryOp::Negate => Ok(Instance::int(value.wrapping_neg())),
        UnaryOp::BitComplement => Ok(Instance::int(!value)),
        UnaryOp::LogicalNot => Err(format!("cannot apply '{}' to int", op.symbol())),
    }
}

fn int_print(state: &EvalState, handle: ValueHandle, out: &mut String) {
    if let Some(value) = state.value::<u32>(handle) {
        out.push_str(&value.to_string());
    }
}

// bool

fn bool_clone(instance: &Instance) -> Box<dyn Any> {
    Box::new(expect_payload::<bool>(instance))
}

fn bool_value(state: &EvalState, handle: ValueHandle) -> Result<bool, String> {
    state
        .value::<bool>(handle)
        .copied()
        .ok_or_else(|| format!("expected a bool; got {}", handle.ty.name))
}

fn bool_binary_op(
    state: &mut EvalState,
    op: BinaryOp,
    left: ValueHandle,
    right: ValueHandle,
) -> OpResult {
    let a = bool_value(state, left)?;
    let b = bool_value(state, right).map_err(|_| mismatch(op, left, right))?;
    match op {
        BinaryOp::DoubleEqual => Ok(Instance::boolean(a == b)),
        BinaryOp::LogicalAnd => Ok(Instance::boolean(a && b)),
        BinaryOp::LogicalOr => Ok(Instance::boolean(a || b)),
        _ => Err(mismatch(op, left, right)),
    }
}

fn bool_unary_op(state: &mut EvalState, op: UnaryOp, operand: ValueHandle) -> OpResult {
    let value = bool_value(state, operand)?;
    match op {
        UnaryOp::LogicalNot => Ok(Instance::boolean(!value)),
        _ => Err(format!("cannot apply '{}' to bool", op.symbol())),
    }
}

fn bool_print(state: &EvalState, handle: ValueHandle, out: &mut String) {
    if let Some(value) = state.value::<bool>(handle) {
        out.push_str(if *value { "true" } else { "false" });
    }
}

// string

fn str_clone(instance: &Instance) -> Box<dyn Any> {
    match instance.downcast_ref::<String>() {
        Some(value) => Box::new(value.clone()),
        None => unreachable!("instance payload does not match its type descriptor"),
    }
}

fn str_binary_op(
    state: &mut EvalState,
    op: BinaryOp,
    left: ValueHandle,
    right: ValueHandle,
) -> OpResult {
    let a = state
        .value::<String>(left)
        .ok_or_else(|| format!("expected a string; got {}", left.ty.name))?;
    let b = state
        .value::<String>(right)
        .ok_or_else(|| mismatch(op, left, right))?;
    match op {
        BinaryOp::Add => Ok(Instance::string(format!("{a}{b}"))),
        BinaryOp::DoubleEqual => Ok(Instance::boolean(a == b)),
        _ => Err(mismatch(op, left, right)),
    }
}

fn str_print(state: &EvalState, handle: ValueHandle, out: &mut String) {
    if let Some(value) = state.value::<String>(handle) {
        out.push_str(value);
    }
}

// callables

fn function_clone(instance: &Instance) -> Box<dyn Any> {
    Box::new(expect_payload::<FuncId>(instance))
}

fn native_clone(instance: &Instance) -> Box<dyn Any> {
    Box::new(expect_payload::<NativeFn>(instance))
}

fn bound_clone(instance: &Instance) -> Box<dyn Any> {
    Box::new(expect_payload::<BoundMethod>(instance))
}

fn native_call(state: &mut EvalState, callee: ValueHandle, args: &CallArgs) -> OpResult {
    let func = *state
        .value::<NativeFn>(callee)
        .ok_or_else(|| format!("expected a native function; got {}", callee.ty.name))?;
    func(state, args)
}

// helpers

fn expect_payload<T: Any + Copy>(instance: &Instance) -> T {
    match instance.downcast_ref::<T>() {
        Some(value) => *value,
        None => unreachable!("instance payload does not match its type descriptor"),
    }
}

fn mismatch(op: BinaryOp, left: ValueHandle, right: ValueHandle) -> String {
    format!(
        "cannot apply '{}' to {} and {}",
        op.symbol(),
        left.ty.name,
        right.ty.name
    )
}
