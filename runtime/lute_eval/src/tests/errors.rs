use pretty_assertions::assert_eq;

use lute_diagnostic::CollectedDiagnostics;

use super::support::{compile, run_expect_error};
use crate::{DefaultHooks, Interpreter};

#[test]
fn unresolved_identifier() {
    let (error, diagnostics) = run_expect_error("return missing\n");
    assert!(
        error.message.contains("cannot resolve identifier 'missing'"),
        "{error}"
    );
    assert!(error.message.starts_with("1, 8: error: "), "{error}");
    assert_eq!(diagnostics.len(), 1);
}

#[test]
fn calling_a_non_callable_value() {
    let (error, _) = run_expect_error("x = 1\nx()\n");
    assert!(
        error.message.contains("cannot call 'int' as a function"),
        "{error}"
    );
}

#[test]
fn wrong_argument_count() {
    let source = "fn add(a, b) {\n  return a + b\n}\nreturn add(1)\n";
    let (error, _) = run_expect_error(source);
    assert!(
        error
            .message
            .contains("function 'add' expects 2 argument(s); got 1"),
        "{error}"
    );
}

#[test]
fn division_by_zero() {
    let (error, _) = run_expect_error("return 1 / 0\n");
    assert!(error.message.contains("division by zero"), "{error}");
}

#[test]
fn condition_must_be_a_bool() {
    let (error, _) = run_expect_error("if 1 {\n  return 2\n}\nreturn 3\n");
    assert!(
        error.message.contains("condition must be a bool; got int"),
        "{error}"
    );
}

#[test]
fn operator_type_mismatch() {
    let (error, _) = run_expect_error("return 1 + \"a\"\n");
    assert!(
        error.message.contains("cannot apply '+' to int and string"),
        "{error}"
    );
}

#[test]
fn runtime_errors_carry_a_call_stack_trace() {
    let source = "fn inner() {\n  return missing\n}\nfn outer() {\n  return inner()\n}\nreturn outer()\n";
    let (error, diagnostics) = run_expect_error(source);
    assert!(
        error.message.contains("cannot resolve identifier 'missing'"),
        "{error}"
    );
    assert!(
        error.message.contains("called from function 'outer'"),
        "{error}"
    );
    assert!(error.message.contains("called from script"), "{error}");
    // One diagnostic holding the whole trace.
    assert_eq!(diagnostics.len(), 1);
    // Innermost location first.
    assert!(error.message.starts_with("2, "), "{error}");
}

#[test]
fn first_runtime_error_stops_execution() {
    // The error path must not run later statements; the interpreter stays
    // reusable afterwards.
    let script = compile("x = missing\nx = 1\nreturn x\n");
    assert!(script.parse_errors.is_empty());
    let mut sink = CollectedDiagnostics::new();
    let mut interp = Interpreter::new(
        &script.ast,
        script.interner.clone(),
        &script.line_map,
        &mut sink,
        Box::new(DefaultHooks),
    );
    interp.enter_block(script.block, "script");
    assert!(interp.finish().is_err());
    assert_eq!(interp.state().frame_count(), 0);
    assert!(interp.state().storage.is_empty());
    drop(interp);
    assert_eq!(sink.len(), 1);

    // A later, valid invocation is unaffected by the earlier failure.
    let ok = compile("return 4\n");
    let mut sink2 = CollectedDiagnostics::new();
    let mut interp2 = Interpreter::new(
        &ok.ast,
        ok.interner.clone(),
        &ok.line_map,
        &mut sink2,
        Box::new(DefaultHooks),
    );
    interp2.enter_block(ok.block, "script");
    assert!(interp2.finish().is_ok());
    let value = interp2
        .result()
        .and_then(|instance| instance.downcast_ref::<u32>())
        .copied();
    assert_eq!(value, Some(4));
}
