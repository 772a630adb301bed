use pretty_assertions::assert_eq;

use super::support::{run_int, run_string};

#[test]
fn arithmetic_with_precedence() {
    assert_eq!(run_int("return 1 + 2 * 3\n"), 7);
    assert_eq!(run_int("return (1 + 2) * 3\n"), 9);
    assert_eq!(run_int("return 10 - 4 - 3\n"), 3);
    assert_eq!(run_int("return 7 % 4 + 10 / 2\n"), 8);
}

#[test]
fn unary_operators() {
    assert_eq!(run_int("return ~0\n"), u32::MAX);
    // Unary minus applies to the whole rest of the expression.
    assert_eq!(run_int("return -1 + 2\n"), 3u32.wrapping_neg());
}

#[test]
fn reassignment_updates_in_place() {
    assert_eq!(run_int("x = 1\nx = 2\nreturn x\n"), 2);
}

#[test]
fn assignment_from_another_local_copies() {
    assert_eq!(run_int("x = 1\ny = x\ny = y + 1\nreturn x * 10 + y\n"), 12);
}

#[test]
fn while_loop_runs_exactly_three_times() {
    assert_eq!(run_int("i = 0\nwhile i < 3 {\n  i = i + 1\n}\nreturn i\n"), 3);
}

#[test]
fn while_with_false_condition_skips_body() {
    assert_eq!(run_int("i = 9\nwhile i < 3 {\n  i = 0\n}\nreturn i\n"), 9);
}

#[test]
fn if_picks_the_right_branch() {
    assert_eq!(
        run_int("x = 1\nif x < 2 {\n  y = 10\n} else {\n  y = 20\n}\nreturn y\n"),
        10
    );
    assert_eq!(
        run_int("x = 5\nif x < 2 {\n  y = 10\n} else {\n  y = 20\n}\nreturn y\n"),
        20
    );
}

#[test]
fn if_without_else_and_false_condition() {
    assert_eq!(run_int("y = 1\nif y == 0 {\n  y = 99\n}\nreturn y\n"), 1);
}

#[test]
fn logical_operators_on_bools() {
    assert_eq!(run_int("if 1 < 2 && 2 < 3 {\n  return 1\n}\nreturn 0\n"), 1);
    assert_eq!(run_int("if 1 == 2 || 3 == 3 {\n  return 1\n}\nreturn 0\n"), 1);
    assert_eq!(run_int("if !(1 == 2) {\n  return 1\n}\nreturn 0\n"), 1);
}

#[test]
fn function_call_binds_parameters() {
    let source = "fn add(a, b) {\n  return a + b\n}\nreturn add(2, 3)\n";
    assert_eq!(run_int(source), 5);
}

#[test]
fn arguments_pass_by_value() {
    let source = "fn bump(a) {\n  a = a + 1\n  return a\n}\nx = 5\ny = bump(x)\nreturn x * 10 + y\n";
    assert_eq!(run_int(source), 56);
}

#[test]
fn recursion_terminates_with_correct_result() {
    let source = "fn fact(n) {\n  if n == 0 {\n    return 1\n  }\n  return n * fact(n - 1)\n}\nreturn fact(5)\n";
    assert_eq!(run_int(source), 120);
}

#[test]
fn deep_recursion_does_not_grow_the_native_stack() {
    // fib-style double recursion plus enough depth that a native-stack
    // walker would be in trouble long before this completes.
    let source = "fn sum(n) {\n  if n == 0 {\n    return 0\n  }\n  return n + sum(n - 1)\n}\nreturn sum(500)\n";
    assert_eq!(run_int(source), 500 * 501 / 2);
}

#[test]
fn nested_calls_evaluate_left_to_right() {
    let source = "fn pair(a, b) {\n  return a * 100 + b\n}\nreturn pair(pair(1, 2), 3)\n";
    assert_eq!(run_int(source), 10203);
}

#[test]
fn string_interpolation() {
    assert_eq!(run_string("return \"a${1 + 1}b\"\n"), "a2b");
    assert_eq!(run_string("x = 4\nreturn \"${x}${x * 2}\"\n"), "48");
    assert_eq!(run_string("return \"${1 == 1}\"\n"), "true");
}

#[test]
fn string_concatenation_and_equality() {
    assert_eq!(run_string("return \"foo\" + \"bar\"\n"), "foobar");
    assert_eq!(
        run_int("if \"a\" + \"b\" == \"ab\" {\n  return 1\n}\nreturn 0\n"),
        1
    );
}

#[test]
fn multiline_string_interpolates_across_lines() {
    let source = "x = 7\nreturn \"\"\"\nvalue: ${x}\nend\n\"\"\"\n";
    assert_eq!(run_string(source), "value: 7\nend\n");
}

#[test]
fn interpolated_string_in_function() {
    let source =
        "fn greet(n) {\n  return \"hi ${n}\"\n}\nreturn greet(3) + greet(4)\n";
    assert_eq!(run_string(source), "hi 3hi 4");
}
