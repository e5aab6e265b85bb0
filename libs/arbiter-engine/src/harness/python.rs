// Python 3 driver

use super::{json_string_literal, real_literal, HarnessCall, EPSILON_LITERAL};
use crate::marker::SENTINEL;
use arbiter_common::types::{OutputType, Value};

fn literal(value: &Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::Real(f) => real_literal(*f),
        Value::Str(s) => json_string_literal(s),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::IntArray(items) => {
            let items: Vec<String> = items.iter().map(|n| n.to_string()).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

pub(crate) fn render(user_code: &str, call: &HarnessCall<'_>) -> String {
    let args: Vec<String> = call.args.iter().map(|a| literal(&a.value)).collect();
    let invocation = format!("{}({})", call.function_name, args.join(", "));
    let expected_text = json_string_literal(&call.expected_text());

    let body = match call.mode {
        OutputType::Return => format!(
            r#"        result = {invocation}
        expected = {expected}
        actual = _arbiter_canonical(result)
        print(actual)
        print(_ARBITER_SENTINEL)
        if _arbiter_equals(result, expected, {tolerant}):
            print("PASS")
        else:
            print("FAIL: Expected " + {expected_text} + " but got " + actual)"#,
            expected = literal(call.expected),
            tolerant = if call.tolerant() { "True" } else { "False" },
        ),
        OutputType::Print => format!(
            r#"        buffer = _arbiter_io.StringIO()
        _arbiter_sys.stdout = buffer
        try:
            {invocation}
        finally:
            _arbiter_sys.stdout = original
        actual = buffer.getvalue().strip(_ARBITER_SPACE)
        expected = {expected_text}
        print(actual)
        print(_ARBITER_SENTINEL)
        if actual == expected:
            print("PASS")
        else:
            print("FAIL: Expected " + expected + " but got " + actual)"#
        ),
    };

    format!(
        r#"import io as _arbiter_io
import json as _arbiter_json
import sys as _arbiter_sys

{user_code}

_ARBITER_SENTINEL = {sentinel}
_ARBITER_SPACE = " \t\n\x0b\x0c\r"


def _arbiter_canonical(value):
    try:
        return _arbiter_json.dumps(value, sort_keys=True, separators=(",", ":"))
    except (TypeError, ValueError):
        return repr(value)


def _arbiter_is_number(value):
    return isinstance(value, (int, float)) and not isinstance(value, bool)


def _arbiter_equals(actual, expected, tolerant):
    if isinstance(actual, (list, tuple)) and isinstance(expected, (list, tuple)):
        return len(actual) == len(expected) and all(
            _arbiter_equals(a, e, tolerant) for a, e in zip(actual, expected)
        )
    if isinstance(actual, bool) or isinstance(expected, bool):
        return isinstance(actual, bool) and isinstance(expected, bool) and actual == expected
    if _arbiter_is_number(actual) and _arbiter_is_number(expected):
        if tolerant:
            return abs(actual - expected) < {epsilon}
        return actual == expected
    if isinstance(actual, str) and isinstance(expected, str):
        return actual == expected
    return _arbiter_canonical(actual) == _arbiter_canonical(expected)


def _arbiter_main():
    original = _arbiter_sys.stdout
    try:
{body}
    except BaseException as error:
        _arbiter_sys.stdout = original
        print(_ARBITER_SENTINEL)
        print("ERROR: " + (str(error) or type(error).__name__))
    _arbiter_sys.stdout.flush()


_arbiter_main()
"#,
        sentinel = json_string_literal(SENTINEL),
        epsilon = EPSILON_LITERAL,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::test_support::*;
    use arbiter_common::types::Problem;

    fn render_for(problem: &Problem, code: &str) -> String {
        render(code, &HarnessCall::new(problem, &problem.examples[0]))
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal(&Value::Bool(true)), "True");
        assert_eq!(literal(&Value::Bool(false)), "False");
        assert_eq!(literal(&Value::IntArray(vec![1, -2])), "[1, -2]");
        assert_eq!(literal(&Value::IntArray(vec![])), "[]");
        assert_eq!(literal(&Value::Real(0.5)), "0.5");
        assert_eq!(literal(&Value::Str("it's \"x\"".to_string())), r#""it's \"x\"""#);
    }

    #[test]
    fn test_return_mode() {
        let problem = sum_problem(Value::Int(5));
        let program = render_for(&problem, "def sum(a, b):\n    return a + b");

        assert!(program.contains("\ndef sum(a, b):\n    return a + b\n"));
        assert!(program.contains("        result = sum(2, 3)\n"));
        assert!(program.contains("        expected = 5\n"));
        assert!(program.contains("if _arbiter_equals(result, expected, False):"));
        assert!(program.contains(r#"print("FAIL: Expected " + "5" + " but got " + actual)"#));
        assert!(program.ends_with("_arbiter_main()\n"));
    }

    #[test]
    fn test_bool_arguments_use_python_spelling() {
        let problem = problem(
            "check",
            OutputType::Return,
            vec![("flag", Value::Bool(false))],
            Value::Bool(true),
        );
        let program = render_for(&problem, "");
        assert!(program.contains("result = check(False)"));
        assert!(program.contains("expected = True"));
        assert!(program.contains(r#""FAIL: Expected " + "true""#));
    }

    #[test]
    fn test_real_expectation_is_tolerant() {
        let problem = sum_problem(Value::Real(2.5));
        let program = render_for(&problem, "");
        assert!(program.contains("_arbiter_equals(result, expected, True)"));
        assert!(program.contains("abs(actual - expected) < 1e-5"));
    }

    #[test]
    fn test_print_mode_swaps_stdout() {
        let problem = hello_problem();
        let program = render_for(&problem, "def greet(name):\n    print('Hello')");

        assert!(program.contains("_arbiter_sys.stdout = buffer"));
        assert!(program.contains("            greet(\"World\")\n        finally:\n            _arbiter_sys.stdout = original"));
        assert!(program.contains("actual = buffer.getvalue().strip(_ARBITER_SPACE)"));
        // Only ASCII whitespace, matching the other drivers
        assert!(program.contains(r#"_ARBITER_SPACE = " \t\n\x0b\x0c\r""#));
        assert!(program.contains("expected = \"Hello\""));
    }
}
