// JavaScript (Node) driver. Literals come straight from the canonical JSON.

use super::{json_string_literal, HarnessCall, EPSILON_LITERAL};
use crate::marker::SENTINEL;
use arbiter_common::types::OutputType;

pub(crate) fn render(user_code: &str, call: &HarnessCall<'_>) -> String {
    let args: Vec<String> = call.args.iter().map(|a| a.value.canonical()).collect();
    let invocation = format!("{}({})", call.function_name, args.join(", "));
    let expected_text = json_string_literal(&call.expected_text());

    let body = match call.mode {
        OutputType::Return => format!(
            r#"    const __arbiterResult = {invocation};
    const __arbiterExpected = {expected};
    const __arbiterActual = __arbiterCanonical(__arbiterResult);
    console.log(__arbiterActual);
    console.log(__arbiterSentinel);
    if (__arbiterEquals(__arbiterResult, __arbiterExpected, {tolerant})) {{
      console.log("PASS");
    }} else {{
      console.log("FAIL: Expected " + {expected_text} + " but got " + __arbiterActual);
    }}"#,
            expected = call.expected.canonical(),
            tolerant = call.tolerant(),
        ),
        OutputType::Print => format!(
            r#"    let __arbiterCaptured = "";
    const __arbiterLog = console.log;
    const __arbiterInfo = console.info;
    const __arbiterWrite = process.stdout.write;
    const __arbiterCapture = (...parts) => {{
      __arbiterCaptured += require("util").format(...parts) + "\n";
    }};
    console.log = __arbiterCapture;
    console.info = __arbiterCapture;
    process.stdout.write = (chunk) => {{
      __arbiterCaptured += String(chunk);
      return true;
    }};
    try {{
      {invocation};
    }} finally {{
      console.log = __arbiterLog;
      console.info = __arbiterInfo;
      process.stdout.write = __arbiterWrite;
    }}
    const __arbiterActual = __arbiterCaptured.replace(__arbiterSpace, "");
    const __arbiterExpected = {expected_text};
    console.log(__arbiterActual);
    console.log(__arbiterSentinel);
    if (__arbiterActual === __arbiterExpected) {{
      console.log("PASS");
    }} else {{
      console.log("FAIL: Expected " + __arbiterExpected + " but got " + __arbiterActual);
    }}"#
        ),
    };

    format!(
        r#"{user_code}

const __arbiterSentinel = {sentinel};
const __arbiterSpace = /^[ \t\n\v\f\r]+|[ \t\n\v\f\r]+$/g;

function __arbiterSortKeys(value) {{
  if (Array.isArray(value)) {{
    return value.map(__arbiterSortKeys);
  }}
  if (value !== null && typeof value === "object") {{
    const sorted = {{}};
    for (const key of Object.keys(value).sort()) {{
      sorted[key] = __arbiterSortKeys(value[key]);
    }}
    return sorted;
  }}
  return value;
}}

function __arbiterCanonical(value) {{
  return JSON.stringify(__arbiterSortKeys(value));
}}

function __arbiterEquals(actual, expected, tolerant) {{
  if (Array.isArray(actual) && Array.isArray(expected)) {{
    return actual.length === expected.length &&
      actual.every((item, i) => __arbiterEquals(item, expected[i], tolerant));
  }}
  if (tolerant && typeof actual === "number" && typeof expected === "number") {{
    return Math.abs(actual - expected) < {epsilon};
  }}
  if (typeof actual === typeof expected && (actual === null || typeof actual !== "object")) {{
    return actual === expected;
  }}
  return __arbiterCanonical(actual) === __arbiterCanonical(expected);
}}

(() => {{
  try {{
{body}
  }} catch (error) {{
    const message = error instanceof Error ? error.message : String(error);
    console.log(__arbiterSentinel);
    console.log("ERROR: " + message);
  }}
}})();
"#,
        sentinel = json_string_literal(SENTINEL),
        epsilon = EPSILON_LITERAL,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::test_support::*;
    use arbiter_common::types::Value;

    fn render_for(problem: &arbiter_common::types::Problem, code: &str) -> String {
        render(code, &HarnessCall::new(problem, &problem.examples[0]))
    }

    #[test]
    fn test_return_mode() {
        let problem = sum_problem(Value::Int(5));
        let program = render_for(&problem, "function sum(a, b) { return a + b; }");

        assert!(program.starts_with("function sum(a, b) { return a + b; }\n"));
        assert!(program.contains("const __arbiterResult = sum(2, 3);"));
        assert!(program.contains("const __arbiterExpected = 5;"));
        assert!(program.contains("__arbiterEquals(__arbiterResult, __arbiterExpected, false)"));
        assert!(program.contains("\"FAIL: Expected \" + \"5\" + \" but got \""));
        assert!(program.contains("const __arbiterSentinel = \"==ARBITER-VERDICT v1==\";"));
    }

    #[test]
    fn test_real_expectation_is_tolerant() {
        let problem = sum_problem(Value::Real(2.5));
        let program = render_for(&problem, "");
        assert!(program.contains("__arbiterEquals(__arbiterResult, __arbiterExpected, true)"));
        assert!(program.contains("Math.abs(actual - expected) < 1e-5"));
    }

    #[test]
    fn test_array_and_string_literals() {
        let problem = problem(
            "f",
            OutputType::Return,
            vec![
                ("nums", Value::IntArray(vec![2, 7, 11])),
                ("s", Value::Str("a\"b".to_string())),
                ("flag", Value::Bool(true)),
            ],
            Value::IntArray(vec![0, 1]),
        );
        let program = render_for(&problem, "");
        assert!(program.contains(r#"f([2,7,11], "a\"b", true)"#));
        assert!(program.contains("const __arbiterExpected = [0,1];"));
    }

    #[test]
    fn test_print_mode_captures_and_restores() {
        let problem = hello_problem();
        let program = render_for(&problem, "function greet(name) { console.log('Hello'); }");

        assert!(program.contains("console.log = __arbiterCapture;"));
        assert!(program.contains("process.stdout.write = (chunk) =>"));
        assert!(program.contains("greet(\"World\");"));
        assert!(program.contains("} finally {\n      console.log = __arbiterLog;"));
        assert!(program.contains("const __arbiterExpected = \"Hello\";"));
        assert!(program.contains("__arbiterCaptured.replace(__arbiterSpace, \"\")"));
        // String.prototype.trim would also strip U+00A0 and friends
        assert!(program.contains(r"const __arbiterSpace = /^[ \t\n\v\f\r]+|[ \t\n\v\f\r]+$/g;"));
    }
}
