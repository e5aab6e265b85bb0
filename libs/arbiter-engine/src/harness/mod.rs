//! Harness generation: wrap user code with a driver that calls the problem's
//! function on one example, compares the outcome and prints a verdict.
//!
//! Generation is pure text synthesis. Every generated program prints the
//! actual value, then [`SENTINEL`](crate::marker::SENTINEL), then exactly one
//! marker line, including when user code throws.

mod cpp;
mod java;
mod javascript;
mod python;

use arbiter_common::types::{Argument, Example, Language, OutputType, Problem, Value};

/// Absolute tolerance when comparing real-valued results
pub const EPSILON: f64 = 1e-5;

/// Source form of [`EPSILON`], valid in every target language
const EPSILON_LITERAL: &str = "1e-5";

/// Whitespace trimmed from both ends of captured print output and of the
/// expected text. ASCII only, so every driver trims the same characters.
pub(crate) const PRINT_TRIM: [char; 6] = [' ', '\t', '\n', '\u{b}', '\u{c}', '\r'];

pub(crate) fn trim_print(text: &str) -> &str {
    text.trim_matches(&PRINT_TRIM[..])
}

/// Generate the complete program for one example
pub fn generate(user_code: &str, example: &Example, problem: &Problem, language: Language) -> String {
    let call = HarnessCall::new(problem, example);
    match language {
        Language::JavaScript => javascript::render(user_code, &call),
        Language::Python => python::render(user_code, &call),
        Language::Java => java::render(user_code, &call),
        Language::Cpp => cpp::render(user_code, &call),
    }
}

/// What the driver has to do, independent of the target language
pub(crate) struct HarnessCall<'a> {
    pub function_name: &'a str,
    pub args: &'a [Argument],
    pub expected: &'a Value,
    pub mode: OutputType,
}

impl<'a> HarnessCall<'a> {
    pub fn new(problem: &'a Problem, example: &'a Example) -> Self {
        Self {
            function_name: &problem.function_name,
            args: &example.input,
            expected: &example.output,
            mode: problem.output_type,
        }
    }

    /// Text shown after "Expected" in FAIL lines
    pub fn expected_text(&self) -> String {
        match self.mode {
            OutputType::Return => self.expected.canonical(),
            OutputType::Print => trim_print(&self.expected.print_text()).to_string(),
        }
    }

    /// Only real-valued expectations get the epsilon comparison
    pub fn tolerant(&self) -> bool {
        matches!(self.expected, Value::Real(_))
    }
}

/// A double-quoted literal accepted by both JavaScript and Python
pub(crate) fn json_string_literal(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// A double-quoted literal for Java and C++.
/// Control characters become 3-digit octal escapes, which neither language
/// can misread as a longer sequence.
pub(crate) fn c_string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\{:03o}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Rust's shortest round-trip float form is also a valid literal in all targets
pub(crate) fn real_literal(value: f64) -> String {
    format!("{:?}", value)
}

/// Positional variable names for typed languages (`arg1`, `arg2`, ...)
pub(crate) fn arg_names(args: &[Argument]) -> Vec<String> {
    (1..=args.len()).map(|i| format!("arg{}", i)).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use arbiter_common::types::{Argument, Example, OutputType, Problem, Value};

    pub fn problem(function_name: &str, mode: OutputType, args: Vec<(&str, Value)>, output: Value) -> Problem {
        Problem {
            id: "p".to_string(),
            title: "P".to_string(),
            difficulty: None,
            description: String::new(),
            function_name: function_name.to_string(),
            output_type: mode,
            examples: vec![Example {
                input: args
                    .into_iter()
                    .map(|(name, value)| Argument::new(name, value))
                    .collect(),
                output,
                explanation: None,
            }],
            constraints: Vec::new(),
            starter_code: Default::default(),
        }
    }

    pub fn sum_problem(output: Value) -> Problem {
        problem(
            "sum",
            OutputType::Return,
            vec![("a", Value::Int(2)), ("b", Value::Int(3))],
            output,
        )
    }

    pub fn hello_problem() -> Problem {
        problem(
            "greet",
            OutputType::Print,
            vec![("name", Value::Str("World".to_string()))],
            Value::Str("Hello\n".to_string()),
        )
    }
}
