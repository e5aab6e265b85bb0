// Java driver: user code becomes `class Solution`, driven from `public class Main`.

use super::{arg_names, c_string_literal, real_literal, HarnessCall, EPSILON_LITERAL};
use crate::java_source;
use crate::marker::SENTINEL;
use arbiter_common::types::{OutputType, Value};

/// Declared type of an argument variable
fn arg_type(value: &Value) -> &'static str {
    let wide = value.needs_wide_int();
    match value {
        Value::Int(_) if wide => "long",
        Value::Int(_) => "int",
        Value::Real(_) => "double",
        Value::Str(_) => "String",
        Value::Bool(_) => "boolean",
        Value::IntArray(_) if wide => "long[]",
        Value::IntArray(_) => "int[]",
    }
}

/// Type of the slot receiving the return value; integers are always widened
fn result_type(value: &Value) -> &'static str {
    match value {
        Value::Int(_) => "long",
        Value::Real(_) => "double",
        Value::Str(_) => "String",
        Value::Bool(_) => "boolean",
        Value::IntArray(_) => "long[]",
    }
}

fn int_literal(n: i64, wide: bool) -> String {
    if wide {
        format!("{}L", n)
    } else {
        n.to_string()
    }
}

fn literal(value: &Value, wide: bool) -> String {
    match value {
        Value::Int(n) => int_literal(*n, wide),
        Value::Real(f) => real_literal(*f),
        Value::Str(s) => c_string_literal(s),
        Value::Bool(b) => b.to_string(),
        Value::IntArray(items) => {
            let items: Vec<String> = items.iter().map(|n| int_literal(*n, wide)).collect();
            format!("{{{}}}", items.join(", "))
        }
    }
}

fn comparison(expected: &Value) -> String {
    match expected {
        Value::Int(_) | Value::Bool(_) => "result == expected".to_string(),
        Value::Real(_) => format!("Math.abs(result - expected) < {}", EPSILON_LITERAL),
        Value::Str(_) => "expected.equals(result)".to_string(),
        Value::IntArray(_) => "Arrays.equals(result, expected)".to_string(),
    }
}

/// Imports must precede the wrapping class; a bare `public class Solution`
/// would clash with the public driver class.
fn split_user_code(user_code: &str) -> (Vec<&str>, String) {
    let mut imports = Vec::new();
    let mut rest = Vec::new();
    for line in user_code.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("import ") && trimmed.ends_with(';') {
            imports.push(trimmed);
        } else {
            rest.push(line);
        }
    }
    let body = rest.join("\n");
    let body = if java_source::declares_class(&body, "Solution") {
        java_source::strip_public_types(&body)
    } else {
        let indented: Vec<String> = body
            .lines()
            .map(|line| if line.is_empty() { String::new() } else { format!("    {}", line) })
            .collect();
        format!("class Solution {{\n{}\n}}", indented.join("\n"))
    };
    (imports, body)
}

pub(crate) fn render(user_code: &str, call: &HarnessCall<'_>) -> String {
    let names = arg_names(call.args);
    let declarations: String = call
        .args
        .iter()
        .zip(&names)
        .map(|(arg, name)| {
            format!(
                "            {} {} = {};\n",
                arg_type(&arg.value),
                name,
                literal(&arg.value, arg.value.needs_wide_int())
            )
        })
        .collect();
    let invocation = format!("solution.{}({})", call.function_name, names.join(", "));
    let expected_text = c_string_literal(&call.expected_text());

    let body = match call.mode {
        OutputType::Return => {
            // Arrays go through arbiterWiden so int[] and long[] returns both fit
            let receive = match call.expected {
                Value::IntArray(_) => format!("arbiterWiden({})", invocation),
                _ => invocation,
            };
            format!(
                r#"            {result_type} result = {receive};
            {result_type} expected = {expected};
            String actual = arbiterFormat(result);
            System.out.println(actual);
            System.out.println(SENTINEL);
            if ({comparison}) {{
                System.out.println("PASS");
            }} else {{
                System.out.println("FAIL: Expected " + {expected_text} + " but got " + actual);
            }}"#,
                result_type = result_type(call.expected),
                expected = literal(call.expected, true),
                comparison = comparison(call.expected),
            )
        }
        OutputType::Print => format!(
            r#"            ByteArrayOutputStream buffer = new ByteArrayOutputStream();
            System.setOut(new PrintStream(buffer, true, "UTF-8"));
            try {{
                {invocation};
            }} finally {{
                System.out.flush();
                System.setOut(original);
            }}
            String actual = arbiterTrim(buffer.toString("UTF-8"));
            String expected = {expected_text};
            System.out.println(actual);
            System.out.println(SENTINEL);
            if (actual.equals(expected)) {{
                System.out.println("PASS");
            }} else {{
                System.out.println("FAIL: Expected " + expected + " but got " + actual);
            }}"#
        ),
    };

    let (imports, solution) = split_user_code(user_code);
    let imports: String = imports.iter().map(|line| format!("{}\n", line)).collect();

    format!(
        r#"import java.util.*;
import java.io.*;
{imports}
{solution}

public class Main {{
    static final String SENTINEL = {sentinel};

    static String arbiterQuote(String value) {{
        if (value == null) {{
            return "null";
        }}
        StringBuilder out = new StringBuilder("\"");
        for (char c : value.toCharArray()) {{
            switch (c) {{
                case '"': out.append("\\\""); break;
                case '\\': out.append("\\\\"); break;
                case '\n': out.append("\\n"); break;
                case '\r': out.append("\\r"); break;
                case '\t': out.append("\\t"); break;
                default:
                    if (c < 0x20) {{
                        out.append(String.format("\\u%04x", (int) c));
                    }} else {{
                        out.append(c);
                    }}
            }}
        }}
        return out.append('"').toString();
    }}

    static String arbiterFormat(long value) {{ return Long.toString(value); }}
    static String arbiterFormat(double value) {{ return Double.toString(value); }}
    static String arbiterFormat(boolean value) {{ return Boolean.toString(value); }}
    static String arbiterFormat(String value) {{ return arbiterQuote(value); }}

    static String arbiterFormat(long[] values) {{
        if (values == null) {{
            return "null";
        }}
        StringBuilder out = new StringBuilder("[");
        for (int i = 0; i < values.length; i++) {{
            if (i > 0) {{
                out.append(',');
            }}
            out.append(values[i]);
        }}
        return out.append(']').toString();
    }}

    static long[] arbiterWiden(int[] values) {{
        if (values == null) {{
            return null;
        }}
        long[] wide = new long[values.length];
        for (int i = 0; i < values.length; i++) {{
            wide[i] = values[i];
        }}
        return wide;
    }}

    static long[] arbiterWiden(long[] values) {{
        return values;
    }}

    static boolean arbiterSpace(char c) {{
        return c == ' ' || c == '\t' || c == '\n' || c == 11 || c == '\f' || c == '\r';
    }}

    static String arbiterTrim(String text) {{
        int begin = 0;
        int end = text.length();
        while (begin < end && arbiterSpace(text.charAt(begin))) {{
            begin++;
        }}
        while (end > begin && arbiterSpace(text.charAt(end - 1))) {{
            end--;
        }}
        return text.substring(begin, end);
    }}

    static String arbiterMessage(Throwable error) {{
        String message = error.getMessage();
        return message != null ? message : error.getClass().getSimpleName();
    }}

    public static void main(String[] args) throws Exception {{
        PrintStream original = new PrintStream(new FileOutputStream(FileDescriptor.out), true, "UTF-8");
        System.setOut(original);
        try {{
            Solution solution = new Solution();
{declarations}{body}
        }} catch (Throwable error) {{
            System.setOut(original);
            System.out.println(SENTINEL);
            System.out.println("ERROR: " + arbiterMessage(error));
        }}
        System.out.flush();
    }}
}}
"#,
        sentinel = c_string_literal(SENTINEL),
    )
}
