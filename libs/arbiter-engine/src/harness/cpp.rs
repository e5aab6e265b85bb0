// C++17 driver: user code holds free functions, `main` is generated.

use super::{arg_names, c_string_literal, real_literal, HarnessCall, EPSILON_LITERAL};
use crate::marker::SENTINEL;
use arbiter_common::types::{OutputType, Value};

fn arg_type(value: &Value) -> &'static str {
    let wide = value.needs_wide_int();
    match value {
        Value::Int(_) if wide => "long long",
        Value::Int(_) => "int",
        Value::Real(_) => "double",
        Value::Str(_) => "string",
        Value::Bool(_) => "bool",
        Value::IntArray(_) if wide => "vector<long long>",
        Value::IntArray(_) => "vector<int>",
    }
}

fn result_type(value: &Value) -> &'static str {
    match value {
        Value::Int(_) => "long long",
        Value::Real(_) => "double",
        Value::Str(_) => "string",
        Value::Bool(_) => "bool",
        Value::IntArray(_) => "vector<long long>",
    }
}

fn int_literal(n: i64, wide: bool) -> String {
    if n == i64::MIN {
        // 9223372036854775808LL itself does not fit
        "(-9223372036854775807LL - 1)".to_string()
    } else if wide {
        format!("{}LL", n)
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
        Value::Real(_) => format!("fabs(result - expected) < {}", EPSILON_LITERAL),
        _ => "result == expected".to_string(),
    }
}

pub(crate) fn render(user_code: &str, call: &HarnessCall<'_>) -> String {
    let names = arg_names(call.args);
    let declarations: String = call
        .args
        .iter()
        .zip(&names)
        .map(|(arg, name)| {
            format!(
                "        {} {} = {};\n",
                arg_type(&arg.value),
                name,
                literal(&arg.value, arg.value.needs_wide_int())
            )
        })
        .collect();
    let invocation = format!("{}({})", call.function_name, names.join(", "));
    let expected_text = c_string_literal(&call.expected_text());

    let body = match call.mode {
        OutputType::Return => {
            // Copy through a range so vector<int> and vector<long long> returns both fit
            let receive = match call.expected {
                Value::IntArray(_) => format!(
                    "auto arbiter_raw = {invocation};\n        vector<long long> result(arbiter_raw.begin(), arbiter_raw.end());"
                ),
                other => format!("{} result = {};", result_type(other), invocation),
            };
            format!(
                r#"        {receive}
        {result_type} expected = {expected};
        string actual = arbiter_format(result);
        cout << actual << "\n" << SENTINEL << "\n";
        if ({comparison}) {{
            cout << "PASS" << endl;
        }} else {{
            cout << "FAIL: Expected " << {expected_text} << " but got " << actual << endl;
        }}"#,
                result_type = result_type(call.expected),
                expected = literal(call.expected, true),
                comparison = comparison(call.expected),
            )
        }
        OutputType::Print => format!(
            r#"        ostringstream buffer;
        cout.rdbuf(buffer.rdbuf());
        try {{
            {invocation};
        }} catch (...) {{
            cout.rdbuf(original);
            throw;
        }}
        cout.flush();
        cout.rdbuf(original);
        string actual = arbiter_trim(buffer.str());
        string expected = {expected_text};
        cout << actual << "\n" << SENTINEL << "\n";
        if (actual == expected) {{
            cout << "PASS" << endl;
        }} else {{
            cout << "FAIL: Expected " << expected << " but got " << actual << endl;
        }}"#
        ),
    };

    format!(
        r#"#include <algorithm>
#include <climits>
#include <cmath>
#include <exception>
#include <iomanip>
#include <iostream>
#include <map>
#include <numeric>
#include <set>
#include <sstream>
#include <string>
#include <unordered_map>
#include <unordered_set>
#include <vector>
using namespace std;

{user_code}

static const char* SENTINEL = {sentinel};

static string arbiter_quote(const string& value) {{
    ostringstream out;
    out << '"';
    for (unsigned char c : value) {{
        switch (c) {{
            case '"': out << "\\\""; break;
            case '\\': out << "\\\\"; break;
            case '\n': out << "\\n"; break;
            case '\r': out << "\\r"; break;
            case '\t': out << "\\t"; break;
            default:
                if (c < 0x20) {{
                    out << "\\u" << hex << setw(4) << setfill('0') << (int) c << dec;
                }} else {{
                    out << c;
                }}
        }}
    }}
    out << '"';
    return out.str();
}}

static string arbiter_format(long long value) {{ return to_string(value); }}
static string arbiter_format(bool value) {{ return value ? "true" : "false"; }}
static string arbiter_format(const string& value) {{ return arbiter_quote(value); }}

static string arbiter_format(double value) {{
    ostringstream out;
    out << setprecision(15) << value;
    return out.str();
}}

static string arbiter_format(const vector<long long>& values) {{
    ostringstream out;
    out << '[';
    for (size_t i = 0; i < values.size(); i++) {{
        if (i > 0) {{
            out << ',';
        }}
        out << values[i];
    }}
    out << ']';
    return out.str();
}}

static string arbiter_trim(const string& text) {{
    const char* space = " \t\n\r\f\v";
    size_t begin = text.find_first_not_of(space);
    if (begin == string::npos) {{
        return "";
    }}
    size_t end = text.find_last_not_of(space);
    return text.substr(begin, end - begin + 1);
}}

int main() {{
    streambuf* original = cout.rdbuf();
    try {{
{declarations}{body}
    }} catch (const exception& error) {{
        cout.rdbuf(original);
        cout << SENTINEL << "\n" << "ERROR: " << error.what() << endl;
    }} catch (...) {{
        cout.rdbuf(original);
        cout << SENTINEL << "\n" << "ERROR: Unknown exception" << endl;
    }}
    return 0;
}}
"#,
        sentinel = c_string_literal(SENTINEL),
    )
}
