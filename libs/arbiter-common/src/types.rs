use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Languages the judge can execute and generate harnesses for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    Python,
    Java,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::JavaScript,
        Language::Python,
        Language::Java,
        Language::Cpp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }

    /// Statically-typed languages need a compile step and typed declarations
    pub fn is_compiled(&self) -> bool {
        matches!(self, Language::Java | Language::Cpp)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "python" | "python3" | "py" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "cpp" | "c++" => Ok(Language::Cpp),
            _ => Err(UnsupportedLanguage(s.to_string())),
        }
    }
}

/// A single ad-hoc execution: one source file, one language, optional stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    pub language: Language,
    #[serde(default)]
    pub input: String,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: Language) -> Self {
        Self {
            code: code.into(),
            language,
            input: String::new(),
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }
}

/// Process-level outcome of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Error,
    TimedOut,
    CompilationError,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "Success",
            ExecutionStatus::Error => "Error",
            ExecutionStatus::TimedOut => "TimedOut",
            ExecutionStatus::CompilationError => "CompilationError",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standardized output of the execution backend.
///
/// `memory_kb` is always 0: memory is not metered.
/// `run_ms` is absent whenever the run phase never started (compile failure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub status: ExecutionStatus,
    pub elapsed_ms: u64,
    pub memory_kb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_ms: Option<u64>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// How a problem judges correctness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Compare the function's return value
    #[default]
    Return,
    /// Compare what the function writes to standard output
    Print,
}

/// Example values, tagged once at ingestion.
///
/// This is the whole value universe harnesses support. Anything else
/// (null, objects, nested or non-integer arrays) is rejected when a
/// problem is deserialized.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Str(String),
    Bool(bool),
    IntArray(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("null is not a supported example value")]
    Null,
    #[error("objects are not supported example values")]
    Object,
    #[error("array element {index} is not an integer: {found}")]
    NonIntegerElement { index: usize, found: String },
}

impl Value {
    /// Compact JSON rendering used in verdict messages and comparisons
    pub fn canonical(&self) -> String {
        serde_json::Value::from(self.clone()).to_string()
    }

    /// Expected text for print-mode problems: strings verbatim, everything else canonical
    pub fn print_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.canonical(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::IntArray(_) => "int[]",
        }
    }

    /// True when an integer (or any array element) does not fit in 32 bits
    pub fn needs_wide_int(&self) -> bool {
        let narrow = |n: &i64| i32::try_from(*n).is_ok();
        match self {
            Value::Int(n) => !narrow(n),
            Value::IntArray(items) => !items.iter().all(narrow),
            _ => false,
        }
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = ValueError;

    fn try_from(raw: serde_json::Value) -> Result<Self, Self::Error> {
        match raw {
            serde_json::Value::Null => Err(ValueError::Null),
            serde_json::Value::Object(_) => Err(ValueError::Object),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::String(s) => Ok(Value::Str(s)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => Ok(Value::Real(n.as_f64().unwrap_or(f64::NAN))),
            },
            serde_json::Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    item.as_i64().ok_or_else(|| ValueError::NonIntegerElement {
                        index,
                        found: item.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::IntArray),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Int(i) => serde_json::Value::from(i),
            Value::Real(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s),
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::IntArray(items) => serde_json::Value::from(items),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::IntArray(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Value::try_from(raw).map_err(de::Error::custom)
    }
}

/// One named function argument
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: Value,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Arguments travel as a JSON object; key order is the declared parameter order
mod ordered_arguments {
    use super::*;

    pub fn serialize<S: Serializer>(args: &[Argument], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(args.len()))?;
        for arg in args {
            map.serialize_entry(&arg.name, &arg.value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Argument>, D::Error> {
        deserializer.deserialize_map(ArgumentsVisitor)
    }

    struct ArgumentsVisitor;

    impl<'de> Visitor<'de> for ArgumentsVisitor {
        type Value = Vec<Argument>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an object mapping parameter names to values")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut args = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, value)) = map.next_entry::<String, Value>()? {
                args.push(Argument { name, value });
            }
            Ok(args)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Example {
    #[serde(with = "ordered_arguments")]
    pub input: Vec<Argument>,
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A judge problem as supplied by the problem catalog.
/// The engine only reads `function_name`, `output_type` and `examples`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub description: String,
    pub function_name: String,
    #[serde(default)]
    pub output_type: OutputType,
    pub examples: Vec<Example>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub starter_code: BTreeMap<Language, String>,
}

/// Grading result of one example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    /// 1-based position of the example
    pub index: usize,
    #[serde(with = "ordered_arguments")]
    pub input: Vec<Argument>,
    pub expected_output: Value,
    pub actual_output: String,
    pub passed: bool,
    pub status: ExecutionStatus,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub all_passed: bool,
    pub passed_count: usize,
    pub failed_count: usize,
    pub total_tests: usize,
    pub test_outcomes: Vec<TestOutcome>,
    pub message: String,
}
