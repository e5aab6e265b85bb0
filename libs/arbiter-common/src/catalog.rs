// Problem catalog loaded from a JSON file.
// Stands in for the problem store: read-only, loaded once at startup.

use crate::types::Problem;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read problem catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse problem catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid problem '{id}': {reason}")]
    Invalid { id: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    problems: Vec<Problem>,
}

#[derive(Debug, Clone, Default)]
pub struct ProblemCatalog {
    problems: Vec<Problem>,
}

impl ProblemCatalog {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse `{"problems": [...]}` and check the preconditions the engine relies on
    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(content)?;
        Self::new(file.problems)
    }

    pub fn new(problems: Vec<Problem>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for problem in &problems {
            let invalid = |reason: &str| CatalogError::Invalid {
                id: problem.id.clone(),
                reason: reason.to_string(),
            };
            if problem.id.trim().is_empty() {
                return Err(invalid("missing id"));
            }
            if !seen.insert(problem.id.as_str()) {
                return Err(invalid("duplicate id"));
            }
            if !is_identifier(&problem.function_name) {
                return Err(invalid("functionName must be a plain identifier"));
            }
            if problem.examples.is_empty() {
                return Err(invalid("at least one example is required"));
            }
        }
        Ok(Self { problems })
    }

    pub fn get(&self, id: &str) -> Option<&Problem> {
        self.problems.iter().find(|p| p.id == id)
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Function names are pasted into generated source, so only identifiers are allowed
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "problems": [
            {
                "id": "two-sum",
                "title": "Two Sum",
                "functionName": "twoSum",
                "examples": [{"input": {"nums": [2, 7], "target": 9}, "output": [0, 1]}]
            },
            {
                "id": "hello",
                "title": "Hello",
                "functionName": "greet",
                "outputType": "print",
                "examples": [{"input": {"name": "World"}, "output": "Hello World"}]
            }
        ]
    }"#;

    #[test]
    fn test_load_catalog() {
        let catalog = ProblemCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("hello").unwrap().function_name, "greet");
        assert!(catalog.get("missing").is_none());
        assert_eq!(catalog.problems()[0].id, "two-sum");
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let json = CATALOG.replace("\"hello\"", "\"two-sum\"");
        let err = ProblemCatalog::from_json(&json).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { ref reason, .. } if reason == "duplicate id"));
    }

    #[test]
    fn test_rejects_non_identifier_function_name() {
        let json = CATALOG.replace("\"greet\"", "\"greet(); evil\"");
        let err = ProblemCatalog::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("functionName"));
    }

    #[test]
    fn test_missing_file() {
        let err = ProblemCatalog::load_from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("twoSum"));
        assert!(is_identifier("_helper2"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
