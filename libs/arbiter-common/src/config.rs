// Runtime settings shared by the API and the CLI.
// Every value can be overridden through the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
pub const DEFAULT_LANGUAGES_CONFIG: &str = "config/languages.json";
pub const DEFAULT_PROBLEMS_PATH: &str = "config/problems.json";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Wall-clock limit for the run phase
    pub timeout_ms: u64,
    /// Wall-clock limit for the compile phase
    pub compile_timeout_ms: u64,
    /// Per-stream cap on captured output
    pub max_output_bytes: usize,
    /// Upper bound on simultaneously running executions
    pub max_concurrency: usize,
    /// Parent directory for the execution workspace (system temp dir when unset)
    pub workspace_dir: Option<PathBuf>,
    pub languages_config: PathBuf,
    pub problems_path: PathBuf,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            compile_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_concurrency: default_concurrency(),
            workspace_dir: None,
            languages_config: PathBuf::from(DEFAULT_LANGUAGES_CONFIG),
            problems_path: PathBuf::from(DEFAULT_PROBLEMS_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `ARBITER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(raw) = lookup("ARBITER_TIMEOUT_MS") {
            settings.timeout_ms = parse_positive("ARBITER_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("ARBITER_COMPILE_TIMEOUT_MS") {
            settings.compile_timeout_ms = parse_positive("ARBITER_COMPILE_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("ARBITER_MAX_OUTPUT_BYTES") {
            settings.max_output_bytes = parse_positive("ARBITER_MAX_OUTPUT_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("ARBITER_MAX_CONCURRENCY") {
            settings.max_concurrency = parse_positive("ARBITER_MAX_CONCURRENCY", &raw)?;
        }
        if let Some(raw) = lookup("ARBITER_WORKSPACE_DIR").filter(|v| !v.trim().is_empty()) {
            settings.workspace_dir = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("ARBITER_LANGUAGES_CONFIG") {
            settings.languages_config = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("ARBITER_PROBLEMS_PATH") {
            settings.problems_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("ARBITER_BIND_ADDR") {
            settings.bind_addr = raw;
        }

        Ok(settings)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let invalid = |reason: String| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason,
    };
    let parsed = raw.trim().parse::<T>().map_err(|e| invalid(e.to_string()))?;
    if parsed <= T::default() {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.timeout_ms, 5000);
        assert_eq!(settings.compile_timeout_ms, 5000);
        assert_eq!(settings.max_output_bytes, 1024 * 1024);
        assert!(settings.max_concurrency >= 1);
        assert_eq!(settings.workspace_dir, None);
        assert_eq!(settings.run_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("ARBITER_TIMEOUT_MS", "250"),
            ("ARBITER_MAX_CONCURRENCY", "2"),
            ("ARBITER_WORKSPACE_DIR", "/var/tmp/arbiter"),
            ("ARBITER_BIND_ADDR", "127.0.0.1:8080"),
        ]))
        .unwrap();
        assert_eq!(settings.timeout_ms, 250);
        assert_eq!(settings.max_concurrency, 2);
        assert_eq!(settings.workspace_dir, Some(PathBuf::from("/var/tmp/arbiter")));
        assert_eq!(settings.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_blank_workspace_dir_is_ignored() {
        let settings = Settings::from_lookup(lookup(&[("ARBITER_WORKSPACE_DIR", "  ")])).unwrap();
        assert_eq!(settings.workspace_dir, None);
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        let err = Settings::from_lookup(lookup(&[("ARBITER_MAX_CONCURRENCY", "0")])).unwrap_err();
        assert!(err.to_string().contains("ARBITER_MAX_CONCURRENCY"));

        let err = Settings::from_lookup(lookup(&[("ARBITER_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("\"soon\""));
    }
}
