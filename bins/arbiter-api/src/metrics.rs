// Prometheus metrics for the HTTP service

use arbiter_common::types::{ExecutionResult, Language};
use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
}

/// Label used when the engine faulted instead of producing a result
pub const FAULT: &str = "fault";

#[derive(Clone)]
pub struct Metrics {
    executions: IntCounterVec,
    execution_seconds: HistogramVec,
    submissions: IntCounterVec,
}

impl Metrics {
    /// Create the collectors and register them with `registry`
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let executions = IntCounterVec::new(
            Opts::new("arbiter_executions_total", "Programs executed, by language and status"),
            &["language", "status"],
        )?;
        let execution_seconds = HistogramVec::new(
            HistogramOpts::new(
                "arbiter_execution_duration_seconds",
                "Wall-clock time of executions from admission to result",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["language"],
        )?;
        let submissions = IntCounterVec::new(
            Opts::new("arbiter_submissions_total", "Graded submissions, by language and outcome"),
            &["language", "outcome"],
        )?;

        registry.register(Box::new(executions.clone()))?;
        registry.register(Box::new(execution_seconds.clone()))?;
        registry.register(Box::new(submissions.clone()))?;

        Ok(Self {
            executions,
            execution_seconds,
            submissions,
        })
    }

    pub fn record_execution(&self, language: Language, result: &ExecutionResult) {
        self.executions
            .with_label_values(&[language.as_str(), result.status.as_str()])
            .inc();
        self.execution_seconds
            .with_label_values(&[language.as_str()])
            .observe(Duration::from_millis(result.elapsed_ms).as_secs_f64());
    }

    pub fn record_execution_fault(&self, language: Language) {
        self.executions
            .with_label_values(&[language.as_str(), FAULT])
            .inc();
    }

    /// `outcome` is "accepted", "rejected" or `FAULT`
    pub fn record_submission(&self, language: Language, outcome: &str) {
        self.submissions
            .with_label_values(&[language.as_str(), outcome])
            .inc();
    }
}

/// Text exposition of everything in `registry`
pub fn render(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_common::types::ExecutionStatus;

    fn result(status: ExecutionStatus, elapsed_ms: u64) -> ExecutionResult {
        ExecutionResult {
            stdout: String::new(),
            stderr: String::new(),
            status,
            elapsed_ms,
            memory_kb: 0,
            compile_ms: None,
            run_ms: Some(elapsed_ms),
        }
    }

    #[test]
    fn test_metrics_exposition() {
        let registry = Registry::new();
        let metrics = Metrics::register(&registry).unwrap();

        metrics.record_execution(Language::Python, &result(ExecutionStatus::Success, 120));
        metrics.record_execution(Language::Python, &result(ExecutionStatus::TimedOut, 5000));
        metrics.record_execution_fault(Language::Java);
        metrics.record_submission(Language::Cpp, "accepted");

        let text = render(&registry).unwrap();
        assert!(text.contains(r#"arbiter_executions_total{language="python",status="Success"} 1"#));
        assert!(text.contains(r#"arbiter_executions_total{language="python",status="TimedOut"} 1"#));
        assert!(text.contains(r#"arbiter_executions_total{language="java",status="fault"} 1"#));
        assert!(text.contains(r#"arbiter_submissions_total{language="cpp",outcome="accepted"} 1"#));
        assert!(text.contains(r#"arbiter_execution_duration_seconds_count{language="python"} 2"#));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        assert!(Metrics::register(&registry).is_ok());
        assert!(Metrics::register(&registry).is_err());
    }
}
