/// Test Validator - Grade a submission against a problem's examples
///
/// **Core Responsibility:**
/// For each example: generate a harness, execute it, read the verdict and
/// aggregate everything into a `ValidationSummary`.
///
/// **Critical Properties:**
/// - Knows nothing about toolchains or subprocesses (works through `ExecutionBackend`)
/// - Examples run sequentially, in order
/// - A failing example never aborts the run; only `EngineError` does
///
/// **Grading Rules:**
/// - passed iff the harness printed `PASS` after the sentinel
/// - actualOutput: what the harness printed before the verdict, else stderr, else "No output"
/// - error: stderr, else the `ERROR:` message, else a description of the status

use crate::engine::ExecutionBackend;
use crate::error::EngineError;
use crate::harness;
use crate::marker::{self, Marker};
use arbiter_common::types::{
    Example, ExecutionRequest, ExecutionResult, ExecutionStatus, Language, Problem, TestOutcome,
    ValidationSummary,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

pub const NO_OUTPUT: &str = "No output";
pub const ALL_PASSED_MESSAGE: &str = "All test cases passed!";

pub struct Validator<B> {
    backend: B,
}

impl<B: ExecutionBackend> Validator<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub async fn validate(
        &self,
        user_code: &str,
        language: Language,
        problem: &Problem,
    ) -> Result<ValidationSummary, EngineError> {
        self.validate_with_cancel(user_code, language, problem, &CancellationToken::new())
            .await
    }

    #[instrument(skip_all, fields(problem = %problem.id, language = %language))]
    pub async fn validate_with_cancel(
        &self,
        user_code: &str,
        language: Language,
        problem: &Problem,
        cancel: &CancellationToken,
    ) -> Result<ValidationSummary, EngineError> {
        let mut outcomes = Vec::with_capacity(problem.examples.len());

        for (position, example) in problem.examples.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let program = harness::generate(user_code, example, problem, language);
            let request = ExecutionRequest::new(program, language);
            let result = self.backend.execute_program(&request, cancel).await?;

            let outcome = evaluate_example(position + 1, example, &result);
            debug!(
                index = outcome.index,
                passed = outcome.passed,
                status = %outcome.status,
                elapsed_ms = outcome.elapsed_ms,
                "Example graded"
            );
            outcomes.push(outcome);
        }

        let summary = aggregate_outcomes(outcomes);
        info!(
            passed = summary.passed_count,
            total = summary.total_tests,
            "Validation complete"
        );
        Ok(summary)
    }
}

/// Grade one example from the execution result of its harness
pub fn evaluate_example(index: usize, example: &Example, result: &ExecutionResult) -> TestOutcome {
    let verdict = marker::parse(&result.stdout);
    let stderr = result.stderr.trim();

    let actual_output = if !verdict.actual.is_empty() {
        verdict.actual.clone()
    } else if !stderr.is_empty() {
        stderr.to_string()
    } else {
        NO_OUTPUT.to_string()
    };

    let error = if !stderr.is_empty() {
        Some(stderr.to_string())
    } else if let Marker::Error(message) = &verdict.marker {
        Some(message.clone())
    } else {
        status_description(result.status, &verdict.marker).map(str::to_string)
    };

    TestOutcome {
        index,
        input: example.input.clone(),
        expected_output: example.output.clone(),
        actual_output,
        passed: verdict.marker.is_pass(),
        status: result.status,
        elapsed_ms: result.elapsed_ms,
        error,
    }
}

fn status_description(status: ExecutionStatus, marker: &Marker) -> Option<&'static str> {
    match (status, marker) {
        (ExecutionStatus::TimedOut, _) => Some("Execution timed out"),
        (ExecutionStatus::CompilationError, _) => Some("Compilation failed"),
        (_, Marker::Missing) => Some("Harness produced no verdict"),
        _ => None,
    }
}

/// Fold per-example outcomes into the submission summary
pub fn aggregate_outcomes(test_outcomes: Vec<TestOutcome>) -> ValidationSummary {
    let total_tests = test_outcomes.len();
    let passed_count = test_outcomes.iter().filter(|o| o.passed).count();
    let failed_count = total_tests - passed_count;

    let message = if failed_count == 0 {
        ALL_PASSED_MESSAGE.to_string()
    } else {
        format!("{} test case(s) failed", failed_count)
    };

    ValidationSummary {
        all_passed: failed_count == 0,
        passed_count,
        failed_count,
        total_tests,
        test_outcomes,
        message,
    }
}
