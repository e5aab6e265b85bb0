use arbiter_common::types::Language;

/// Failures that are not part of the execution result vocabulary.
///
/// Compile errors, crashes and timeouts are reported through
/// `ExecutionResult::status`; these variants are faults the caller must handle.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no toolchain configured for language: {0}")]
    UnsupportedLanguage(Language),

    #[error("execution cancelled")]
    Cancelled,

    #[error("workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("execution engine is shutting down")]
    ShuttingDown,
}
