/// Execution Engine - Local subprocess backend
///
/// **Core Responsibility:**
/// Run one source file in one language and report a standardized `ExecutionResult`.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (toolchain commands, timeouts, cleanup)
/// - Engine does NOT know problems, harnesses or verdicts
/// - Compile errors, timeouts and crashes are result values, not `Err`
///
/// **Lifecycle of a request:**
/// 1. Admission through the concurrency gate (queue wait counts toward `elapsed_ms`)
/// 2. Source written to a unique scratch directory
/// 3. Optional compile phase with its own timeout
/// 4. Run phase with stdin, wall-clock timeout and output cap
/// 5. Scratch directory removed on every exit path

use crate::config::{LanguageConfig, LanguageConfigManager, Placeholders};
use crate::error::EngineError;
use crate::java_source;
use crate::process::{self, describe_exit, ProcessOutput, ProcessSpec, Termination};
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use arbiter_common::catalog::is_identifier;
use arbiter_common::config::{Settings, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_MS};
use arbiter_common::types::{ExecutionRequest, ExecutionResult, ExecutionStatus, Language};
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const DEFAULT_JAVA_ENTRY: &str = "Main";
const SOURCE_STEM: &str = "main";
const BINARY_NAME: &str = "main";

/// Per-phase resource limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub run_timeout: Duration,
    pub compile_timeout: Duration,
    /// Cap applied to stdout and stderr separately
    pub max_output_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            run_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            compile_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ExecutionLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            run_timeout: settings.run_timeout(),
            compile_timeout: settings.compile_timeout(),
            max_output_bytes: settings.max_output_bytes,
        }
    }
}

/// Anything that can run a single program. The validator is generic over this
/// so grading logic can be exercised without real toolchains.
pub trait ExecutionBackend: Send + Sync {
    fn execute_program(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ExecutionResult, EngineError>> + Send;
}

impl<T: ExecutionBackend + ?Sized> ExecutionBackend for &T {
    fn execute_program(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ExecutionResult, EngineError>> + Send {
        (**self).execute_program(request, cancel)
    }
}

/// Subprocess execution engine
pub struct Engine {
    toolchains: LanguageConfigManager,
    workspace: Workspace,
    limits: ExecutionLimits,
    permits: Semaphore,
}

impl Engine {
    pub fn new(
        toolchains: LanguageConfigManager,
        workspace: Workspace,
        limits: ExecutionLimits,
        max_concurrency: usize,
    ) -> Self {
        Self {
            toolchains,
            workspace,
            limits,
            permits: Semaphore::new(max_concurrency.max(1)),
        }
    }

    /// Build an engine from runtime settings: toolchains, workspace, limits and gate size
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let toolchains = LanguageConfigManager::load_or_builtin(&settings.languages_config)?;
        let workspace = Workspace::create(settings.workspace_dir.as_deref())
            .context("Failed to create execution workspace")?;

        info!(
            workspace = %workspace.path().display(),
            max_concurrency = settings.max_concurrency,
            timeout_ms = settings.timeout_ms,
            compile_timeout_ms = settings.compile_timeout_ms,
            "Execution engine ready"
        );

        Ok(Self::new(
            toolchains,
            workspace,
            ExecutionLimits::from_settings(settings),
            settings.max_concurrency,
        ))
    }

    pub fn toolchains(&self) -> &LanguageConfigManager {
        &self.toolchains
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    /// Stop admitting new executions; waiting and future callers get `ShuttingDown`
    pub fn close(&self) {
        self.permits.close();
    }

    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, EngineError> {
        self.execute_with_cancel(request, &CancellationToken::new()).await
    }

    /// Execute one program. Cancelling `cancel` kills the child and returns `Cancelled`.
    #[instrument(skip_all, fields(language = %request.language))]
    pub async fn execute_with_cancel(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, EngineError> {
        let started = Instant::now();
        let toolchain = self
            .toolchains
            .get(request.language)
            .ok_or(EngineError::UnsupportedLanguage(request.language))?;

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| EngineError::ShuttingDown)?,
        };
        debug!(queue_ms = started.elapsed().as_millis() as u64, "Admitted");

        let scratch = self.workspace.scratch().map_err(EngineError::Workspace)?;
        let entry = entry_point(request.language, &request.code);
        let source = scratch.join(&source_file_name(request.language, toolchain, &entry));
        let binary = scratch.join(BINARY_NAME);
        tokio::fs::write(&source, &request.code)
            .await
            .map_err(EngineError::Workspace)?;

        let source = source.to_string_lossy();
        let dir = scratch.path().to_string_lossy();
        let binary = binary.to_string_lossy();
        let vars = Placeholders {
            source: &source,
            dir: &dir,
            binary: &binary,
            entry: &entry,
        };
        debug!(scratch = %scratch.id(), entry = %entry, "Materialized source");

        let mut report = Report::new(started);

        if let Some(compile) = &toolchain.compile {
            let (program, args) = compile.render(&vars);
            let spec = ProcessSpec {
                program: &program,
                args: &args,
                cwd: scratch.path(),
                stdin: None,
                timeout: self.limits.compile_timeout,
                max_output_bytes: self.limits.max_output_bytes,
            };
            let output = match process::run(&spec, cancel).await {
                Ok(output) => output,
                Err(e) => return Ok(report.spawn_failure(&program, &e)),
            };
            report.compile_ms = Some(output.elapsed_ms());

            if let Some(result) = self.classify_compile(&report, output)? {
                info!(status = %result.status, elapsed_ms = result.elapsed_ms, "Compilation failed");
                return Ok(result);
            }
        }

        let (program, args) = toolchain.run.render(&vars);
        let spec = ProcessSpec {
            program: &program,
            args: &args,
            cwd: scratch.path(),
            stdin: (!request.input.is_empty()).then(|| request.input.as_bytes()),
            timeout: self.limits.run_timeout,
            max_output_bytes: self.limits.max_output_bytes,
        };
        let output = match process::run(&spec, cancel).await {
            Ok(output) => output,
            Err(e) => return Ok(report.spawn_failure(&program, &e)),
        };
        report.run_ms = Some(output.elapsed_ms());

        let result = self.classify_run(report, output)?;
        info!(
            status = %result.status,
            elapsed_ms = result.elapsed_ms,
            compile_ms = ?result.compile_ms,
            run_ms = ?result.run_ms,
            "Execution finished"
        );
        Ok(result)
    }

    /// `Some` when compilation failed and the run phase must not start
    fn classify_compile(
        &self,
        report: &Report,
        output: ProcessOutput,
    ) -> Result<Option<ExecutionResult>, EngineError> {
        let ProcessOutput { stdout, mut stderr, termination, .. } = output;
        match termination {
            Termination::Cancelled => return Err(EngineError::Cancelled),
            Termination::Exited(status) if status.success() && stderr.trim().is_empty() => {
                return Ok(None)
            }
            Termination::Exited(status) => {
                if stderr.trim().is_empty() {
                    // Some compilers report on stdout
                    stderr = if stdout.trim().is_empty() { describe_exit(&status) } else { stdout };
                }
            }
            Termination::TimedOut => append_note(
                &mut stderr,
                &format!("Compilation timed out after {} ms", self.limits.compile_timeout.as_millis()),
            ),
            Termination::OutputLimitExceeded => append_note(
                &mut stderr,
                &format!("Compiler output exceeded {} bytes", self.limits.max_output_bytes),
            ),
        }
        Ok(Some(report.finish(String::new(), stderr, ExecutionStatus::CompilationError)))
    }

    fn classify_run(&self, report: Report, output: ProcessOutput) -> Result<ExecutionResult, EngineError> {
        let ProcessOutput { stdout, mut stderr, termination, .. } = output;
        let status = match termination {
            Termination::Cancelled => return Err(EngineError::Cancelled),
            Termination::TimedOut => {
                append_note(
                    &mut stderr,
                    &format!("Execution timed out after {} ms", self.limits.run_timeout.as_millis()),
                );
                ExecutionStatus::TimedOut
            }
            Termination::OutputLimitExceeded => {
                append_note(
                    &mut stderr,
                    &format!("Output limit of {} bytes exceeded, process killed", self.limits.max_output_bytes),
                );
                ExecutionStatus::Error
            }
            Termination::Exited(status) if !status.success() => {
                if is_signal(&status) || stderr.trim().is_empty() {
                    append_note(&mut stderr, &describe_exit(&status));
                }
                ExecutionStatus::Error
            }
            Termination::Exited(_) if !stderr.trim().is_empty() => ExecutionStatus::Error,
            Termination::Exited(_) => ExecutionStatus::Success,
        };
        Ok(report.finish(stdout, stderr, status))
    }
}

impl ExecutionBackend for Engine {
    fn execute_program(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ExecutionResult, EngineError>> + Send {
        self.execute_with_cancel(request, cancel)
    }
}

/// Timing collected while a request moves through its phases
struct Report {
    started: Instant,
    compile_ms: Option<u64>,
    run_ms: Option<u64>,
}

impl Report {
    fn new(started: Instant) -> Self {
        Self {
            started,
            compile_ms: None,
            run_ms: None,
        }
    }

    fn finish(&self, stdout: String, stderr: String, status: ExecutionStatus) -> ExecutionResult {
        ExecutionResult {
            stdout,
            stderr,
            status,
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            memory_kb: 0,
            compile_ms: self.compile_ms,
            run_ms: self.run_ms,
        }
    }

    /// A toolchain binary that cannot be started is an execution error, not an engine fault
    fn spawn_failure(&self, program: &str, error: &std::io::Error) -> ExecutionResult {
        warn!(program, error = %error, "Failed to start toolchain process");
        self.finish(
            String::new(),
            format!("Failed to start '{}': {}", program, error),
            ExecutionStatus::Error,
        )
    }
}

fn append_note(stderr: &mut String, note: &str) {
    if !stderr.is_empty() && !stderr.ends_with('\n') {
        stderr.push('\n');
    }
    stderr.push_str(note);
}

#[cfg(unix)]
fn is_signal(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(not(unix))]
fn is_signal(_status: &std::process::ExitStatus) -> bool {
    false
}

/// Java runs `<Entry>.java` where `Entry` is the first `public class`; others use a fixed stem
fn source_file_name(language: Language, toolchain: &LanguageConfig, entry: &str) -> String {
    match language {
        Language::Java => format!("{}.{}", entry, toolchain.file_extension),
        _ => format!("{}.{}", SOURCE_STEM, toolchain.file_extension),
    }
}

fn entry_point(language: Language, code: &str) -> String {
    match language {
        Language::Java => java_entry_class(code),
        _ => SOURCE_STEM.to_string(),
    }
}

/// The file must be named after the top-level public class; nested ones do not count
fn java_entry_class(code: &str) -> String {
    java_source::public_class(code)
        .filter(|name| is_identifier(name))
        .unwrap_or(DEFAULT_JAVA_ENTRY)
        .to_string()
}
