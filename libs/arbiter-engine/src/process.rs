// Child process supervision: spawn, feed stdin, capture capped output,
// enforce the wall-clock limit and kill the whole process group on exit paths.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long readers may keep draining pipes after the child is gone
const DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8 * 1024;

pub(crate) struct ProcessSpec<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub cwd: &'a Path,
    /// `None` connects stdin to the null device
    pub stdin: Option<&'a [u8]>,
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    Exited(ExitStatus),
    TimedOut,
    OutputLimitExceeded,
    Cancelled,
}

#[derive(Debug)]
pub(crate) struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub termination: Termination,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Bytes captured so far; shared so a stuck reader can be abandoned without losing output
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn append(&self, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(bytes);
    }

    fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    fn into_string(self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Run one child process to completion, timeout, output overflow or cancellation
pub(crate) async fn run(spec: &ProcessSpec<'_>, cancel: &CancellationToken) -> io::Result<ProcessOutput> {
    let mut command = Command::new(spec.program);
    command
        .args(spec.args)
        .current_dir(spec.cwd)
        .env_remove("JAVA_TOOL_OPTIONS")
        .stdin(if spec.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let started = Instant::now();
    let mut child = command.spawn()?;
    let pid = child.id();
    let mut group = GroupGuard { pid, armed: true };
    debug!(program = spec.program, pid = ?pid, "Spawned child process");

    let stdin_task = match (spec.stdin, child.stdin.take()) {
        (Some(bytes), Some(mut pipe)) => {
            let bytes = bytes.to_vec();
            Some(tokio::spawn(async move {
                // The child may exit without reading everything
                if let Err(e) = pipe.write_all(&bytes).await {
                    debug!(error = %e, "stdin closed early");
                }
            }))
        }
        _ => None,
    };

    let overflow = CancellationToken::new();
    let stdout = Capture::default();
    let stderr = Capture::default();
    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        readers.push(tokio::spawn(read_capped(pipe, stdout.clone(), spec.max_output_bytes, overflow.clone())));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(tokio::spawn(read_capped(pipe, stderr.clone(), spec.max_output_bytes, overflow.clone())));
    }

    let deadline = tokio::time::sleep(spec.timeout);
    tokio::pin!(deadline);

    let mut termination = tokio::select! {
        biased;
        _ = cancel.cancelled() => Termination::Cancelled,
        _ = overflow.cancelled() => Termination::OutputLimitExceeded,
        status = child.wait() => Termination::Exited(status?),
        _ = &mut deadline => Termination::TimedOut,
    };
    let elapsed = started.elapsed();

    if !matches!(termination, Termination::Exited(_)) {
        kill_tree(&mut child, pid).await;
    }

    if !drain(&mut readers).await {
        // Descendants still hold the pipes open
        kill_group(pid);
        for reader in &readers {
            reader.abort();
        }
    }
    if let Some(task) = stdin_task {
        task.abort();
    }
    group.armed = false;

    // Output that overflowed while the child was exiting still counts
    if overflow.is_cancelled() && matches!(termination, Termination::Exited(_)) {
        termination = Termination::OutputLimitExceeded;
    }

    Ok(ProcessOutput {
        stdout: stdout.into_string(),
        stderr: stderr.into_string(),
        termination,
        elapsed,
    })
}

/// Kills the process group when the supervising future is dropped mid-flight
struct GroupGuard {
    pid: Option<u32>,
    armed: bool,
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.armed {
            kill_group(self.pid);
        }
    }
}

async fn read_capped<R>(mut reader: R, capture: Capture, limit: usize, overflow: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(capture.len());
                capture.append(&chunk[..n.min(room)]);
                if n > room {
                    overflow.cancel();
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "Output pipe read failed");
                break;
            }
        }
    }
}

/// Wait for readers to hit EOF; false when the grace period ran out
async fn drain(readers: &mut [JoinHandle<()>]) -> bool {
    let all = async {
        for reader in readers.iter_mut() {
            if let Err(e) = reader.await {
                warn!(error = %e, "Output reader task failed");
            }
        }
    };
    tokio::time::timeout(DRAIN_GRACE, all).await.is_ok()
}

async fn kill_tree(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);
    // Also reaps the direct child
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Child already gone");
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = pid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// Describe how a non-zero exit happened, including the signal on unix
pub(crate) fn describe_exit(status: &ExitStatus) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("Process terminated by signal {}", signal);
        }
    }
    match status.code() {
        Some(code) => format!("Process exited with code {}", code),
        None => "Process exited abnormally".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_args(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    async fn run_sh(script: &str, stdin: Option<&[u8]>, timeout_ms: u64, max_output_bytes: usize) -> ProcessOutput {
        let dir = tempfile::tempdir().unwrap();
        let args = sh_args(script);
        let spec = ProcessSpec {
            program: "sh",
            args: &args,
            cwd: dir.path(),
            stdin,
            timeout: Duration::from_millis(timeout_ms),
            max_output_bytes,
        };
        run(&spec, &CancellationToken::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let output = run_sh("echo out; echo err >&2", None, 5000, 1024).await;
        assert!(matches!(output.termination, Termination::Exited(s) if s.success()));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_stdin_is_forwarded() {
        let output = run_sh("cat", Some(b"1 2 3\n"), 5000, 1024).await;
        assert_eq!(output.stdout, "1 2 3\n");
    }

    #[tokio::test]
    async fn test_stdin_defaults_to_null() {
        let output = run_sh("cat; echo done", None, 5000, 1024).await;
        assert_eq!(output.stdout, "done\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let output = run_sh("echo partial; sleep 30", None, 300, 1024).await;
        assert_eq!(output.termination, Termination::TimedOut);
        assert_eq!(output.stdout, "partial\n");
        assert!(output.elapsed >= Duration::from_millis(300));
        assert!(output.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_kills_grandchildren() {
        // The backgrounded sleep keeps stdout open unless the whole group dies
        let started = Instant::now();
        let output = run_sh("sleep 30 & sleep 30", None, 200, 1024).await;
        assert_eq!(output.termination, Termination::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_output_cap() {
        let output = run_sh("yes arbiter", None, 5000, 4096).await;
        assert_eq!(output.termination, Termination::OutputLimitExceeded);
        assert_eq!(output.stdout.len(), 4096);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let args = sh_args("sleep 30");
        let spec = ProcessSpec {
            program: "sh",
            args: &args,
            cwd: dir.path(),
            stdin: None,
            timeout: Duration::from_secs(30),
            max_output_bytes: 1024,
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let output = run(&spec, &cancel).await.unwrap();
        assert_eq!(output.termination, Termination::Cancelled);
        assert!(output.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec {
            program: "definitely-not-a-real-binary-arbiter",
            args: &[],
            cwd: dir.path(),
            stdin: None,
            timeout: Duration::from_secs(1),
            max_output_bytes: 1024,
        };
        assert!(run(&spec, &CancellationToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_describe_exit() {
        let output = run_sh("exit 3", None, 5000, 1024).await;
        match output.termination {
            Termination::Exited(status) => {
                assert_eq!(describe_exit(&status), "Process exited with code 3");
            }
            other => panic!("unexpected termination {:?}", other),
        }

        let output = run_sh("kill -9 $$", None, 5000, 1024).await;
        match output.termination {
            Termination::Exited(status) => {
                assert_eq!(describe_exit(&status), "Process terminated by signal 9");
            }
            other => panic!("unexpected termination {:?}", other),
        }
    }
}
