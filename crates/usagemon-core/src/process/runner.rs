//! Bounded subprocess runner.
//!
//! Spawns a CLI with all three streams piped, optionally feeds it one line of
//! input, and waits for either exit or the timeout. On timeout the child is
//! killed and whatever it printed so far is returned as a normal result.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RunError, COMMAND_FAILED_MESSAGE};

/// Default wall-clock budget for one CLI invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// How long to keep draining pipes after the child has exited
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// How the child stopped running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own with this code (`None` if killed by a signal)
    Exited(Option<i32>),
    /// Killed after the timeout elapsed
    TimedOut,
}

/// Captured output of one run
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Everything the child wrote to stdout (lossy UTF-8)
    pub stdout: String,
    /// Everything the child wrote to stderr (lossy UTF-8)
    pub stderr: String,
    /// Exit or timeout
    pub termination: Termination,
    /// OS process id of the child, if it was still known after spawn
    pub pid: Option<u32>,
}

impl RunOutput {
    /// Whether the timeout fired before the child exited
    pub fn timed_out(&self) -> bool {
        self.termination == Termination::TimedOut
    }
}

/// Runs a single command under a hard timeout
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ProcessRunner {
    /// Create a runner with the given timeout
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `program` with `args`, writing `stdin_line` (plus a newline) if given.
    ///
    /// Resolves successfully when the child exits 0, when it exits non-zero
    /// but printed something to stdout, or when the timeout fires. Fails only
    /// if the spawn fails or the child exits non-zero with empty stdout.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin_line: Option<&str>,
    ) -> Result<RunOutput, RunError> {
        let started = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunError::spawn(program, &e))?;

        let pid = child.id();
        debug!("Spawned {} {:?} (pid {:?})", program, args, pid);

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let stdout_task = drain_into(child.stdout.take(), stdout_buf.clone());
        let stderr_task = drain_into(child.stderr.take(), stderr_buf.clone());

        // Closing stdin signals end-of-input to tools that read one command
        if let Some(mut stdin) = child.stdin.take() {
            if let Some(line) = stdin_line {
                let payload = format!("{}\n", line);
                if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                    debug!("Could not write stdin to {}: {}", program, e);
                }
            }
        }

        let termination = match wait_or_timeout(&mut child, self.timeout).await {
            Some(Ok(status)) => {
                // Pipes reach EOF shortly after exit unless a grandchild holds them
                finish_drain(stdout_task).await;
                finish_drain(stderr_task).await;
                Termination::Exited(status.code())
            }
            Some(Err(e)) => {
                warn!("Failed to wait on {}: {}", program, e);
                kill_and_reap(&mut child, program).await;
                stdout_task.abort();
                stderr_task.abort();
                Termination::Exited(None)
            }
            None => {
                info!(
                    "{} did not exit within {}ms, killing it",
                    program,
                    self.timeout.as_millis()
                );
                kill_and_reap(&mut child, program).await;
                finish_drain(stdout_task).await;
                finish_drain(stderr_task).await;
                Termination::TimedOut
            }
        };

        let stdout = String::from_utf8_lossy(&stdout_buf.lock()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_buf.lock()).into_owned();

        debug!(
            "{} finished: {:?}, {} bytes stdout, {} bytes stderr, {:.1}s",
            program,
            termination,
            stdout.len(),
            stderr.len(),
            started.elapsed().as_secs_f32()
        );

        match termination {
            Termination::Exited(code) if code != Some(0) && stdout.is_empty() => {
                let stderr = if stderr.trim().is_empty() {
                    COMMAND_FAILED_MESSAGE.to_string()
                } else {
                    stderr.trim().to_string()
                };
                Err(RunError::Exited { code, stderr })
            }
            termination => Ok(RunOutput {
                stdout,
                stderr,
                termination,
                pid,
            }),
        }
    }
}

/// Wait for the child to exit, or return `None` once `timeout` has elapsed
async fn wait_or_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Option<std::io::Result<ExitStatus>> {
    tokio::select! {
        status = child.wait() => Some(status),
        _ = tokio::time::sleep(timeout) => None,
    }
}

/// Kill the child and wait for it so no zombie is left behind
async fn kill_and_reap(child: &mut Child, program: &str) {
    if let Err(e) = child.start_kill() {
        debug!("Kill of {} failed (already exited?): {}", program, e);
    }
    if let Err(e) = child.wait().await {
        warn!("Failed to reap {}: {}", program, e);
    }
}

/// Copy a child stream into a shared buffer until EOF or error
fn drain_into<R>(reader: Option<R>, buf: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buf.lock().extend_from_slice(&chunk[..n]),
                Err(e) => {
                    debug!("Stream read error: {}", e);
                    break;
                }
            }
        }
    })
}

/// Give a drain task a short grace period, then stop it
async fn finish_drain(task: JoinHandle<()>) {
    let abort = task.abort_handle();
    if tokio::time::timeout(DRAIN_GRACE, task).await.is_err() {
        abort.abort();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_captures_stdout_on_success() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let output = runner
            .run("sh", &sh("echo hello; echo oops >&2"), None)
            .await
            .unwrap();
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
        assert_eq!(output.termination, Termination::Exited(Some(0)));
    }

    #[tokio::test]
    async fn test_writes_stdin_line_then_closes() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        // `cat` only exits once stdin is closed
        let output = runner.run("cat", &[], Some("/usage")).await.unwrap();
        assert_eq!(output.stdout, "/usage\n");
        assert!(!output.timed_out());
    }

    #[tokio::test]
    async fn test_nonzero_exit_with_output_is_success() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let output = runner
            .run("sh", &sh("echo '42% used'; exit 3"), None)
            .await
            .unwrap();
        assert_eq!(output.stdout, "42% used\n");
        assert_eq!(output.termination, Termination::Exited(Some(3)));
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_output_surfaces_stderr() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let err = runner
            .run("sh", &sh("echo 'not logged in' >&2; exit 1"), None)
            .await
            .unwrap_err();
        match err {
            RunError::Exited { code, stderr } => {
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "not logged in");
            }
            other => panic!("Expected Exited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_silent_uses_fallback() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let err = runner.run("sh", &sh("exit 1"), None).await.unwrap_err();
        assert_eq!(err.to_string(), COMMAND_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let err = runner
            .run("usagemon-definitely-not-installed", &[], None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_timeout_returns_partial_output_and_kills_child() {
        let runner = ProcessRunner::new(Duration::from_millis(300));
        let started = Instant::now();
        let output = runner
            .run("sh", &sh("echo 'partial'; exec sleep 30"), None)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(output.timed_out());
        assert_eq!(output.stdout, "partial\n");

        let pid = nix::unistd::Pid::from_raw(output.pid.unwrap() as i32);
        assert!(nix::sys::signal::kill(pid, None).is_err());
    }

    #[tokio::test]
    async fn test_timeout_with_no_output() {
        let runner = ProcessRunner::new(Duration::from_millis(200));
        let output = runner.run("sleep", &["30".to_string()], None).await.unwrap();
        assert!(output.timed_out());
        assert!(output.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_lossy() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let output = runner
            .run("sh", &sh("printf '\\377\\376ok'"), None)
            .await
            .unwrap();
        assert!(output.stdout.ends_with("ok"));
    }
}
