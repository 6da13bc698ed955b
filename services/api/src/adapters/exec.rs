//! services/api/src/adapters/exec.rs
//!
//! This module contains the code-execution adapter, which implements the
//! `CodeExecutionService` port from the `core` crate.
//!
//! SECURITY WARNING: the submitted code runs with the full privileges of the
//! server user. No import restriction, no resource limiting, no
//! filesystem/network isolation. This is a teaching demo, not a sandbox.
//! Each execution gets its own child process with private stdout/stderr
//! pipes, so concurrent runs cannot corrupt each other's captured output,
//! and a wall-clock timeout bounds how long one run may block.

use async_trait::async_trait;
use learnsphere_core::domain::ExecutionOutcome;
use learnsphere_core::ports::CodeExecutionService;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::warn;

/// How long to keep draining the output pipes after the child has exited or
/// been killed. Orphaned grandchildren can inherit the pipe and hold it open
/// past the kill, so the drain must not wait for EOF unconditionally.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

//=========================================================================================
// Stream Capture
//=========================================================================================

/// Accumulates one child stream into a shared buffer so that partial output
/// survives a kill and can be snapshotted without waiting for EOF.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

fn capture<R>(stream: Option<R>) -> Capture
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf = Arc::new(Mutex::new(Vec::new()));
    let task = tokio::spawn({
        let buf = buf.clone();
        async move {
            let Some(mut stream) = stream else { return };
            let mut chunk = [0u8; 4096];
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.lock().unwrap().extend_from_slice(&chunk[..n]),
                }
            }
        }
    });
    Capture { buf, task }
}

impl Capture {
    /// Waits briefly for the reader to hit EOF, then returns whatever was
    /// captured. A reader still blocked on an inherited pipe is left to
    /// finish in the background.
    async fn finish(self) -> String {
        let _ = tokio::time::timeout(DRAIN_GRACE, self.task).await;
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Runs submitted code via `<interpreter> -c <code>` and captures both
/// output streams.
pub struct SubprocessExecAdapter {
    interpreter: String,
    timeout: Duration,
}

impl SubprocessExecAdapter {
    /// Creates a new `SubprocessExecAdapter`.
    pub fn new(interpreter: String, timeout: Duration) -> Self {
        Self {
            interpreter,
            timeout,
        }
    }
}

//=========================================================================================
// `CodeExecutionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CodeExecutionService for SubprocessExecAdapter {
    async fn run(&self, code: &str) -> ExecutionOutcome {
        let mut child = match Command::new(&self.interpreter)
            .arg("-c")
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(interpreter = %self.interpreter, error = %e, "failed to spawn interpreter");
                return ExecutionOutcome {
                    output: String::new(),
                    error: format!("failed to start interpreter '{}': {}", self.interpreter, e),
                };
            }
        };

        let stdout_capture = capture(child.stdout.take());
        let stderr_capture = capture(child.stderr.take());

        let mut wait_failure = None;
        let timed_out = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(_status)) => false,
            Ok(Err(e)) => {
                wait_failure = Some(e.to_string());
                false
            }
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                true
            }
        };

        let output = stdout_capture.finish().await;
        let mut error = stderr_capture.finish().await;

        if let Some(failure) = wait_failure {
            push_line(&mut error, &format!("failed to wait for interpreter: {}", failure));
        }
        if timed_out {
            push_line(
                &mut error,
                &format!("execution timed out after {}s", self.timeout.as_secs()),
            );
        }

        ExecutionOutcome { output, error }
    }
}

fn push_line(buf: &mut String, line: &str) {
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
    buf.push_str(line);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(timeout: Duration) -> SubprocessExecAdapter {
        SubprocessExecAdapter::new("sh".to_string(), timeout)
    }

    #[tokio::test]
    async fn captures_stdout_with_empty_error() {
        let outcome = sh(Duration::from_secs(5)).run("echo 'Test Output'").await;
        assert_eq!(outcome.output, "Test Output\n");
        assert_eq!(outcome.error, "");
    }

    #[tokio::test]
    async fn failing_code_keeps_partial_output() {
        let outcome = sh(Duration::from_secs(5))
            .run("echo partial; definitely_not_a_command_xyz")
            .await;
        assert_eq!(outcome.output, "partial\n");
        assert!(!outcome.error.is_empty());
    }

    #[tokio::test]
    async fn runaway_code_is_killed_after_timeout() {
        let outcome = sh(Duration::from_millis(200))
            .run("echo before; sleep 30; echo after")
            .await;
        assert_eq!(outcome.output, "before\n");
        assert!(outcome.error.contains("timed out"));
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported_in_error() {
        let adapter = SubprocessExecAdapter::new(
            "no-such-interpreter-xyz".to_string(),
            Duration::from_secs(1),
        );
        let outcome = adapter.run("print('hi')").await;
        assert_eq!(outcome.output, "");
        assert!(outcome.error.contains("failed to start interpreter"));
    }
}
