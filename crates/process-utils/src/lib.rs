//! Small process-related helpers shared across the workspace.
//!
//! The main entry point is [`run_captured`], which runs a child process to
//! completion while collecting both output streams, bounded by a hard timeout
//! and an external [`CancellationToken`]. A child that overruns either bound is
//! killed and reaped before the call returns.

use std::ffi::OsStr;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors from running a child process.
#[derive(Debug, Error)]
pub enum RunError {
    /// The process could not be started.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process did not exit within the allotted time and was killed.
    #[error("process timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The cancellation token fired while the process was running.
    #[error("process was cancelled")]
    Cancelled,

    /// Reading output or waiting for exit failed.
    #[error("I/O error while waiting for process: {0}")]
    Io(#[from] io::Error),
}

/// Output of a child process that exited on its own.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or `-1` when the process was terminated by a signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// Standard output decoded lossily and split into lines.
    pub fn stdout_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.stdout)
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Standard error decoded lossily, surrounding whitespace trimmed.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Create a `tokio::process::Command` set up for captured execution.
///
/// stdin is closed, stdout/stderr are piped and the child is killed if its
/// handle is dropped before it exits.
pub fn tokio_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

enum Outcome {
    Exited(io::Result<CapturedOutput>),
    TimedOut,
    Cancelled,
}

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// A non-zero exit status is not an error here; callers inspect
/// [`CapturedOutput::status`]. If `timeout` elapses or `cancel` fires first,
/// the child is killed (kill errors are ignored) and reaped.
pub async fn run_captured(
    mut cmd: Command,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<CapturedOutput, RunError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
        program: program.clone(),
        source,
    })?;

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Outcome::Cancelled,
        res = tokio::time::timeout(timeout, collect(&mut child)) => match res {
            Ok(output) => Outcome::Exited(output),
            Err(_) => Outcome::TimedOut,
        },
    };

    match outcome {
        Outcome::Exited(output) => Ok(output?),
        Outcome::TimedOut => {
            terminate(&mut child, &program).await;
            Err(RunError::Timeout { elapsed: timeout })
        }
        Outcome::Cancelled => {
            terminate(&mut child, &program).await;
            Err(RunError::Cancelled)
        }
    }
}

async fn collect(child: &mut Child) -> io::Result<CapturedOutput> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    let (stdout, stderr) = tokio::try_join!(read_pipe(stdout.as_mut()), read_pipe(stderr.as_mut()))?;
    let status = child.wait().await?;

    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
    })
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<&mut R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Best-effort kill and reap.
async fn terminate(child: &mut Child, program: &str) {
    if let Err(e) = child.kill().await {
        debug!(program, error = %e, "Failed to kill child process");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = tokio_command("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let token = CancellationToken::new();
        let output = run_captured(
            sh("echo first; echo second; echo oops >&2"),
            Duration::from_secs(5),
            &token,
        )
        .await
        .unwrap();

        assert!(output.success());
        assert_eq!(output.code(), 0);
        assert_eq!(output.stdout_lines(), vec!["first", "second"]);
        assert_eq!(output.stderr_lossy(), "oops");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported_not_raised() {
        let token = CancellationToken::new();
        let output = run_captured(sh("echo busy >&2; exit 240"), Duration::from_secs(5), &token)
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.code(), 240);
        assert_eq!(output.stderr_lossy(), "busy");
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let token = CancellationToken::new();
        let started = Instant::now();
        let err = run_captured(sh("sleep 10"), Duration::from_millis(100), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Timeout { elapsed } if elapsed == Duration::from_millis(100)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = run_captured(sh("sleep 10"), Duration::from_secs(30), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let token = CancellationToken::new();
        let err = run_captured(
            tokio_command("/nonexistent/definitely-not-a-binary"),
            Duration::from_secs(1),
            &token,
        )
        .await
        .unwrap_err();

        match err {
            RunError::Spawn { program, .. } => {
                assert_eq!(program, "/nonexistent/definitely-not-a-binary")
            }
            other => panic!("expected Spawn, got {other:?}"),
        }
    }
}
