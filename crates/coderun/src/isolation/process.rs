//! Process spawning and I/O
//!
//! Runs a command with piped stdio under a wall-clock limit. Each child is
//! placed in its own process group, and that group is killed once the child
//! exits or times out, so nothing it spawned outlives it.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty command")]
    EmptyCommand,

    #[error("command '{0}' not found")]
    NotFound(String),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Captured result of a process that exited on its own
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,

    /// Signal number if the process was killed by a signal
    pub signal: Option<i32>,

    pub stdout: Vec<u8>,

    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Check if the process exited with code 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl From<std::process::Output> for ProcessOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            signal: output.status.signal(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// How a bounded process run ended
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Exited(ProcessOutput),

    /// The limit elapsed and the process group was killed
    TimedOut,
}

/// Resolve the program in a command for direct local execution.
///
/// Bare names (like `g++`) are looked up in PATH. Relative paths (like
/// `./MainExec`) are anchored at `cwd`, since they name artifacts in the
/// working directory rather than in ours.
pub fn resolve_program(command: &mut [String], cwd: &Path) -> Result<(), ProcessError> {
    let first = command.first_mut().ok_or(ProcessError::EmptyCommand)?;

    if first.starts_with('/') {
        return Ok(());
    }

    if first.contains('/') {
        *first = cwd.join(&*first).to_string_lossy().into_owned();
        return Ok(());
    }

    let resolved = which::which(&*first).map_err(|_| ProcessError::NotFound(first.clone()))?;
    *first = resolved.to_string_lossy().into_owned();
    Ok(())
}

/// Run a command to completion or until `limit` elapses
///
/// `stdin` is written from a background task so a program that produces a lot
/// of output before reading its input cannot deadlock against us. When `stdin`
/// is `None` the child gets `/dev/null`.
#[instrument(skip(command, stdin), fields(program = command.first().map(String::as_str)))]
pub async fn run_process(
    command: &[String],
    cwd: Option<&Path>,
    stdin: Option<&[u8]>,
    limit: Duration,
) -> Result<ProcessOutcome, ProcessError> {
    let (program, args) = command.split_first().ok_or(ProcessError::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ProcessError::NotFound(program.clone())
        } else {
            ProcessError::Spawn {
                program: program.clone(),
                source,
            }
        }
    })?;
    let pid = child.id();

    let writer = match (stdin, child.stdin.take()) {
        (Some(data), Some(mut pipe)) => {
            let data = data.to_vec();
            Some(tokio::spawn(async move {
                let result = pipe.write_all(&data).await;
                // Dropping the pipe delivers EOF
                drop(pipe);
                result
            }))
        }
        _ => None,
    };

    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            // Anything the program left running in the background goes with it
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            if let Some(writer) = writer {
                // A descendant may still hold stdin open; never wait on it
                if !writer.is_finished() {
                    writer.abort();
                } else if let Ok(Err(e)) = writer.await
                    && e.kind() != io::ErrorKind::BrokenPipe
                {
                    warn!(error = %e, "failed to deliver stdin");
                }
            }
            let output = ProcessOutput::from(output);
            debug!(
                exit_code = ?output.exit_code,
                signal = ?output.signal,
                stdout_len = output.stdout.len(),
                stderr_len = output.stderr.len(),
                "process exited"
            );
            Ok(ProcessOutcome::Exited(output))
        }
        Ok(Err(e)) => Err(ProcessError::Io(e)),
        Err(_) => {
            // The child itself was killed on drop; take the rest of its group too
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            if let Some(writer) = writer {
                writer.abort();
            }
            debug!(?limit, "process timed out");
            Ok(ProcessOutcome::TimedOut)
        }
    }
}

fn kill_process_group(pgid: u32) {
    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "failed to kill process group"),
    }
}
