//! Process execution primitives shared by the local and remote connections.
//!
//! Every external program `srun` touches (`ssh`, `scp`, `rsync`, the local
//! shell) is launched through a [`CommandRunner`], so tests can substitute a
//! scripted runner and inspect exactly what would have been executed.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;

use crate::environment::EnvironmentOverrides;

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Renders the exit status for error messages.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Errors raised while launching or interpreting external commands.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ExecError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a command completes with an unexpected exit status.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Command name used for the attempted operation.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
    /// Raised when a local file cannot be accessed.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the secure-shell connection cannot be established.
    #[error("cannot connect to {address}: {message}")]
    Connection {
        /// Address that was dialled.
        address: String,
        /// Transport diagnostics, usually ssh's stderr.
        message: String,
    },
}

impl ExecError {
    /// Builds a [`ExecError::CommandFailure`] from captured output.
    #[must_use]
    pub fn failure(program: &str, output: CommandOutput) -> Self {
        Self::CommandFailure {
            program: program.to_owned(),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr.trim_end().to_owned(),
        }
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments and extra environment,
    /// capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Spawn`] if the command cannot be started.
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        env: &EnvironmentOverrides,
    ) -> Result<CommandOutput, ExecError>;
}

/// Runner that forwards output to the terminal as it arrives while also
/// capturing it.
///
/// Standard input is inherited so interactive commands keep working.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamingCommandRunner;

impl CommandRunner for StreamingCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        env: &EnvironmentOverrides,
    ) -> Result<CommandOutput, ExecError> {
        let spawn_error = |message: String| ExecError::Spawn {
            program: program.to_owned(),
            message,
        };

        let mut child = Command::new(program)
            .args(args)
            .envs(env.iter())
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error(err.to_string()))?;

        let child_stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(String::from("stdout pipe unavailable")))?;
        let child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error(String::from("stderr pipe unavailable")))?;

        let (forwarded_out, forwarded_err) = thread::scope(|scope| {
            let out = scope.spawn(|| tee(child_stdout, io::stdout()));
            let err = scope.spawn(|| tee(child_stderr, io::stderr()));
            (join_tee(out), join_tee(err))
        });
        let stdout = forwarded_out.map_err(&spawn_error)?;
        let stderr = forwarded_err.map_err(&spawn_error)?;

        let status = child.wait().map_err(|err| spawn_error(err.to_string()))?;

        Ok(CommandOutput {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

fn tee(mut reader: impl Read, mut sink: impl Write) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        let chunk = buffer.get(..read).unwrap_or_default();
        sink.write_all(chunk)?;
        sink.flush()?;
        captured.extend_from_slice(chunk);
    }
    Ok(captured)
}

fn join_tee(handle: thread::ScopedJoinHandle<'_, io::Result<Vec<u8>>>) -> Result<Vec<u8>, String> {
    match handle.join() {
        Ok(result) => result.map_err(|err| err.to_string()),
        Err(_) => Err(String::from("output forwarding thread panicked")),
    }
}

#[cfg(test)]
mod tests;
