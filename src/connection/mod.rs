//! Uniform command execution against the local machine or a remote host.
//!
//! [`Connection`] is the single capability the orchestrator relies on: run a
//! shell command with an environment, check for paths, and read a file from
//! the target's home directory. [`LocalConnection`] drives the local shell;
//! [`RemoteConnection`] drives the system `ssh` and `scp` clients.

use std::fmt;

use crate::environment::EnvironmentOverrides;
use crate::exec::{CommandOutput, ExecError};
use crate::shell::quote_path;

mod local;
mod remote;

pub use local::LocalConnection;
pub use remote::{RemoteConnection, SshOptions, inline_environment};

/// Reserved target name selecting local execution.
pub const LOCAL_TARGET: &str = "local";

/// Where the command runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Target {
    /// The invoking machine.
    Local,
    /// A remote host reached over SSH, addressed as `user@host`.
    Remote(String),
}

impl Target {
    /// Interprets a CLI target token; `local` selects local execution.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        if token == LOCAL_TARGET {
            Self::Local
        } else {
            Self::Remote(token.to_owned())
        }
    }

    /// Returns `true` for remote targets.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Host name used in user-facing messages.
    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            Self::Local => "localhost",
            Self::Remote(address) => address
                .rsplit_once('@')
                .map_or(address.as_str(), |(_, host)| host),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str(LOCAL_TARGET),
            Self::Remote(address) => f.write_str(address),
        }
    }
}

/// Kind of filesystem entry an existence check looks for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathKind {
    /// A directory (`test -d`).
    Directory,
    /// A regular file (`test -f`).
    File,
}

impl PathKind {
    const fn test_flag(self) -> &'static str {
        match self {
            Self::Directory => "-d",
            Self::File => "-f",
        }
    }
}

/// Capability to execute shell commands on a target.
pub trait Connection {
    /// The target this connection executes on.
    fn target(&self) -> &Target;

    /// Establishes (or verifies) the connection before first use.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Connection`] when the target is unreachable.
    fn open(&self) -> Result<(), ExecError>;

    /// Runs `command` through the target's shell with `env` visible to it.
    ///
    /// The returned output carries the command's exit status; a non-zero
    /// status is not an error at this level.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when the command cannot be launched.
    fn run(&self, command: &str, env: &EnvironmentOverrides) -> Result<CommandOutput, ExecError>;

    /// Runs a preparation command without extra environment and without
    /// handing it the caller's standard input, so piped input is left for
    /// the final command.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when the command cannot be launched.
    fn run_unattended(&self, command: &str) -> Result<CommandOutput, ExecError>;

    /// Reads `name` relative to the target user's home directory.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when the target cannot be queried or the file
    /// cannot be read.
    fn read_home_file(&self, name: &str) -> Result<Option<String>, ExecError>;

    /// Checks whether `path` exists on the target using a single `test`
    /// invocation and its exit status.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::CommandFailure`] when `test` reports anything
    /// other than status 0 or 1.
    fn path_exists(&self, path: &str, kind: PathKind) -> Result<bool, ExecError> {
        let command = format!("test {} {}", kind.test_flag(), quote_path(path));
        let output = self.run_unattended(&command)?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(ExecError::failure("test", output)),
        }
    }

    /// Runs `command` through [`Connection::run_unattended`] and requires a
    /// zero exit status.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::CommandFailure`] for non-zero statuses.
    fn run_checked(&self, command: &str) -> Result<CommandOutput, ExecError> {
        let output = self.run_unattended(command)?;
        if output.is_success() {
            Ok(output)
        } else {
            Err(ExecError::failure(command, output))
        }
    }
}
