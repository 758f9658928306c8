//! Project synchronisation to the remote workspace using `rsync` over the
//! same SSH options as the command connection.

use std::ffi::OsString;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::info;

use crate::connection::SshOptions;
use crate::environment::EnvironmentOverrides;
use crate::exec::{CommandRunner, ExecError};
use crate::settings::SrunSettings;

/// Entries never copied to the remote workspace.
pub const SYNC_EXCLUDES: &[&str] = &["__pycache__", "*.swp", ".git", ".DS_Store", ".gitignore"];

/// Errors raised while synchronising the project directory.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SyncError {
    /// Raised when the local source directory does not exist.
    #[error("source directory {path} does not exist")]
    MissingSource {
        /// Directory that was expected to exist.
        path: Utf8PathBuf,
    },
    /// Raised when `rsync` exits with a non-zero status.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Command name used for the transfer.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
    /// Raised when `rsync` cannot be launched.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Remote location receiving the project files.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyncDestination {
    /// `user@host` address of the remote machine.
    pub address: String,
    /// Workspace directory on the remote machine.
    pub path: Utf8PathBuf,
}

impl fmt::Display for SyncDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.path)
    }
}

/// Copies the project directory to a remote workspace.
#[derive(Clone, Debug)]
pub struct Syncer<R: CommandRunner> {
    rsync_bin: String,
    ssh: SshOptions,
    runner: R,
}

impl<R: CommandRunner> Syncer<R> {
    /// Creates a syncer using the configured binaries.
    #[must_use]
    pub fn new(settings: &SrunSettings, runner: R) -> Self {
        Self {
            rsync_bin: settings.rsync_bin.clone(),
            ssh: SshOptions::from_settings(settings),
            runner,
        }
    }

    /// Recursively copies the contents of `source` into `destination`,
    /// preserving attributes and compressing in transit.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingSource`] when the source directory is
    /// absent, or [`SyncError::CommandFailure`] if `rsync` returns a non-zero
    /// exit code.
    pub fn sync(&self, source: &Utf8Path, destination: &SyncDestination) -> Result<(), SyncError> {
        let args = self.build_rsync_args(source, destination)?;
        info!(%source, %destination, "synchronising project");
        let output = self
            .runner
            .run(&self.rsync_bin, &args, &EnvironmentOverrides::new())?;
        if output.is_success() {
            return Ok(());
        }

        Err(SyncError::CommandFailure {
            program: self.rsync_bin.clone(),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr.trim_end().to_owned(),
        })
    }

    fn build_rsync_args(
        &self,
        source: &Utf8Path,
        destination: &SyncDestination,
    ) -> Result<Vec<OsString>, SyncError> {
        if !source.is_dir() {
            return Err(SyncError::MissingSource {
                path: source.to_path_buf(),
            });
        }

        let mut args = vec![
            OsString::from("-a"),
            OsString::from("-v"),
            OsString::from("-z"),
        ];
        for pattern in SYNC_EXCLUDES {
            args.push(OsString::from("--exclude"));
            args.push(OsString::from(*pattern));
        }
        args.push(OsString::from("--rsh"));
        args.push(OsString::from(self.ssh.remote_shell()));
        args.push(OsString::from(format!("{source}/")));
        args.push(OsString::from(destination.to_string()));
        Ok(args)
    }
}

#[cfg(test)]
mod tests;
