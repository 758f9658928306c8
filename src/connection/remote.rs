//! Remote execution over the system `ssh` client.

use std::ffi::OsString;

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Connection, PathKind, Target};
use crate::environment::EnvironmentOverrides;
use crate::exec::{CommandOutput, CommandRunner, ExecError};
use crate::settings::SrunSettings;
use crate::shell::{expand_leading_home, home_dir, quote, quote_path};

/// Options shared by every `ssh`-based transport (`ssh`, `scp`, and rsync's
/// remote shell).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshOptions {
    /// Path to the `ssh` executable.
    pub ssh_bin: String,
    /// Whether to pass `-o BatchMode=yes`.
    pub batch_mode: bool,
    /// Optional private key passed with `-i`.
    pub identity_file: Option<String>,
}

impl SshOptions {
    /// Extracts SSH options from the tool settings.
    #[must_use]
    pub fn from_settings(settings: &SrunSettings) -> Self {
        Self {
            ssh_bin: settings.ssh_bin.clone(),
            batch_mode: settings.ssh_batch_mode,
            identity_file: settings.ssh_identity_file.clone(),
        }
    }

    /// Option arguments understood by both `ssh` and `scp`.
    ///
    /// Host keys come from the user's own `known_hosts`; nothing here relaxes
    /// host key checking.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::new();

        if self.batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if let Some(ref identity_file) = self.identity_file {
            let expanded = home_dir().map_or_else(
                || identity_file.clone(),
                |home| expand_leading_home(identity_file, &home),
            );
            args.push(OsString::from("-i"));
            args.push(OsString::from(expanded));
        }

        args
    }

    /// Remote shell string for `rsync --rsh`.
    #[must_use]
    pub fn remote_shell(&self) -> String {
        let mut parts = vec![self.ssh_bin.clone()];
        parts.extend(
            self.args()
                .into_iter()
                .map(|arg| quote(&arg.to_string_lossy())),
        );
        parts.join(" ")
    }
}

/// Runs commands on `user@host` through `ssh`.
///
/// The environment is inlined into the command line as
/// `export K=V ... && <command>`, so the variables reach the remote shell even
/// when the server refuses `SendEnv`/`AcceptEnv`.
#[derive(Clone, Debug)]
pub struct RemoteConnection<R: CommandRunner> {
    target: Target,
    address: String,
    ssh: SshOptions,
    scp_bin: String,
    scratch_dir: Utf8PathBuf,
    runner: R,
}

impl<R: CommandRunner> RemoteConnection<R> {
    /// Creates a connection to `address` using the configured binaries.
    #[must_use]
    pub fn new(address: impl Into<String>, settings: &SrunSettings, runner: R) -> Self {
        let remote_address = address.into();
        let scratch_dir = Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
        Self {
            target: Target::Remote(remote_address.clone()),
            address: remote_address,
            ssh: SshOptions::from_settings(settings),
            scp_bin: settings.scp_bin.clone(),
            scratch_dir,
            runner,
        }
    }

    /// Overrides the local directory that receives copied files.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// The `user@host` address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// SSH options used by this connection.
    #[must_use]
    pub const fn ssh_options(&self) -> &SshOptions {
        &self.ssh
    }

    fn build_ssh_args(&self, remote_command: &str, stdin: StdinMode) -> Vec<OsString> {
        let mut args = self.ssh.args();
        if stdin == StdinMode::Closed {
            args.push(OsString::from("-n"));
        }
        args.push(OsString::from(&self.address));
        args.push(OsString::from(remote_command));
        args
    }

    fn copy_to_scratch(&self, name: &str) -> Result<String, ExecError> {
        let scratch_name = format!("srun-{}-{}", Uuid::new_v4(), name.trim_start_matches('.'));
        let scratch_path = self.scratch_dir.join(&scratch_name);

        let mut args = self.ssh.args();
        args.push(OsString::from("-q"));
        args.push(OsString::from(format!("{}:{name}", self.address)));
        args.push(OsString::from(scratch_path.as_str()));
        let output = self
            .runner
            .run(&self.scp_bin, &args, &EnvironmentOverrides::new())?;
        if !output.is_success() {
            return Err(ExecError::failure(&self.scp_bin, output));
        }

        let io_error = |err: std::io::Error| ExecError::Io {
            path: scratch_path.to_string(),
            message: err.to_string(),
        };
        let dir = Dir::open_ambient_dir(&self.scratch_dir, ambient_authority()).map_err(io_error)?;
        let contents = dir.read_to_string(&scratch_name).map_err(io_error)?;
        if let Err(err) = dir.remove_file(&scratch_name) {
            warn!(path = %scratch_path, error = %err, "could not remove scratch copy");
        }
        Ok(contents)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StdinMode {
    Forwarded,
    Closed,
}

/// Prefixes `command` with `export` statements for `env`.
///
/// Values keep a leading `~` unquoted so the target shell expands it.
#[must_use]
pub fn inline_environment(env: &EnvironmentOverrides, command: &str) -> String {
    if env.is_empty() {
        return command.to_owned();
    }
    let assignments = env
        .iter()
        .map(|(key, value)| format!("{key}={}", quote_path(value)))
        .collect::<Vec<_>>()
        .join(" ");
    format!("export {assignments} && {command}")
}

impl<R: CommandRunner> Connection for RemoteConnection<R> {
    fn target(&self) -> &Target {
        &self.target
    }

    fn open(&self) -> Result<(), ExecError> {
        debug!(address = %self.address, "opening ssh connection");
        let output = self.runner.run(
            &self.ssh.ssh_bin,
            &self.build_ssh_args("true", StdinMode::Closed),
            &EnvironmentOverrides::new(),
        )?;
        if output.is_success() {
            return Ok(());
        }

        let stderr = output.stderr.trim();
        let message = if stderr.is_empty() {
            format!("ssh exited with status {}", output.status_text())
        } else {
            stderr.to_owned()
        };
        Err(ExecError::Connection {
            address: self.address.clone(),
            message,
        })
    }

    fn run(&self, command: &str, env: &EnvironmentOverrides) -> Result<CommandOutput, ExecError> {
        debug!(address = %self.address, %command, "running remote command");
        let remote_command = inline_environment(env, command);
        self.runner.run(
            &self.ssh.ssh_bin,
            &self.build_ssh_args(&remote_command, StdinMode::Forwarded),
            &EnvironmentOverrides::new(),
        )
    }

    fn run_unattended(&self, command: &str) -> Result<CommandOutput, ExecError> {
        debug!(address = %self.address, %command, "running remote setup command");
        self.runner.run(
            &self.ssh.ssh_bin,
            &self.build_ssh_args(command, StdinMode::Closed),
            &EnvironmentOverrides::new(),
        )
    }

    fn read_home_file(&self, name: &str) -> Result<Option<String>, ExecError> {
        if !self.path_exists(name, PathKind::File)? {
            return Ok(None);
        }
        self.copy_to_scratch(name).map(Some)
    }
}
