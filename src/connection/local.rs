//! Local shell execution.

use std::ffi::OsString;
use std::io;

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use tracing::debug;

use super::{Connection, Target};
use crate::environment::EnvironmentOverrides;
use crate::exec::{CommandOutput, CommandRunner, ExecError};
use crate::shell::home_dir;

/// Runs commands through a local shell (`<shell> -c <command>`), merging the
/// supplied environment into the current process environment.
#[derive(Clone, Debug)]
pub struct LocalConnection<R: CommandRunner> {
    target: Target,
    shell: String,
    home: Option<Utf8PathBuf>,
    runner: R,
}

impl<R: CommandRunner> LocalConnection<R> {
    /// Creates a local connection using `shell` and the `HOME` directory of
    /// the invoking user.
    #[must_use]
    pub fn new(shell: impl Into<String>, runner: R) -> Self {
        Self {
            target: Target::Local,
            shell: shell.into(),
            home: home_dir().map(Utf8PathBuf::from),
            runner,
        }
    }

    /// Overrides the home directory used to resolve home-relative files.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<Utf8PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }
}

impl<R: CommandRunner> Connection for LocalConnection<R> {
    fn target(&self) -> &Target {
        &self.target
    }

    fn open(&self) -> Result<(), ExecError> {
        Ok(())
    }

    fn run(&self, command: &str, env: &EnvironmentOverrides) -> Result<CommandOutput, ExecError> {
        debug!(shell = %self.shell, %command, "running local command");
        let args = [OsString::from("-c"), OsString::from(command)];
        self.runner.run(&self.shell, &args, env)
    }

    fn run_unattended(&self, command: &str) -> Result<CommandOutput, ExecError> {
        self.run(command, &EnvironmentOverrides::new())
    }

    fn read_home_file(&self, name: &str) -> Result<Option<String>, ExecError> {
        let Some(ref home) = self.home else {
            return Ok(None);
        };
        let io_error = |err: io::Error| ExecError::Io {
            path: home.join(name).to_string(),
            message: err.to_string(),
        };

        let dir = match Dir::open_ambient_dir(home, ambient_authority()) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(err)),
        };
        match dir.read_to_string(name) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(err)),
        }
    }
}
