//! Orchestrates a run end to end.
//!
//! Remote runs open the SSH connection, load the options file from the
//! remote home directory, create a fresh workspace, synchronise the project
//! into it, provision the virtualenv, and finally execute the composed
//! command. Local runs load the local options file and execute the composed
//! command through the local shell. The exit status of the final command is
//! returned unchanged so callers observe the same status locally.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::compose::{BackgroundSession, CommandPlan, REQUIREMENTS_FILE, gpu_assignments};
use crate::connection::{Connection, LocalConnection, RemoteConnection, Target};
use crate::environment::EnvironmentOverrides;
use crate::exec::{CommandRunner, ExecError};
use crate::options::{self, OptionsError, SrunOptions};
use crate::provision::{ProvisionError, provision_virtualenv};
use crate::settings::SrunSettings;
use crate::shell::quote_path;
use crate::sync::{SyncDestination, SyncError, Syncer};
use crate::workspace::Workspace;

/// Errors surfaced while performing a run.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RunError {
    /// Raised when the remote host cannot be reached.
    #[error(transparent)]
    Connection(ExecError),
    /// Raised when the options file is missing or incomplete.
    #[error(transparent)]
    Options(#[from] OptionsError),
    /// Raised when the remote workspace cannot be created.
    #[error("failed to create workspace {path}: {source}")]
    Workspace {
        /// Workspace path on the remote host.
        path: Utf8PathBuf,
        /// Underlying command failure.
        #[source]
        source: ExecError,
    },
    /// Raised when synchronising the project fails.
    #[error("workspace sync failed: {0}")]
    Sync(#[from] SyncError),
    /// Raised when the virtualenv cannot be provisioned.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    /// Raised when the final command cannot be launched.
    #[error("command failed to start: {0}")]
    Command(#[source] ExecError),
}

/// What to run and where.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunRequest {
    /// Execution target.
    pub target: Target,
    /// Environment assignments supplied on the command line.
    pub overrides: EnvironmentOverrides,
    /// Literal command line.
    pub command: String,
    /// Whether to detach the command into a terminal session.
    pub background: bool,
    /// Project directory synchronised to the remote host and inspected for
    /// `requirements.txt`.
    pub source_dir: Utf8PathBuf,
}

/// Result of a completed run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunOutcome {
    /// Exit status of the final command, if it exited normally.
    pub exit_code: Option<i32>,
    /// Workspace that received the project, for remote runs.
    pub workspace: Option<Utf8PathBuf>,
    /// Name of the detached session, for background runs.
    pub session: Option<String>,
}

/// Executes runs against local or remote targets.
#[derive(Clone, Debug)]
pub struct RunOrchestrator<R: CommandRunner + Clone> {
    settings: SrunSettings,
    runner: R,
    local_home: Option<Utf8PathBuf>,
    scratch_dir: Option<Utf8PathBuf>,
    workspace_id: Option<String>,
}

impl<R: CommandRunner + Clone> RunOrchestrator<R> {
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(settings: SrunSettings, runner: R) -> Self {
        Self {
            settings,
            runner,
            local_home: None,
            scratch_dir: None,
            workspace_id: None,
        }
    }

    /// Overrides the home directory searched for the options file in local
    /// mode.
    #[must_use]
    pub fn with_local_home(mut self, home: impl Into<Utf8PathBuf>) -> Self {
        self.local_home = Some(home.into());
        self
    }

    /// Overrides the local directory receiving the copied remote options
    /// file.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Fixes the workspace identifier instead of generating one.
    ///
    /// This is primarily used by tests to keep composed commands
    /// predictable.
    #[must_use]
    pub fn with_workspace_id(mut self, id: impl Into<String>) -> Self {
        self.workspace_id = Some(id.into());
        self
    }

    /// Runs `request` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when any preparation step fails or the final
    /// command cannot be launched. A command that runs and exits non-zero is
    /// not an error; its status is reported in the outcome.
    pub fn execute(&self, request: &RunRequest) -> Result<RunOutcome, RunError> {
        match request.target {
            Target::Local => self.execute_local(request),
            Target::Remote(ref address) => self.execute_remote(address, request),
        }
    }

    fn execute_local(&self, request: &RunRequest) -> Result<RunOutcome, RunError> {
        let mut connection = LocalConnection::new(&self.settings.shell_bin, self.runner.clone());
        if let Some(ref home) = self.local_home {
            connection = connection.with_home(home.clone());
        }

        let options = options::load(&connection, &self.settings.options_file)?;
        let env = request.overrides.with_defaults(&options);

        let mut plan = CommandPlan::new(&request.command);
        if has_requirements(&request.source_dir) {
            plan = plan.install_requirements(options.virtualenv());
        }
        let session = request.background.then(|| self.allocate_id());
        if let Some(ref name) = session {
            plan = plan.in_background(self.session(name), &env);
        }

        let exit_code = Self::run_final(&connection, &plan, &env)?;
        Ok(RunOutcome {
            exit_code,
            workspace: None,
            session,
        })
    }

    fn execute_remote(&self, address: &str, request: &RunRequest) -> Result<RunOutcome, RunError> {
        let mut connection = RemoteConnection::new(address, &self.settings, self.runner.clone());
        if let Some(ref dir) = self.scratch_dir {
            connection = connection.with_scratch_dir(dir.clone());
        }

        info!(%address, "connecting");
        connection.open().map_err(RunError::Connection)?;

        let options = options::load(&connection, &self.settings.options_file)?;
        let env = request.overrides.with_defaults(&options);

        let workspace = Workspace::with_id(&self.settings.workspace_root, self.allocate_id());
        self.prepare_workspace(&connection, &workspace, request)?;

        let report =
            provision_virtualenv(&connection, options.virtualenv(), &self.settings.python_bin)?;
        debug!(?report, "virtualenv ready");

        let plan = self.remote_plan(request, &workspace, &options, &env);
        let exit_code = Self::run_final(&connection, &plan, &env)?;
        Ok(RunOutcome {
            exit_code,
            workspace: Some(workspace.path().to_path_buf()),
            session: request
                .background
                .then(|| workspace.session_name().to_owned()),
        })
    }

    fn prepare_workspace(
        &self,
        connection: &RemoteConnection<R>,
        workspace: &Workspace,
        request: &RunRequest,
    ) -> Result<(), RunError> {
        info!(workspace = %workspace.path(), "creating workspace");
        connection
            .run_checked(&format!("mkdir -p {}", quote_path(workspace.path().as_str())))
            .map_err(|source| RunError::Workspace {
                path: workspace.path().to_path_buf(),
                source,
            })?;

        let destination = SyncDestination {
            address: connection.address().to_owned(),
            path: workspace.path().to_path_buf(),
        };
        Syncer::new(&self.settings, self.runner.clone()).sync(&request.source_dir, &destination)?;
        Ok(())
    }

    fn remote_plan(
        &self,
        request: &RunRequest,
        workspace: &Workspace,
        options: &SrunOptions,
        env: &EnvironmentOverrides,
    ) -> CommandPlan {
        let mut plan = CommandPlan::new(&request.command).in_workspace(workspace.path().as_str());
        if has_requirements(&request.source_dir) {
            plan = plan.install_requirements(options.virtualenv());
        }
        if let Some(assignments) = gpu_assignments(env, options) {
            for (key, value) in assignments {
                plan = plan.with_inline_env(key, value);
            }
        }
        if request.background {
            plan = plan.in_background(self.session(workspace.session_name()), env);
        }
        plan
    }

    fn run_final<C: Connection>(
        connection: &C,
        plan: &CommandPlan,
        env: &EnvironmentOverrides,
    ) -> Result<Option<i32>, RunError> {
        let command = plan.compose();
        info!(on = %connection.target(), %command, "executing command");
        let output = connection.run(&command, env).map_err(RunError::Command)?;
        debug!(code = ?output.code, "command finished");
        Ok(output.code)
    }

    fn allocate_id(&self) -> String {
        self.workspace_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    fn session(&self, name: &str) -> BackgroundSession {
        BackgroundSession {
            tmux_bin: self.settings.tmux_bin.clone(),
            name: name.to_owned(),
        }
    }
}

fn has_requirements(source_dir: &Utf8Path) -> bool {
    Dir::open_ambient_dir(source_dir, ambient_authority())
        .is_ok_and(|dir| dir.is_file(REQUIREMENTS_FILE))
}
