//! Builds the final shell command line executed on the target.
//!
//! Fragments are joined with ` && ` so the first failing step aborts the
//! chain. Background runs wrap the whole chain in a detached `tmux` session
//! and export the run's environment inside it, since the session's shell is
//! forked by the tmux server rather than by the invoking shell.

use crate::connection::inline_environment;
use crate::environment::{CUDA_VISIBLE_DEVICES_KEY, EnvironmentOverrides};
use crate::options::{DATADIR_KEY, SrunOptions};
use crate::shell::{quote, quote_path};

/// File whose presence in the project directory triggers dependency
/// installation.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

const FRAGMENT_SEPARATOR: &str = " && ";

/// Detached terminal session receiving a background command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BackgroundSession {
    /// Terminal multiplexer executable.
    pub tmux_bin: String,
    /// Session name.
    pub name: String,
}

impl BackgroundSession {
    /// Wraps `command` so it is typed into a new detached session.
    ///
    /// # Examples
    ///
    /// ```
    /// # use srun::compose::BackgroundSession;
    /// let session = BackgroundSession { tmux_bin: "tmux".into(), name: "abc".into() };
    /// assert_eq!(
    ///     session.wrap("cd /tmp/abc && ls"),
    ///     "tmux new-session -s abc -d && tmux send-keys -t abc 'cd /tmp/abc && ls' Enter"
    /// );
    /// ```
    #[must_use]
    pub fn wrap(&self, command: &str) -> String {
        let tmux = quote(&self.tmux_bin);
        let name = quote(&self.name);
        format!(
            "{tmux} new-session -s {name} -d && {tmux} send-keys -t {name} {} Enter",
            quote(command)
        )
    }
}

/// Ordered description of what the target should execute.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandPlan {
    command: String,
    workspace: Option<String>,
    requirements_venv: Option<String>,
    inline_env: Vec<(String, String)>,
    background: Option<BackgroundSession>,
    session_env: EnvironmentOverrides,
}

impl CommandPlan {
    /// Starts a plan running the literal user command.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Changes into `path` before running anything else.
    #[must_use]
    pub fn in_workspace(mut self, path: impl Into<String>) -> Self {
        self.workspace = Some(path.into());
        self
    }

    /// Activates `venv` and installs `requirements.txt` quietly before the
    /// command.
    #[must_use]
    pub fn install_requirements(mut self, venv: impl Into<String>) -> Self {
        self.requirements_venv = Some(venv.into());
        self
    }

    /// Prefixes the user command with `key=value`.
    #[must_use]
    pub fn with_inline_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inline_env.push((key.into(), value.into()));
        self
    }

    /// Runs the composed chain inside `session`, exporting `env` as the
    /// first step typed into it.
    #[must_use]
    pub fn in_background(
        mut self,
        session: BackgroundSession,
        env: &EnvironmentOverrides,
    ) -> Self {
        self.background = Some(session);
        self.session_env = env.clone();
        self
    }

    /// The unjoined fragments, in execution order.
    #[must_use]
    pub fn fragments(&self) -> Vec<String> {
        let cd = self
            .workspace
            .as_deref()
            .map(|path| format!("cd {}", quote_path(path)));

        let mut fragments = Vec::new();
        if let Some(ref venv) = self.requirements_venv {
            fragments.push(format!("source {}/bin/activate", quote_path(venv)));
            fragments.extend(cd);
            fragments.push(format!("pip install --quiet -r {REQUIREMENTS_FILE}"));
        } else {
            fragments.extend(cd);
        }
        fragments.push(self.user_command());
        fragments
    }

    /// The final command line.
    #[must_use]
    pub fn compose(&self) -> String {
        let chain = self.fragments().join(FRAGMENT_SEPARATOR);
        match self.background {
            Some(ref session) => session.wrap(&inline_environment(&self.session_env, &chain)),
            None => chain,
        }
    }

    fn user_command(&self) -> String {
        if self.inline_env.is_empty() {
            return self.command.clone();
        }
        let assignments = self
            .inline_env
            .iter()
            .map(|(key, value)| format!("{key}={}", quote_path(value)))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{assignments} {}", self.command)
    }
}

/// Assignments mirrored onto the command line when a GPU selection is in
/// effect: the effective `DATADIR` followed by `CUDA_VISIBLE_DEVICES`.
///
/// Returns `None` when no GPU selection was made.
#[must_use]
pub fn gpu_assignments(
    env: &EnvironmentOverrides,
    options: &SrunOptions,
) -> Option<[(String, String); 2]> {
    let devices = env.cuda_visible_devices(options)?;
    let datadir = env.get(DATADIR_KEY).unwrap_or_else(|| options.datadir());
    Some([
        (DATADIR_KEY.to_owned(), datadir.to_owned()),
        (CUDA_VISIBLE_DEVICES_KEY.to_owned(), devices.to_owned()),
    ])
}
