//! Core library for `srun`, a tool that ships the current project to a host
//! and runs a command there.
//!
//! A run parses `<target> [KEY=VALUE ...] <command>`, loads the per-user
//! options file from the target, and then either executes the command
//! through the local shell or, for `user@host` targets, creates a fresh
//! remote workspace, synchronises the project into it with `rsync`,
//! provisions the configured Python virtualenv, and executes the composed
//! command over `ssh`, optionally detached into a `tmux` session.

pub mod args;
pub mod compose;
pub mod connection;
pub mod environment;
pub mod exec;
pub mod options;
pub mod provision;
pub mod run;
pub mod settings;
pub mod shell;
pub mod sync;
pub mod test_support;
pub mod workspace;

pub use args::{ArgsError, Invocation, parse_invocation};
pub use compose::{BackgroundSession, CommandPlan};
pub use connection::{Connection, LocalConnection, RemoteConnection, Target};
pub use environment::EnvironmentOverrides;
pub use exec::{CommandOutput, CommandRunner, ExecError, StreamingCommandRunner};
pub use options::{OptionsError, SrunOptions};
pub use provision::{ProvisionError, ProvisionReport, VenvPlan, provision_virtualenv};
pub use run::{RunError, RunOrchestrator, RunOutcome, RunRequest};
pub use settings::{SettingsError, SrunSettings};
pub use sync::{SyncDestination, SyncError, Syncer};
pub use workspace::Workspace;
