//! Command-line interface definitions for the `srun` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `srun` binary.
#[derive(Debug, Parser)]
#[command(
    name = "srun",
    about = "Sync the current project to a host and run a command there",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Run the command in a detached tmux session and return immediately.
    ///
    /// Must appear before the target; a flag after the target belongs to the
    /// command.
    #[arg(short = 'b', long)]
    pub(crate) background: bool,
    /// `local` or `user@host`, then optional `KEY=VALUE` environment
    /// overrides, then the command to run.
    ///
    /// The command tokens are joined with spaces and interpreted by the
    /// target's shell, so pipes and variable references work as typed.
    #[arg(
        required = true,
        trailing_var_arg = true,
        value_name = "TARGET [KEY=VALUE]... COMMAND"
    )]
    pub(crate) invocation: Vec<String>,
}
