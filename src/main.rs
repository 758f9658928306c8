//! Binary entry point for the `srun` CLI.

use std::env;
use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use srun::{
    ArgsError, RunError, RunOrchestrator, RunOutcome, RunRequest, SettingsError, SrunSettings,
    StreamingCommandRunner, Target, parse_invocation,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Settings(#[from] SettingsError),
    #[error("invalid arguments: {0}")]
    Args(#[from] ArgsError),
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
    #[error("cannot use the working directory: {0}")]
    WorkingDirectory(String),
    #[error("{0}")]
    Run(#[from] RunError),
    #[error("command terminated without an exit status")]
    MissingExitCode,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<i32, CliError> {
    let invocation = parse_invocation(&cli.invocation)?;
    validate_command_args(&invocation.command)?;

    let settings = SrunSettings::load_without_cli_args()?;
    let request = RunRequest {
        command: invocation.command_line(),
        target: invocation.target,
        overrides: invocation.overrides,
        background: cli.background,
        source_dir: current_dir()?,
    };

    let outcome = RunOrchestrator::new(settings, StreamingCommandRunner).execute(&request)?;
    report_session(io::stdout(), &request.target, &outcome);
    exit_status(&outcome)
}

const fn exit_status(outcome: &RunOutcome) -> Result<i32, CliError> {
    match outcome.exit_code {
        Some(code) => Ok(code),
        None => Err(CliError::MissingExitCode),
    }
}

fn current_dir() -> Result<Utf8PathBuf, CliError> {
    let cwd = env::current_dir().map_err(|err| CliError::WorkingDirectory(err.to_string()))?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|path| CliError::WorkingDirectory(format!("{} is not UTF-8", path.display())))
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::InvalidCommand(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn report_session(mut target: impl Write, on: &Target, outcome: &RunOutcome) {
    if let Some(ref session) = outcome.session {
        writeln!(
            target,
            "started background tmux session {session} on {}",
            on.host()
        )
        .ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "srun: {err}").ok();
}
