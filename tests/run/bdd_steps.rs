//! BDD step definitions for the `srun` run workflow.

use cap_std::{ambient_authority, fs_utf8::Dir};
use rstest_bdd_macros::{given, then, when};
use srun::{RunOrchestrator, RunRequest, Target};

use super::test_helpers::{
    OPTIONS, REMOTE_ADDRESS, RunContext, RunResult, VENV_SEGMENTS, WORKSPACE_ID,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("fixture setup failed: {0}")]
    Setup(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a reachable host with a complete options file")]
fn reachable_host(run_context: RunContext) -> RunContext {
    run_context.runner.push_success();
    run_context.runner.push_success();
    run_context.runner.push_download(OPTIONS);
    run_context
}

#[given("a reachable host without an options file")]
fn host_without_options(run_context: RunContext) -> RunContext {
    run_context.runner.push_success();
    run_context.runner.push_exit_code(1);
    run_context
}

#[given("an unreachable host")]
fn unreachable_host(run_context: RunContext) -> RunContext {
    run_context
        .runner
        .push_output(Some(255), "", "ssh: connect to host gpu1 port 22: No route to host");
    run_context
}

#[given("the project contains a requirements file")]
fn requirements_file(run_context: RunContext) -> Result<RunContext, StepError> {
    let dir = Dir::open_ambient_dir(&run_context.source, ambient_authority())
        .map_err(|err| StepError::Setup(err.to_string()))?;
    dir.write("requirements.txt", "numpy\n")
        .map_err(|err| StepError::Setup(err.to_string()))?;
    Ok(run_context)
}

#[given("background mode is requested")]
fn background_requested(mut run_context: RunContext) -> RunContext {
    run_context.background = true;
    run_context
}

#[given("the workspace sync succeeds")]
fn sync_succeeds(run_context: RunContext) -> RunContext {
    run_context.runner.push_success();
    run_context.runner.push_success();
    run_context
}

#[given("the workspace sync fails with status \"{code}\"")]
fn sync_fails(run_context: RunContext, code: i32) -> RunContext {
    run_context.runner.push_success();
    run_context.runner.push_failure(code);
    run_context
}

#[given("the virtualenv already exists")]
fn venv_exists(run_context: RunContext) -> RunContext {
    for _ in 0..VENV_SEGMENTS {
        run_context.runner.push_success();
    }
    run_context
}

#[given("the virtualenv is missing")]
fn venv_missing(run_context: RunContext) -> RunContext {
    for _ in 0..VENV_SEGMENTS {
        run_context.runner.push_exit_code(1);
        run_context.runner.push_success();
    }
    run_context
}

#[given("the command exits with \"{code}\"")]
fn command_exits(run_context: RunContext, code: i32) -> RunContext {
    run_context.runner.push_exit_code(code);
    run_context
}

#[when("I run \"{command}\" on the remote host")]
fn run_remote(run_context: RunContext, command: String) -> RunContext {
    let orchestrator = RunOrchestrator::new(run_context.settings.clone(), run_context.runner.clone())
        .with_scratch_dir(run_context.scratch.clone())
        .with_workspace_id(WORKSPACE_ID);
    let request = RunRequest {
        target: Target::Remote(String::from(REMOTE_ADDRESS)),
        overrides: run_context.overrides.clone(),
        command,
        background: run_context.background,
        source_dir: run_context.source.clone(),
    };

    let outcome = match orchestrator.execute(&request) {
        Ok(outcome) => RunResult::Success(outcome),
        Err(err) => RunResult::Failure(err.to_string()),
    };
    RunContext {
        outcome: Some(outcome),
        ..run_context
    }
}

fn success(run_context: &RunContext) -> Result<&srun::RunOutcome, StepError> {
    match run_context.outcome {
        Some(RunResult::Success(ref outcome)) => Ok(outcome),
        Some(RunResult::Failure(ref err)) => Err(StepError::Assertion(format!(
            "run failed unexpectedly: {err}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

fn remote_commands(run_context: &RunContext) -> Vec<String> {
    run_context
        .runner
        .invocations()
        .into_iter()
        .filter(|invocation| invocation.program == run_context.settings.ssh_bin)
        .map(|invocation| invocation.last_arg())
        .collect()
}

#[then("the run result exit code is \"{code}\"")]
fn run_exit_code(run_context: &RunContext, code: i32) -> Result<(), StepError> {
    let outcome = success(run_context)?;
    if outcome.exit_code == Some(code) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected exit code {code}, got {:?}",
            outcome.exit_code
        )))
    }
}

#[then("the final remote command is \"{command}\"")]
fn final_remote_command(run_context: &RunContext, command: String) -> Result<(), StepError> {
    success(run_context)?;
    let commands = remote_commands(run_context);
    match commands.last() {
        Some(actual) if *actual == command => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected final command {command:?}, got {other:?}"
        ))),
    }
}

#[then("the host received \"{command}\"")]
fn host_received(run_context: &RunContext, command: String) -> Result<(), StepError> {
    if remote_commands(run_context).contains(&command) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {command:?} among {:?}",
            remote_commands(run_context)
        )))
    }
}

#[then("the background session is \"{name}\"")]
fn background_session(run_context: &RunContext, name: String) -> Result<(), StepError> {
    let outcome = success(run_context)?;
    if outcome.session.as_deref() == Some(name.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected session {name}, got {:?}",
            outcome.session
        )))
    }
}

#[then("the run fails mentioning \"{text}\"")]
fn run_fails(run_context: &RunContext, text: String) -> Result<(), StepError> {
    match run_context.outcome {
        Some(RunResult::Failure(ref message)) if message.contains(&text) => Ok(()),
        ref other => Err(StepError::Assertion(format!(
            "expected failure mentioning {text:?}, got {other:?}"
        ))),
    }
}

#[then("nothing runs after the sync")]
fn nothing_after_sync(run_context: &RunContext) -> Result<(), StepError> {
    let programs: Vec<String> = run_context
        .runner
        .invocations()
        .into_iter()
        .map(|invocation| invocation.program)
        .collect();
    if programs.last().map(String::as_str) == Some(run_context.settings.rsync_bin.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected rsync to be the last invocation, got {programs:?}"
        )))
    }
}
