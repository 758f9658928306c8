//! BDD scenarios for the run workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{RunContext, run_context};

#[scenario(
    path = "tests/features/run.feature",
    name = "Propagate the remote exit status"
)]
fn scenario_propagate_exit_status(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Install requirements before the command"
)]
fn scenario_install_requirements(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Create a missing virtualenv"
)]
fn scenario_create_missing_venv(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Detach background runs into tmux"
)]
fn scenario_background_run(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(path = "tests/features/run.feature", name = "Surface sync failures")]
fn scenario_surface_sync_failures(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Stop when the options file is missing"
)]
fn scenario_missing_options(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Stop when the host is unreachable"
)]
fn scenario_unreachable_host(run_context: RunContext) {
    let _ = run_context;
}
