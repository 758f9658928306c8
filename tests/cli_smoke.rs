//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("srun");
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn cli_help_describes_background_flag() {
    let mut cmd = cargo_bin_cmd!("srun");
    cmd.arg("--help");
    cmd.assert().success().stdout(contains("--background"));
}
