//! Tests for `StreamingCommandRunner` output forwarding and capture.

use super::*;
use rstest::rstest;
use std::fmt::Write as _;

fn run_script(script: &str, env: &EnvironmentOverrides) -> CommandOutput {
    StreamingCommandRunner
        .run("sh", &[OsString::from("-c"), OsString::from(script)], env)
        .expect("command should execute successfully")
}

#[rstest]
#[case::success("printf out && printf err 1>&2", Some(0), "out", "err")]
#[case::failure("printf out && printf err 1>&2; exit 42", Some(42), "out", "err")]
#[case::silent_failure("exit 7", Some(7), "", "")]
#[case::no_output("", Some(0), "", "")]
fn streaming_runner_captures_output_and_status(
    #[case] script: &str,
    #[case] expected_code: Option<i32>,
    #[case] expected_stdout: &str,
    #[case] expected_stderr: &str,
) {
    let output = run_script(script, &EnvironmentOverrides::new());

    assert_eq!(output.code, expected_code);
    assert_eq!(output.stdout, expected_stdout);
    assert_eq!(output.stderr, expected_stderr);
}

#[rstest]
fn streaming_runner_captures_large_interleaved_output() {
    let output = run_script(
        "for i in $(seq 1 50); do printf \"out-%03d\\n\" $i; printf \"err-%03d\\n\" $i 1>&2; done",
        &EnvironmentOverrides::new(),
    );

    let mut expected_out = String::new();
    let mut expected_err = String::new();
    for i in 1..=50 {
        writeln!(&mut expected_out, "out-{i:03}").expect("write expected_out");
        writeln!(&mut expected_err, "err-{i:03}").expect("write expected_err");
    }

    assert_eq!(output.code, Some(0));
    assert_eq!(output.stdout, expected_out);
    assert_eq!(output.stderr, expected_err);
}

#[rstest]
fn streaming_runner_passes_environment_overrides() {
    let env: EnvironmentOverrides = [("SRUN_TEST_VALUE", "hello world")].into_iter().collect();
    let output = run_script("printf '%s' \"$SRUN_TEST_VALUE\"", &env);

    assert_eq!(output.code, Some(0));
    assert_eq!(output.stdout, "hello world");
}

#[rstest]
fn streaming_runner_failed_spawn_returns_spawn_error() {
    let result = StreamingCommandRunner.run(
        "definitely-not-a-real-binary-xyz",
        &[],
        &EnvironmentOverrides::new(),
    );

    match result {
        Err(ExecError::Spawn { program, .. }) => {
            assert_eq!(program, "definitely-not-a-real-binary-xyz");
        }
        other => panic!("expected ExecError::Spawn, got {other:?}"),
    }
}

#[rstest]
fn failure_trims_stderr_and_renders_status() {
    let err = ExecError::failure(
        "rsync",
        CommandOutput {
            code: Some(23),
            stdout: String::new(),
            stderr: String::from("partial transfer\n"),
        },
    );

    assert_eq!(err.to_string(), "rsync exited with status 23: partial transfer");
}

#[rstest]
fn status_text_reports_unknown_without_exit_code() {
    let output = CommandOutput {
        code: None,
        stdout: String::new(),
        stderr: String::new(),
    };

    assert!(!output.is_success());
    assert_eq!(output.status_text(), "unknown");
}
