//! Tests for rsync argument construction and sync behaviour.

use super::*;
use crate::test_support::{ScriptedRunner, default_settings};
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn destination() -> SyncDestination {
    SyncDestination {
        address: String::from("ada@gpu1"),
        path: Utf8PathBuf::from("/tmp/0b7c"),
    }
}

fn source_dir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
    (dir, path)
}

fn arg_strings(args: &[OsString]) -> Vec<String> {
    args.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

#[rstest]
fn build_rsync_args_lists_flags_excludes_and_endpoints(destination: SyncDestination) {
    let syncer = Syncer::new(&default_settings(), ScriptedRunner::new());
    let (_guard, source) = source_dir();

    let args = arg_strings(
        &syncer
            .build_rsync_args(&source, &destination)
            .expect("args should build"),
    );

    let expected = vec![
        String::from("-a"),
        String::from("-v"),
        String::from("-z"),
        String::from("--exclude"),
        String::from("__pycache__"),
        String::from("--exclude"),
        String::from("*.swp"),
        String::from("--exclude"),
        String::from(".git"),
        String::from("--exclude"),
        String::from(".DS_Store"),
        String::from("--exclude"),
        String::from(".gitignore"),
        String::from("--rsh"),
        String::from("ssh -o BatchMode=yes"),
        format!("{source}/"),
        String::from("ada@gpu1:/tmp/0b7c"),
    ];
    assert_eq!(args, expected);
}

#[rstest]
fn rsync_remote_shell_includes_identity_flag(destination: SyncDestination) {
    let settings = SrunSettings {
        ssh_identity_file: Some(String::from("/path/to/key")),
        ..default_settings()
    };
    let syncer = Syncer::new(&settings, ScriptedRunner::new());
    let (_guard, source) = source_dir();

    let args = arg_strings(
        &syncer
            .build_rsync_args(&source, &destination)
            .expect("args should build"),
    );

    let rsh_arg = args
        .iter()
        .find(|arg| arg.starts_with("ssh ") && arg.contains("-i"))
        .expect("rsync --rsh should include -i flag");
    assert!(
        rsh_arg.contains("/path/to/key"),
        "remote shell should include key path: {rsh_arg}"
    );
}

#[rstest]
fn sync_rejects_missing_source(destination: SyncDestination) {
    let runner = ScriptedRunner::new();
    let syncer = Syncer::new(&default_settings(), runner.clone());
    let missing = Utf8Path::new("/definitely/not/a/project");

    let err = syncer
        .sync(missing, &destination)
        .expect_err("missing source should fail");

    assert_eq!(
        err,
        SyncError::MissingSource {
            path: missing.to_path_buf()
        }
    );
    assert!(runner.invocations().is_empty(), "rsync should not run");
}

#[rstest]
fn sync_returns_error_on_non_zero_rsync_status(destination: SyncDestination) {
    let runner = ScriptedRunner::new();
    runner.push_failure(12);
    let syncer = Syncer::new(&default_settings(), runner);

    let err = syncer
        .sync(Utf8Path::new("/"), &destination)
        .expect_err("non-zero rsync should error");

    let SyncError::CommandFailure {
        program,
        status,
        status_text,
        stderr,
    } = err
    else {
        panic!("expected CommandFailure");
    };
    assert_eq!(program, "rsync");
    assert_eq!(status, Some(12));
    assert_eq!(status_text, "12");
    assert_eq!(stderr, "simulated failure");
}

#[rstest]
fn sync_succeeds_on_zero_status(destination: SyncDestination) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let syncer = Syncer::new(&default_settings(), runner.clone());

    assert!(syncer.sync(Utf8Path::new("/"), &destination).is_ok());
    let invocation = runner.invocations().pop().expect("rsync invocation");
    assert_eq!(invocation.program, "rsync");
    assert_eq!(invocation.last_arg(), "ada@gpu1:/tmp/0b7c");
}
