//! Shared fixtures for run BDD scenarios.

use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest::fixture;
use srun::test_support::{ScriptedRunner, default_settings};
use srun::{EnvironmentOverrides, RunOutcome, SrunSettings};
use tempfile::TempDir;
use thiserror::Error;

pub const REMOTE_ADDRESS: &str = "ada@gpu1";
pub const WORKSPACE_ID: &str = "abc";
pub const OPTIONS: &str = "DATADIR=/data\nVIRTUALENV=/envs/proj/venv\n";

/// Number of `test -d` checks for `/envs/proj/venv`.
pub const VENV_SEGMENTS: usize = 3;

#[derive(Clone, Debug)]
pub struct RunContext {
    pub runner: ScriptedRunner,
    pub settings: SrunSettings,
    pub source: Utf8PathBuf,
    pub scratch: Utf8PathBuf,
    pub overrides: EnvironmentOverrides,
    pub background: bool,
    pub outcome: Option<RunResult>,
    pub(crate) source_tmp: Arc<TempDir>,
    pub(crate) scratch_tmp: Arc<TempDir>,
}

#[derive(Clone, Debug)]
pub enum RunResult {
    Success(RunOutcome),
    Failure(String),
}

#[derive(Clone, Debug, Error)]
pub enum RunTestError {
    #[error("failed to create workspace: {0}")]
    Workspace(String),
}

#[fixture]
pub fn run_context_result() -> Result<RunContext, RunTestError> {
    build_run_context()
}

#[fixture]
pub fn run_context(run_context_result: Result<RunContext, RunTestError>) -> RunContext {
    run_context_result.unwrap_or_else(|err| panic!("run context fixture should initialise: {err}"))
}

fn utf8_tempdir(label: &str) -> Result<(TempDir, Utf8PathBuf), RunTestError> {
    let tmp_dir =
        TempDir::new().map_err(|err| RunTestError::Workspace(format!("{label} tempdir: {err}")))?;
    let path = Utf8PathBuf::from_path_buf(tmp_dir.path().to_path_buf()).map_err(|path| {
        RunTestError::Workspace(format!("non-utf8 {label} path: {}", path.display()))
    })?;
    Ok((tmp_dir, path))
}

pub fn build_run_context() -> Result<RunContext, RunTestError> {
    let (source_tmp, source) = utf8_tempdir("source")?;
    let (scratch_tmp, scratch) = utf8_tempdir("scratch")?;

    Ok(RunContext {
        runner: ScriptedRunner::new(),
        settings: default_settings(),
        source,
        scratch,
        overrides: EnvironmentOverrides::new(),
        background: false,
        outcome: None,
        source_tmp: Arc::new(source_tmp),
        scratch_tmp: Arc::new(scratch_tmp),
    })
}
