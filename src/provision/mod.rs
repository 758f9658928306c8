//! Idempotent creation of the target's virtual environment.
//!
//! The venv path is split into segments and every cumulative prefix is
//! checked in order. Missing parents are created with `mkdir`; a missing
//! final directory is initialised with `<python> -m venv`. Anything that
//! already exists is left untouched, so repeated runs perform no writes.

use thiserror::Error;
use tracing::{debug, info};

use crate::connection::{Connection, PathKind};
use crate::exec::ExecError;
use crate::shell::quote_path;

/// Errors raised while provisioning the virtual environment.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when the venv path leaves no directory to create.
    #[error("virtualenv path `{path}` contains no directory segments")]
    EmptyPath {
        /// Path as configured.
        path: String,
    },
    /// Raised when an existence check or creation command fails.
    #[error("failed to provision virtualenv: {0}")]
    Exec(#[from] ExecError),
}

/// Ordered directories needed for a virtual environment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VenvPlan {
    parents: Vec<String>,
    venv: String,
}

impl VenvPlan {
    /// Derives the plan for `path`.
    ///
    /// Segments containing `.` are treated as file-like and skipped, as are
    /// empty segments. A leading `/` keeps every prefix absolute.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::EmptyPath`] when no segment remains.
    ///
    /// # Examples
    ///
    /// ```
    /// # use srun::provision::VenvPlan;
    /// let plan = VenvPlan::for_path("/envs/proj/venv").expect("plan");
    /// assert_eq!(plan.parents(), ["/envs", "/envs/proj"]);
    /// assert_eq!(plan.venv(), "/envs/proj/venv");
    /// ```
    pub fn for_path(path: &str) -> Result<Self, ProvisionError> {
        let (root, relative) = path
            .strip_prefix('/')
            .map_or(("", path), |rest| ("/", rest));

        let mut prefixes = Vec::new();
        let mut current = String::from(root);
        for segment in relative
            .split('/')
            .filter(|segment| !segment.is_empty() && !segment.contains('.'))
        {
            if !current.is_empty() && !current.ends_with('/') {
                current.push('/');
            }
            current.push_str(segment);
            prefixes.push(current.clone());
        }

        let venv = prefixes.pop().ok_or_else(|| ProvisionError::EmptyPath {
            path: path.to_owned(),
        })?;
        Ok(Self {
            parents: prefixes,
            venv,
        })
    }

    /// Ancestor directories, outermost first.
    #[must_use]
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Directory that holds the virtual environment itself.
    #[must_use]
    pub fn venv(&self) -> &str {
        &self.venv
    }
}

/// Paths created by a provisioning pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisionReport {
    /// Parent directories created with `mkdir`.
    pub created_directories: Vec<String>,
    /// The virtual environment, when it had to be initialised.
    pub created_virtualenv: Option<String>,
}

impl ProvisionReport {
    /// Returns `true` when nothing was created.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.created_directories.is_empty() && self.created_virtualenv.is_none()
    }
}

/// Ensures the virtual environment at `path` exists on the connection's
/// target, using `python_bin` to initialise it.
///
/// # Errors
///
/// Returns [`ProvisionError`] when the path is unusable or a check or
/// creation command fails.
pub fn provision_virtualenv<C: Connection>(
    connection: &C,
    path: &str,
    python_bin: &str,
) -> Result<ProvisionReport, ProvisionError> {
    let plan = VenvPlan::for_path(path)?;
    let mut report = ProvisionReport::default();

    for dir in plan.parents() {
        if connection.path_exists(dir, PathKind::Directory)? {
            continue;
        }
        debug!(%dir, "creating directory");
        connection.run_checked(&format!("mkdir {}", quote_path(dir)))?;
        report.created_directories.push(dir.clone());
    }

    if !connection.path_exists(plan.venv(), PathKind::Directory)? {
        info!(venv = plan.venv(), "creating virtualenv");
        connection.run_checked(&format!("{python_bin} -m venv {}", quote_path(plan.venv())))?;
        report.created_virtualenv = Some(plan.venv().to_owned());
    }

    Ok(report)
}
