//! Per-run workspace naming.

use camino::{Utf8Path, Utf8PathBuf};
use uuid::Uuid;

/// A uniquely named directory that receives the project files for one run.
///
/// The directory is never reused and never removed by `srun`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Workspace {
    id: String,
    path: Utf8PathBuf,
}

impl Workspace {
    /// Allocates a fresh workspace below `root` named after a random UUID.
    #[must_use]
    pub fn allocate(root: &str) -> Self {
        Self::with_id(root, Uuid::new_v4().to_string())
    }

    /// Builds a workspace with an explicit identifier.
    #[must_use]
    pub fn with_id(root: &str, id: impl Into<String>) -> Self {
        let name = id.into();
        let path = Utf8Path::new(root).join(&name);
        Self { id: name, path }
    }

    /// Unique identifier; also the final path segment.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Full path of the workspace on the target.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Name of the detached terminal session used for background runs.
    #[must_use]
    pub fn session_name(&self) -> &str {
        self.path.file_name().unwrap_or(&self.id)
    }
}
