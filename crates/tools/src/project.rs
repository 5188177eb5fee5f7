//! The `project_files` dependency shared by the project-file tools.

use std::path::{Path, PathBuf};

use relay_core::deps::DependencyKey;

/// Registry key under which callers provide the project root.
pub const PROJECT_FILES: DependencyKey<ProjectFiles> = DependencyKey::new("project_files");

/// Where the project being worked on lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFiles {
    pub project_root: PathBuf,
}

impl ProjectFiles {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Resolve `path` against the project root unless it is absolute.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
