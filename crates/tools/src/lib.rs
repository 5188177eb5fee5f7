//! Built-in tool implementations for Relay.
//!
//! Project-file tools give the agent the ability to look around a code base:
//! read files, list directories and search with regular expressions. `find`
//! needs the [`PROJECT_FILES`] dependency; the other two use it to resolve
//! relative paths when it is present.

pub mod find;
pub mod list_dir;
pub mod project;
pub mod read_file;

use std::sync::Arc;

use relay_core::tool::ToolSet;

pub use find::FindTool;
pub use list_dir::ListDirTool;
pub use project::{PROJECT_FILES, ProjectFiles};
pub use read_file::ReadFileTool;

/// Create a tool set with all built-in tools.
pub fn default_tools() -> ToolSet {
    ToolSet::new()
        .with(Arc::new(ReadFileTool))
        .with(Arc::new(ListDirTool))
        .with(Arc::new(FindTool))
}
