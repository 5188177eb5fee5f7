//! Directory listing tool.

use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::deps::DependencyRegistry;
use relay_core::error::ToolError;
use relay_core::tool::{Tool, ToolArgs, ToolOutput, ToolSchema};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::project::PROJECT_FILES;

#[derive(Debug, Deserialize)]
struct ListDirParameters {
    dir_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ListDirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    /// RFC 3339
    pub created_at: String,
    /// RFC 3339
    pub last_modified: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ListDirResults {
    pub entries: Vec<ListDirEntry>,
    pub entries_count: usize,
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "list_dir".into(),
        reason,
    }
}

fn rfc3339(time: std::io::Result<SystemTime>) -> String {
    time.map(|t| DateTime::<Utc>::from(t).to_rfc3339())
        .unwrap_or_default()
}

async fn describe(path: &Path, name: String) -> std::io::Result<ListDirEntry> {
    let link = tokio::fs::symlink_metadata(path).await?;
    let kind = if link.file_type().is_symlink() {
        EntryKind::Symlink
    } else if link.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::File
    };
    // Symlinks report their target when it exists.
    let meta = match kind {
        EntryKind::Symlink => tokio::fs::metadata(path).await.unwrap_or(link),
        _ => link,
    };
    let last_modified = rfc3339(meta.modified());
    let created_at = match meta.created() {
        Ok(created) => rfc3339(Ok(created)),
        Err(_) => last_modified.clone(),
    };

    Ok(ListDirEntry {
        name,
        kind,
        size: meta.len(),
        created_at,
        last_modified,
    })
}

/// Lists directory entries, hidden ones included.
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries in a directory. Supports symlinks and hidden files/directories."
    }

    fn parameters(&self) -> ToolSchema {
        ToolSchema::Structured(json!({
            "type": "object",
            "properties": {
                "dir_path": { "type": "string", "description": "The directory to list." }
            },
            "required": ["dir_path"],
            "additionalProperties": false
        }))
    }

    fn results(&self) -> ToolSchema {
        ToolSchema::Structured(json!({
            "type": "object",
            "properties": {
                "entries": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "kind": { "type": "string", "enum": ["file", "dir", "symlink"] },
                            "size": { "type": "integer" },
                            "created_at": { "type": "string" },
                            "last_modified": { "type": "string" }
                        }
                    }
                },
                "entries_count": { "type": "integer" }
            }
        }))
    }

    async fn execute(
        &self,
        deps: &DependencyRegistry,
        args: ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        let params: ListDirParameters = args.parse()?;
        let path = match deps.get(&PROJECT_FILES) {
            Ok(project) => project.resolve(&params.dir_path),
            Err(_) => params.dir_path.clone().into(),
        };

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| failed(format!("The path {} does not exist.", params.dir_path)))?;
        if !meta.is_dir() {
            return Err(failed(format!(
                "The path {} is not a directory.",
                params.dir_path
            )));
        }

        let mut reader = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| failed(e.to_string()))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let described = describe(&entry.path(), name)
                .await
                .map_err(|e| failed(e.to_string()))?;
            entries.push(described);
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        ToolOutput::structured(&ListDirResults {
            entries_count: entries.len(),
            entries,
        })
    }
}
