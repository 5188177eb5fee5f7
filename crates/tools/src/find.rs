//! Regex search over project files.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ignore::WalkBuilder;
use regex_lite::Regex;
use relay_core::deps::{DependencyRegistry, DependencyRequirement};
use relay_core::error::ToolError;
use relay_core::tool::{Tool, ToolArgs, ToolOutput, ToolSchema};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, trace};

use crate::project::{PROJECT_FILES, ProjectFiles};

/// Bytes inspected when deciding whether a file is binary.
const BINARY_PROBE_LEN: usize = 1024;

#[derive(Debug, Deserialize)]
struct FindParameters {
    search_expression: String,
    paths: Vec<String>,
    #[serde(default)]
    is_dir: bool,
    #[serde(default)]
    context_before: usize,
    #[serde(default)]
    context_after: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FindMatch {
    pub path: String,
    /// 1-based
    pub line_number: usize,
    /// The matching line, with context lines when requested.
    pub line: String,
    #[serde(rename = "match")]
    pub matched: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FindResults {
    pub matches: Vec<FindMatch>,
    pub matches_count: usize,
}

/// Null bytes in the first kilobyte mean binary. Unreadable files count as
/// binary too.
fn is_binary(path: &Path) -> bool {
    let mut buf = [0u8; BINARY_PROBE_LEN];
    match fs::File::open(path).and_then(|mut f| f.read(&mut buf)) {
        Ok(n) => buf[..n].contains(&0),
        Err(_) => true,
    }
}

/// Every regular, non-binary file under `dir`, sorted by name within each
/// directory. `.git` is skipped and `.gitignore` rules apply, including
/// those of parent directories.
fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .ignore(false)
        .git_global(false)
        .git_exclude(false)
        .require_git(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                trace!(error = %e, "Skipping unwalkable entry");
                continue;
            }
        };
        if entry.file_type().is_some_and(|t| t.is_file()) && !is_binary(entry.path()) {
            out.push(entry.into_path());
        }
    }
}

fn search_file(path: &Path, pattern: &Regex, params: &FindParameters, out: &mut Vec<FindMatch>) {
    let Ok(content) = fs::read_to_string(path) else {
        trace!(path = %path.display(), "Skipping unreadable file");
        return;
    };
    let lines: Vec<&str> = content.lines().collect();
    let with_context = params.context_before > 0 || params.context_after > 0;

    for (index, line) in lines.iter().enumerate() {
        let Some(found) = pattern.find(line) else {
            continue;
        };
        let text = if with_context {
            let start = index.saturating_sub(params.context_before);
            let end = (index + 1 + params.context_after).min(lines.len());
            lines[start..end].join("\n")
        } else {
            (*line).to_string()
        };
        out.push(FindMatch {
            path: path.display().to_string(),
            line_number: index + 1,
            line: text,
            matched: found.as_str().to_string(),
        });
    }
}

fn run_search(project: &ProjectFiles, params: &FindParameters) -> FindResults {
    let Ok(pattern) = Regex::new(&params.search_expression) else {
        debug!(expression = %params.search_expression, "Invalid search expression");
        return FindResults {
            matches: Vec::new(),
            matches_count: 0,
        };
    };

    let mut files = Vec::new();
    for raw in &params.paths {
        let path = project.resolve(raw);
        if params.is_dir && path.is_dir() {
            walk(&path, &mut files);
        } else if path.is_file() {
            files.push(path);
        }
    }

    let mut matches = Vec::new();
    for file in &files {
        search_file(file, &pattern, params, &mut matches);
    }
    debug!(files = files.len(), matches = matches.len(), "Search finished");
    FindResults {
        matches_count: matches.len(),
        matches,
    }
}

/// Searches files for a regular expression.
pub struct FindTool;

#[async_trait]
impl Tool for FindTool {
    fn name(&self) -> &str {
        "find"
    }

    fn description(&self) -> &str {
        "Search for text patterns in files using regular expressions. Can search single files or \
         recursively through directories."
    }

    fn parameters(&self) -> ToolSchema {
        ToolSchema::Structured(json!({
            "type": "object",
            "properties": {
                "search_expression": {
                    "type": "string",
                    "description": "The regex pattern to search for."
                },
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Files or directories to search. Globs are not supported."
                },
                "is_dir": {
                    "type": "boolean",
                    "description": "Search recursively through every file in the given directories."
                },
                "context_before": {
                    "type": "integer",
                    "description": "Lines of leading context to include before each match."
                },
                "context_after": {
                    "type": "integer",
                    "description": "Lines of trailing context to include after each match."
                }
            },
            "required": ["search_expression", "paths", "is_dir", "context_before", "context_after"],
            "additionalProperties": false
        }))
    }

    fn results(&self) -> ToolSchema {
        ToolSchema::Structured(json!({
            "type": "object",
            "properties": {
                "matches": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": { "type": "string" },
                            "line_number": { "type": "integer" },
                            "line": { "type": "string" },
                            "match": { "type": "string" }
                        }
                    }
                },
                "matches_count": { "type": "integer" }
            }
        }))
    }

    fn dependency(&self) -> Option<DependencyRequirement> {
        Some(PROJECT_FILES.requirement())
    }

    async fn execute(
        &self,
        deps: &DependencyRegistry,
        args: ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        let params: FindParameters = args.parse()?;
        let project = deps.get(&PROJECT_FILES)?.clone();

        let results = tokio::task::spawn_blocking(move || run_search(&project, &params))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "find".into(),
                reason: e.to_string(),
            })?;
        ToolOutput::structured(&results)
    }
}
