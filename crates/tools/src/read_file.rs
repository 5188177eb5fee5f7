//! File read tool: a slice of a file's lines.

use async_trait::async_trait;
use relay_core::deps::DependencyRegistry;
use relay_core::error::ToolError;
use relay_core::tool::{Tool, ToolArgs, ToolOutput, ToolSchema};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::project::PROJECT_FILES;

#[derive(Debug, Deserialize)]
struct ReadParameters {
    file_path: String,
    #[serde(default)]
    start_line: i64,
    #[serde(default)]
    end_line: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadLine {
    pub line_number: usize,
    pub line: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadResults {
    pub lines: Vec<ReadLine>,
    pub lines_count: usize,
}

/// Map a possibly negative bound onto `0..=len`.
fn resolve_bound(bound: i64, len: usize) -> usize {
    if bound < 0 {
        len.saturating_sub(bound.unsigned_abs() as usize)
    } else {
        (bound as usize).min(len)
    }
}

/// Select `[start, end)` from `content`, numbering lines from 0.
///
/// Negative bounds count back from the last line; an `end` of 0 means the
/// end of the file. Line terminators are kept.
fn select_lines(content: &str, start: i64, end: i64) -> ReadResults {
    let all: Vec<&str> = content.split_inclusive('\n').collect();
    let start = resolve_bound(start, all.len());
    let end = if end == 0 {
        all.len()
    } else {
        resolve_bound(end, all.len())
    };

    let lines: Vec<ReadLine> = all
        .iter()
        .enumerate()
        .take(end)
        .skip(start)
        .map(|(line_number, line)| ReadLine {
            line_number,
            line: (*line).to_string(),
        })
        .collect();
    ReadResults {
        lines_count: lines.len(),
        lines,
    }
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the content of a file, optionally only a range of its lines."
    }

    fn parameters(&self) -> ToolSchema {
        ToolSchema::Structured(json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The file to read. Relative paths start at the project root."
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line to read, counting from 0. Negative values count back from the last line."
                },
                "end_line": {
                    "type": "integer",
                    "description": "Line to stop before. 0 reads to the end. Negative values count back from the last line."
                }
            },
            "required": ["file_path", "start_line", "end_line"],
            "additionalProperties": false
        }))
    }

    fn results(&self) -> ToolSchema {
        ToolSchema::Structured(json!({
            "type": "object",
            "properties": {
                "lines": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "line_number": { "type": "integer" },
                            "line": { "type": "string" }
                        },
                        "required": ["line_number", "line"]
                    }
                },
                "lines_count": { "type": "integer" }
            },
            "required": ["lines", "lines_count"]
        }))
    }

    async fn execute(
        &self,
        deps: &DependencyRegistry,
        args: ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        let params: ReadParameters = args.parse()?;
        let path = match deps.get(&PROJECT_FILES) {
            Ok(project) => project.resolve(&params.file_path),
            Err(_) => params.file_path.clone().into(),
        };
        debug!(path = %path.display(), "Reading file");

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "read_file".into(),
                reason: format!("Failed to read {}: {e}", path.display()),
            })?;

        ToolOutput::structured(&select_lines(&content, params.start_line, params.end_line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectFiles;

    const SAMPLE: &str = "Line 0\nLine 1\nLine 2\nLine 3\nLine 4\n";

    fn numbers(results: &ReadResults) -> Vec<usize> {
        results.lines.iter().map(|l| l.line_number).collect()
    }

    #[test]
    fn whole_file_by_default() {
        let results = select_lines(SAMPLE, 0, 0);
        assert_eq!(results.lines_count, 5);
        assert_eq!(results.lines[0].line, "Line 0\n");
        assert_eq!(results.lines[4].line_number, 4);
    }

    #[test]
    fn ranges_and_negative_bounds() {
        assert_eq!(numbers(&select_lines(SAMPLE, 2, 0)), vec![2, 3, 4]);
        assert_eq!(numbers(&select_lines(SAMPLE, 0, 3)), vec![0, 1, 2]);
        assert_eq!(numbers(&select_lines(SAMPLE, -2, 0)), vec![3, 4]);
        assert_eq!(numbers(&select_lines(SAMPLE, 1, -1)), vec![1, 2, 3]);
        assert_eq!(numbers(&select_lines(SAMPLE, -10, 2)), vec![0, 1]);
        assert!(select_lines(SAMPLE, 4, 2).lines.is_empty());
        assert!(select_lines(SAMPLE, 9, 0).lines.is_empty());
    }

    #[test]
    fn empty_file_has_no_lines() {
        assert_eq!(select_lines("", 0, 0).lines_count, 0);
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let results = select_lines("a\nb", 0, 0);
        assert_eq!(results.lines[1].line, "b");
    }

    #[tokio::test]
    async fn reads_relative_to_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), SAMPLE).unwrap();
        let deps = DependencyRegistry::new().with(&PROJECT_FILES, ProjectFiles::new(dir.path()));

        let args = ReadFileTool
            .parameters()
            .parse_arguments(r#"{"file_path":"notes.txt","start_line":-1,"end_line":0}"#)
            .unwrap();
        let output = ReadFileTool.execute(&deps, args).await.unwrap();

        let ToolOutput::Structured(value) = output else {
            panic!("expected structured output");
        };
        let results: ReadResults = serde_json::from_value(value).unwrap();
        assert_eq!(
            results.lines,
            vec![ReadLine {
                line_number: 4,
                line: "Line 4\n".into()
            }]
        );
    }

    #[tokio::test]
    async fn missing_file_fails() {
        let args = ReadFileTool
            .parameters()
            .parse_arguments(r#"{"file_path":"/nonexistent/relay/file.txt"}"#)
            .unwrap();
        let err = ReadFileTool
            .execute(&DependencyRegistry::new(), args)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
