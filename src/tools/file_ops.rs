//! Read-only file tools: read a file, list a directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{display_relative, is_ignored, resolve_in_workspace, Tool, ToolCategory};

/// Lines returned when the caller does not bound the range.
const MAX_READ_LINES: usize = 400;

/// Entries rendered before a listing is cut short.
const MAX_TREE_ENTRIES: usize = 500;

/// Read a file, optionally restricted to a line range.
pub struct ReadFile;

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the repository. Optionally pass start_line and end_line (1-based, inclusive) to read only part of it."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the repository root"
                },
                "start_line": {
                    "type": "integer",
                    "description": "Optional: first line to read (1-based)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Optional: last line to read (inclusive)"
                }
            },
            "required": ["path"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::ReadFile
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let path = args["path"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'path' argument"))?
            .to_string();
        let start = line_arg(&args, "start_line").unwrap_or(1).max(1);
        let end = line_arg(&args, "end_line");
        if let Some(end) = end {
            if end < start {
                return Ok(format!(
                    "Error: end_line ({}) is before start_line ({})",
                    end, start
                ));
            }
        }

        let full_path = resolve_in_workspace(workspace, &path)?;
        tokio::task::spawn_blocking(move || read_lines(&full_path, &path, start, end)).await?
    }
}

pub(crate) fn line_arg(args: &Value, key: &str) -> Option<usize> {
    match &args[key] {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_lines(full_path: &Path, display: &str, start: usize, end: Option<usize>) -> anyhow::Result<String> {
    if !full_path.exists() {
        return Ok(format!("Error: file not found: {}", display));
    }
    if full_path.is_dir() {
        return Ok(format!("Error: {} is a directory, use list_directory", display));
    }

    let content = match fs::read_to_string(full_path) {
        Ok(c) => c,
        Err(e) => return Ok(format!("Error: cannot read {}: {}", display, e)),
    };

    let total = content.lines().count();
    if start > total.max(1) {
        return Ok(format!(
            "Error: start_line {} is past the end of {} ({} lines)",
            start, display, total
        ));
    }

    let limit = match end {
        Some(end) => end.saturating_sub(start).saturating_add(1),
        None => MAX_READ_LINES,
    };
    let selected: Vec<&str> = content.lines().skip(start - 1).take(limit).collect();
    let mut out = selected.join("\n");

    let last = start - 1 + selected.len();
    if end.is_none() && last < total {
        out.push_str(&format!(
            "\n... (showing lines {}-{} of {}, pass start_line to read more)",
            start, last, total
        ));
    }
    Ok(out)
}

/// List a directory as a tree.
pub struct ListDirectory;

#[async_trait]
impl Tool for ListDirectory {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the files and folders of a repository directory as a tree. Use this to understand the project layout."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory relative to the repository root. Defaults to the root."
                },
                "max_depth": {
                    "type": "integer",
                    "description": "How many levels to descend (default: 2)"
                }
            }
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::ListDirectory
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let path = args["path"].as_str().unwrap_or(".").to_string();
        let max_depth = line_arg(&args, "max_depth").unwrap_or(2).clamp(1, 6);
        let root = resolve_in_workspace(workspace, &path)?;
        let workspace = workspace.to_path_buf();

        tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            if !root.is_dir() {
                return Ok(format!("Error: not a directory: {}", path));
            }
            let mut lines = vec![format!("{}/", display_relative(&workspace, &root))];
            let mut count = 0;
            render_tree(&root, "", 1, max_depth, &mut lines, &mut count)?;
            if count >= MAX_TREE_ENTRIES {
                lines.push(format!("... (showing first {} entries)", MAX_TREE_ENTRIES));
            }
            Ok(lines.join("\n"))
        })
        .await?
    }
}

fn sorted_entries(dir: &Path) -> anyhow::Result<Vec<(String, PathBuf, bool)>> {
    let mut entries: Vec<(String, PathBuf, bool)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            let path = e.path();
            let is_dir = path.is_dir();
            (name, path, is_dir)
        })
        .filter(|(name, _, _)| !is_ignored(name))
        .collect();
    // Directories first, then alphabetical.
    entries.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
    Ok(entries)
}

fn render_tree(
    dir: &Path,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    lines: &mut Vec<String>,
    count: &mut usize,
) -> anyhow::Result<()> {
    let entries = sorted_entries(dir)?;
    let last_index = entries.len().saturating_sub(1);
    for (i, (name, path, is_dir)) in entries.into_iter().enumerate() {
        if *count >= MAX_TREE_ENTRIES {
            return Ok(());
        }
        *count += 1;
        let last = i == last_index;
        let connector = if last { "└── " } else { "├── " };
        let suffix = if is_dir { "/" } else { "" };
        lines.push(format!("{}{}{}{}", prefix, connector, name, suffix));

        if is_dir && depth < max_depth {
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            render_tree(&path, &child_prefix, depth + 1, max_depth, lines, count)?;
        }
    }
    Ok(())
}
