//! Turns tool calls and their outcomes into client-facing events.
//!
//! Each call yields one intent event before the tool runs and zero or more
//! outcome events after it. The mapping is fixed per `ToolCategory`.

use std::path::Path;

use serde_json::Value;

use crate::llm::ToolCall;
use crate::tools::{format_number, is_error_result, line_arg, number_arg, ToolCategory, TRUNCATION_MARKER};

use super::AgentEvent;

/// The event announcing what a tool call is about to do.
pub fn intent_event(category: ToolCategory, call: &ToolCall) -> AgentEvent {
    let args = &call.function.arguments;
    let text = match category {
        ToolCategory::Arithmetic { operator } => format!(
            "computing {} {} {}",
            operand(args, "a"),
            operator,
            operand(args, "b")
        ),
        ToolCategory::ReadFile => format!("reading file {}", str_arg(args, "path")),
        ToolCategory::KeywordSearch => {
            format!("searching for keyword '{}'", str_arg(args, "keyword"))
        }
        ToolCategory::DefinitionSearch => {
            format!("searching for definition of '{}'", str_arg(args, "name"))
        }
        ToolCategory::ListDirectory => format!("listing directory {}", path_arg(args)),
        ToolCategory::Other => format!("executing {}", call.function.name),
    };
    AgentEvent::step(text)
}

/// Events describing the outcome of a finished tool call.
pub fn outcome_events(category: ToolCategory, call: &ToolCall, outcome: &str) -> Vec<AgentEvent> {
    let args = &call.function.arguments;
    let failed = is_error_result(outcome);

    match category {
        ToolCategory::Arithmetic { .. } => vec![AgentEvent::step(format!("result: {}", outcome))],
        ToolCategory::ReadFile if failed => Vec::new(),
        ToolCategory::ReadFile => {
            let path = str_arg(args, "path");
            vec![AgentEvent::CodeSnippet {
                language: language_for_path(&path).to_string(),
                line_range: line_range(args),
                code: strip_truncation(outcome),
                file_path: path,
            }]
        }
        ToolCategory::KeywordSearch | ToolCategory::DefinitionSearch | ToolCategory::ListDirectory
            if failed =>
        {
            vec![AgentEvent::step(outcome.trim().to_string())]
        }
        ToolCategory::KeywordSearch => {
            vec![AgentEvent::step(plural(count_matches(outcome), "match", "matches"))]
        }
        ToolCategory::DefinitionSearch => {
            let references = extract_references(outcome);
            let summary = AgentEvent::step(plural(references.len(), "definition", "definitions"));
            let mut events: Vec<AgentEvent> = references
                .into_iter()
                .map(|(file_path, line)| AgentEvent::FileReference { file_path, line })
                .collect();
            events.push(summary);
            events
        }
        ToolCategory::ListDirectory => vec![
            AgentEvent::step(plural(count_tree_items(outcome), "item", "items")),
            AgentEvent::DirectoryTree {
                path: path_arg(args),
                tree: outcome.to_string(),
            },
        ],
        ToolCategory::Other if failed => Vec::new(),
        ToolCategory::Other => vec![AgentEvent::step("completed")],
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("found {} {}", n, if n == 1 { one } else { many })
}

fn str_arg(args: &Value, key: &str) -> String {
    match &args[key] {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn path_arg(args: &Value) -> String {
    args["path"]
        .as_str()
        .filter(|p| !p.is_empty())
        .unwrap_or(".")
        .to_string()
}

fn operand(args: &Value, key: &str) -> String {
    match number_arg(args, key) {
        Ok(n) => format_number(n),
        Err(_) => str_arg(args, key),
    }
}

/// `start-end`, or `start+` when no end line was requested.
pub fn line_range(args: &Value) -> String {
    let start = line_arg(args, "start_line").unwrap_or(1).max(1);
    match line_arg(args, "end_line") {
        Some(end) => format!("{}-{}", start, end),
        None => format!("{}+", start),
    }
}

fn is_truncation_line(line: &str) -> bool {
    line.trim_start().starts_with(TRUNCATION_MARKER)
}

fn strip_truncation(outcome: &str) -> String {
    match outcome.rsplit_once('\n') {
        Some((body, last)) if is_truncation_line(last) => body.to_string(),
        _ => outcome.to_string(),
    }
}

/// Result lines of the form `path:line: text`; notices and truncation markers don't count.
pub fn count_matches(outcome: &str) -> usize {
    extract_references(outcome).len()
}

/// `(path, line)` pairs from `path:line: text` result lines.
pub fn extract_references(outcome: &str) -> Vec<(String, usize)> {
    outcome
        .lines()
        .filter(|line| !is_truncation_line(line))
        .filter_map(|line| {
            let mut parts = line.splitn(3, ':');
            let path = parts.next()?.trim();
            let number = parts.next()?.trim().parse::<usize>().ok()?;
            if path.is_empty() {
                return None;
            }
            Some((path.to_string(), number))
        })
        .collect()
}

/// Entries in a rendered tree (the root line and truncation markers excluded).
pub fn count_tree_items(tree: &str) -> usize {
    tree.lines().filter(|line| line.contains("── ")).count()
}

/// Language for syntax highlighting, from the file extension.
pub fn language_for_path(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "jsx" | "mjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "go" => "go",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "sh" | "bash" => "bash",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "html" | "htm" => "html",
        "css" => "css",
        "sql" => "sql",
        "md" => "markdown",
        "cds" => "cds",
        "vue" => "vue",
        _ => "plaintext",
    }
}
