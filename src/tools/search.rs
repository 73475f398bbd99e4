//! Code search tools: keyword search and definition lookup.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::{json, Value};
use walkdir::WalkDir;

use super::{display_relative, is_ignored, resolve_in_workspace, Tool, ToolCategory};

const MAX_MATCHES: usize = 100;
const MAX_LINE_CHARS: usize = 200;

/// Search file contents for a keyword.
pub struct SearchCode;

#[async_trait]
impl Tool for SearchCode {
    fn name(&self) -> &str {
        "search_code"
    }

    fn description(&self) -> &str {
        "Search repository files for a keyword. Returns matching lines as path:line: text. Good for finding usages, configuration keys, or error messages."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "keyword": {
                    "type": "string",
                    "description": "Text to search for (matched literally)"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in, relative to the repository root. Defaults to the root."
                },
                "file_extension": {
                    "type": "string",
                    "description": "Optional: only search files with this extension (e.g. 'py', 'rs')"
                },
                "case_sensitive": {
                    "type": "boolean",
                    "description": "Whether search is case-sensitive (default: false)"
                }
            },
            "required": ["keyword"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::KeywordSearch
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let keyword = args["keyword"]
            .as_str()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Missing 'keyword' argument"))?
            .to_string();
        let path = args["path"].as_str().unwrap_or(".");
        let extension = args["file_extension"]
            .as_str()
            .map(|e| e.trim_start_matches("*.").trim_start_matches('.').to_string());
        let case_sensitive = args["case_sensitive"].as_bool().unwrap_or(false);

        let pattern = RegexBuilder::new(&regex::escape(&keyword))
            .case_insensitive(!case_sensitive)
            .build()?;
        let root = resolve_in_workspace(workspace, path)?;
        let workspace = workspace.to_path_buf();

        tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let matches = scan(&workspace, &root, extension.as_deref(), &pattern);
            Ok(render_matches(matches, &format!("No matches found for '{}'", keyword)))
        })
        .await?
    }
}

/// Find where a function, class, or HTTP endpoint is defined.
pub struct FindDefinition;

#[async_trait]
impl Tool for FindDefinition {
    fn name(&self) -> &str {
        "find_definition"
    }

    fn description(&self) -> &str {
        "Find where a function, method, class, or HTTP endpoint is defined. Returns each definition as path:line: text."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Function, class, or endpoint name (e.g. 'stream_agent' or '/api/ask')"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in, relative to the repository root. Defaults to the root."
                }
            },
            "required": ["name"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::DefinitionSearch
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let name = args["name"]
            .as_str()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Missing 'name' argument"))?
            .to_string();
        let path = args["path"].as_str().unwrap_or(".");

        let pattern = definition_pattern(&name)?;
        let root = resolve_in_workspace(workspace, path)?;
        let workspace = workspace.to_path_buf();

        tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let matches = scan(&workspace, &root, None, &pattern);
            Ok(render_matches(matches, &format!("No definition found for '{}'", name)))
        })
        .await?
    }
}

/// Definition keywords across common languages, plus route registrations.
fn definition_pattern(name: &str) -> anyhow::Result<Regex> {
    let n = regex::escape(name);
    let source = format!(
        concat!(
            r"\b(fn|def|function|func|class|struct|enum|trait|interface|type|impl)\s+{n}\b",
            r"|\b(const|let|var)\s+{n}\s*=\s*(async\s*)?(function\b|\()",
            r"|\b{n}\s*[:=]\s*(async\s*)?function\b",
            r#"|\.(get|post|put|patch|delete|route)\(\s*["'][^"']*{n}"#,
            r#"|@\w+\.(get|post|put|patch|delete|route)\(\s*["'][^"']*{n}"#,
        ),
        n = n
    );
    Ok(Regex::new(&source)?)
}

fn scan(workspace: &Path, root: &Path, extension: Option<&str>, pattern: &Regex) -> Vec<String> {
    let mut matches = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_ignored(&e.file_name().to_string_lossy()));

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(ext) = extension {
            let matches_ext = entry
                .path()
                .extension()
                .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
                .unwrap_or(false);
            if !matches_ext {
                continue;
            }
        }
        // Binary or non-UTF-8 files are skipped.
        let Ok(content) = fs::read_to_string(entry.path()) else {
            continue;
        };

        let display = display_relative(workspace, entry.path());
        for (i, line) in content.lines().enumerate() {
            if pattern.is_match(line) {
                matches.push(format!("{}:{}: {}", display, i + 1, clip(line.trim())));
                // One past the cap so the caller knows output was cut.
                if matches.len() > MAX_MATCHES {
                    return matches;
                }
            }
        }
    }
    matches
}

fn clip(line: &str) -> String {
    if line.chars().count() <= MAX_LINE_CHARS {
        line.to_string()
    } else {
        let clipped: String = line.chars().take(MAX_LINE_CHARS).collect();
        format!("{}…", clipped)
    }
}

fn render_matches(mut matches: Vec<String>, empty_notice: &str) -> String {
    if matches.is_empty() {
        return empty_notice.to_string();
    }
    let truncated = matches.len() > MAX_MATCHES;
    matches.truncate(MAX_MATCHES);
    let mut out = matches.join("\n");
    if truncated {
        out.push_str(&format!("\n... (showing first {} matches)", MAX_MATCHES));
    }
    out
}
