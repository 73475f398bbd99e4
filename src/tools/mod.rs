//! Tool catalog: the capabilities the model may ask the agent to run.
//!
//! Every tool is read-only. File-system tools resolve their paths inside the
//! workspace root and refuse anything that would escape it.

mod arithmetic;
mod file_ops;
mod search;

pub use arithmetic::{Add, Divide, Multiply};
pub use file_ops::{ListDirectory, ReadFile};
pub use search::{FindDefinition, SearchCode};

pub(crate) use arithmetic::{format_number, number_arg};
pub(crate) use file_ops::line_arg;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{FunctionSchema, ToolSchema};

/// Prefix reserved for tool outcomes that describe a failure.
pub const ERROR_MARKER: &str = "Error:";

/// Prefix of the line a tool appends when it cut its output short.
pub const TRUNCATION_MARKER: &str = "... (";

/// Whether a tool outcome describes a failure.
pub fn is_error_result(result: &str) -> bool {
    result.trim_start().starts_with(ERROR_MARKER)
}

/// How a tool's activity is narrated to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    Arithmetic { operator: &'static str },
    ReadFile,
    KeywordSearch,
    DefinitionSearch,
    ListDirectory,
    Other,
}

/// A capability the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Canonical tool name.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    fn category(&self) -> ToolCategory {
        ToolCategory::Other
    }

    /// Run the tool. `workspace` is the root all relative paths resolve against.
    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String>;
}

/// Name and description of a registered tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// The tool catalog.
///
/// Lookups try the exact name first, then a normalized alias (lowercase,
/// separators stripped) so `readFile` or `read-file` still reach `read_file`.
/// The registry is immutable once built and shared across requests.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
    aliases: HashMap<String, usize>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Registry with all built-in tools.
    pub fn new() -> Self {
        Self::empty()
            .with_tool(Add)
            .with_tool(Multiply)
            .with_tool(Divide)
            .with_tool(ReadFile)
            .with_tool(SearchCode)
            .with_tool(FindDefinition)
            .with_tool(ListDirectory)
    }

    /// Registry with no tools.
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Add a tool. A later tool with the same name replaces the earlier one.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let alias = normalize_tool_name(&name);
        let index = match self.by_name.get(&name) {
            Some(&existing) => {
                self.tools[existing] = tool;
                existing
            }
            None => {
                self.tools.push(tool);
                self.tools.len() - 1
            }
        };
        self.by_name.insert(name, index);
        self.aliases.entry(alias).or_insert(index);
    }

    /// Resolve a tool by exact name, falling back to the normalized alias.
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name
            .get(name)
            .or_else(|| self.aliases.get(&normalize_tool_name(name)))
            .map(|&index| &self.tools[index])
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Tool descriptions in the function-calling format models expect.
    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                kind: "function",
                function: FunctionSchema {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }
}

/// Lowercase and drop everything that is not a letter or digit.
pub fn normalize_tool_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolve a model-supplied relative path inside the workspace.
pub(crate) fn resolve_in_workspace(workspace: &Path, path: &str) -> anyhow::Result<PathBuf> {
    let rel = Path::new(path.trim());
    let mut resolved = workspace.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(anyhow::anyhow!(
                    "path '{}' must be relative to the workspace and must not contain '..'",
                    path
                ));
            }
        }
    }
    Ok(resolved)
}

/// Display a path relative to the workspace, with `/` separators.
pub(crate) fn display_relative(workspace: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(workspace).unwrap_or(path);
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Hidden entries and build/dependency directories are never walked.
pub(crate) fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || matches!(name, "target" | "node_modules" | "__pycache__" | "dist")
}
