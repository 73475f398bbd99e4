//! Events streamed to the client while a question is being answered.

use serde::Serialize;

/// One unit of progress. Exactly one `Final` or `Error` closes every stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Narrative text produced by the model alongside (or instead of) tool calls.
    Analysis { text: String },
    /// Human-readable progress line.
    Step { text: String },
    /// Excerpt of a file that was read.
    CodeSnippet {
        file_path: String,
        /// `start-end`, or `start+` when the read was not bounded.
        line_range: String,
        code: String,
        language: String,
    },
    /// A location found by a definition search.
    FileReference { file_path: String, line: usize },
    /// Rendered directory listing.
    DirectoryTree { path: String, tree: String },
    /// The answer.
    Final { text: String },
    /// The request failed.
    Error { text: String },
}

impl AgentEvent {
    pub fn analysis(text: impl Into<String>) -> Self {
        Self::Analysis { text: text.into() }
    }

    pub fn step(text: impl Into<String>) -> Self {
        Self::Step { text: text.into() }
    }

    pub fn final_answer(text: impl Into<String>) -> Self {
        Self::Final { text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { text: text.into() }
    }

    /// Whether this event closes the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final { .. } | Self::Error { .. })
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Analysis { .. } => "analysis",
            Self::Step { .. } => "step",
            Self::CodeSnippet { .. } => "code_snippet",
            Self::FileReference { .. } => "file_reference",
            Self::DirectoryTree { .. } => "directory_tree",
            Self::Final { .. } => "final",
            Self::Error { .. } => "error",
        }
    }
}
