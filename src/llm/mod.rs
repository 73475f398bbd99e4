//! LLM client abstraction.
//!
//! The agent only needs one capability from a model: given the conversation so
//! far and the tool catalog, return text, tool calls, or both. Two HTTP
//! backends implement it: Ollama's native chat API and any OpenAI-compatible
//! `/chat/completions` endpoint (OpenRouter, vLLM, LM Studio, ...).

mod ollama;
mod openai;
mod types;

pub use ollama::OllamaClient;
pub use openai::OpenAiCompatClient;
pub use types::{ChatMessage, ChatResponse, FunctionCall, FunctionSchema, Role, ToolCall, ToolSchema};

use async_trait::async_trait;

/// A chat model that understands tool calling.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the full message history and return the model's next turn.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse>;
}
