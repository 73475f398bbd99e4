//! Request-scoped conversation state.

use crate::llm::{ChatMessage, Role};

/// Messages exchanged with the model for one question, plus the round counter.
///
/// Append-only: messages are never edited or removed once pushed.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    rounds: usize,
}

impl Conversation {
    /// Seed with the system prompt and the user's question.
    pub fn new(system_prompt: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(question)],
            rounds: 0,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Model invocations so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub(crate) fn start_round(&mut self) -> usize {
        self.rounds += 1;
        self.rounds
    }

    /// Tool-result messages answering the call `id`.
    pub fn tool_results_for(&self, id: &str) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(id))
            .collect()
    }
}
