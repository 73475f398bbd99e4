//! Agent module - the question-answering loop and its event protocol.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Seed the conversation with the system prompt and the question
//! 2. Call the LLM with the tool catalog
//! 3. For each requested tool call: announce it, run it, record the result,
//!    narrate the outcome
//! 4. Repeat until the LLM answers without requesting tools, or the round
//!    cap is reached

mod agent_loop;
mod conversation;
mod demo;
mod events;
mod prompt;
pub mod translator;

pub use agent_loop::{Agent, AgentError};
pub use conversation::Conversation;
pub use demo::DemoAgent;
pub use events::AgentEvent;
pub use prompt::build_system_prompt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Anything that can answer a question as a stream of events.
#[async_trait]
pub trait QuestionAgent: Send + Sync {
    /// Answer `question`, sending events into `events` until a terminal event
    /// has been sent or `cancel` fires.
    async fn ask(&self, question: &str, events: mpsc::Sender<AgentEvent>, cancel: CancellationToken);
}
