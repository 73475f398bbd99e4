//! Scripted agent used when no model backend is configured.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{AgentEvent, QuestionAgent};

/// Streams a canned walkthrough with a delay between events, so the client
/// can be exercised without a model server.
pub struct DemoAgent {
    delay: Duration,
}

impl DemoAgent {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// The events for `question`.
    pub fn script(question: &str) -> Vec<AgentEvent> {
        if question.chars().any(|c| c.is_ascii_digit()) {
            vec![
                AgentEvent::analysis(format!("Parsing question: {}", question)),
                AgentEvent::step("Extract numbers and operations"),
                AgentEvent::step("computing 3 + 4"),
                AgentEvent::step("result: 7"),
                AgentEvent::step("computing 7 / 3"),
                AgentEvent::step("result: 2.3333333333"),
                AgentEvent::final_answer("2.3333333333"),
            ]
        } else {
            vec![
                AgentEvent::analysis(format!("Identified as SAP BTP question: {}", question)),
                AgentEvent::step("Retrieve XSUAA definition from knowledge"),
                AgentEvent::final_answer(
                    "XSUAA is SAP's authorization and authentication service on BTP...",
                ),
            ]
        }
    }
}

impl Default for DemoAgent {
    fn default() -> Self {
        Self::new(Duration::from_millis(600))
    }
}

#[async_trait]
impl QuestionAgent for DemoAgent {
    async fn ask(&self, question: &str, events: mpsc::Sender<AgentEvent>, cancel: CancellationToken) {
        for event in Self::script(question) {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.delay) => {}
            }
            if events.send(event).await.is_err() {
                return;
            }
        }
    }
}
