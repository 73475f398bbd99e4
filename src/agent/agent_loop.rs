//! Core agent loop implementation.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, ToolCall, ToolSchema};
use crate::tools::{ToolCategory, ToolRegistry, ERROR_MARKER};

use super::conversation::Conversation;
use super::prompt::build_system_prompt;
use super::translator::{intent_event, outcome_events};
use super::{AgentEvent, QuestionAgent};

/// Final text used when the model ends the loop without saying anything.
const EMPTY_ANSWER: &str = "The model returned an empty answer.";

/// Why a run stopped without a final answer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent invocation failed: {0:#}")]
    Llm(anyhow::Error),

    /// The client went away; nothing more is emitted.
    #[error("request cancelled")]
    Cancelled,

    #[error("Max iterations ({0}) reached without completion")]
    MaxIterations(usize),
}

/// The tool-calling agent.
///
/// Holds only read-only, process-wide state; every call to [`Agent::run`]
/// owns its own [`Conversation`], so one `Agent` serves concurrent requests.
pub struct Agent {
    config: Config,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    tool_schemas: Vec<ToolSchema>,
}

impl Agent {
    /// Create a new agent.
    pub fn new(config: Config, llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        let system_prompt = build_system_prompt(&tools);
        let tool_schemas = tools.get_tool_schemas();
        Self {
            config,
            llm,
            tools,
            system_prompt,
            tool_schemas,
        }
    }

    /// Answer `question`, streaming events into `events`.
    ///
    /// Exactly one terminal event (`final` or `error`) is sent unless the run
    /// is cancelled. Returns the conversation as it stood when the run ended.
    pub async fn run(
        &self,
        question: &str,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> Conversation {
        let mut conversation = Conversation::new(self.system_prompt.clone(), question);

        let terminal = match self.drive(&mut conversation, events, cancel).await {
            Ok(answer) => {
                tracing::info!(rounds = conversation.rounds(), "Agent produced final answer");
                AgentEvent::final_answer(answer)
            }
            Err(AgentError::Cancelled) => {
                tracing::info!(rounds = conversation.rounds(), "Agent run cancelled");
                return conversation;
            }
            Err(e) => {
                tracing::error!(rounds = conversation.rounds(), error = %e, "Agent run failed");
                AgentEvent::error(e.to_string())
            }
        };

        if events.send(terminal).await.is_err() {
            tracing::debug!("Client disconnected before the terminal event");
        }
        conversation
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        loop {
            if conversation.rounds() >= self.config.max_iterations {
                return Err(AgentError::MaxIterations(self.config.max_iterations));
            }
            let round = conversation.start_round();
            tracing::debug!("Agent iteration {}", round);

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                response = self.llm.chat_completion(
                    &self.config.default_model,
                    conversation.messages(),
                    Some(&self.tool_schemas),
                ) => response.map_err(AgentError::Llm)?,
            };

            let text = response.text().map(str::to_string);
            let tool_calls = response.calls().to_vec();
            conversation.push(ChatMessage::assistant(response.content.clone(), tool_calls.clone()));

            // No tool calls: the text is the answer.
            if tool_calls.is_empty() {
                return Ok(text.unwrap_or_else(|| EMPTY_ANSWER.to_string()));
            }

            if let Some(text) = text {
                emit(events, AgentEvent::analysis(text)).await?;
            }

            for tool_call in &tool_calls {
                self.handle_tool_call(tool_call, conversation, events, cancel)
                    .await?;
            }
        }
    }

    /// Run one requested tool, record its result, and narrate it.
    async fn handle_tool_call(
        &self,
        tool_call: &ToolCall,
        conversation: &mut Conversation,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let name = &tool_call.function.name;
        let tool = self.tools.resolve(name);
        let category = tool.map(|t| t.category()).unwrap_or(ToolCategory::Other);

        emit(events, intent_event(category, tool_call)).await?;

        let outcome = match tool {
            None => {
                tracing::warn!(tool = %name, "Model requested an unknown tool");
                format!("{} unknown tool: {}", ERROR_MARKER, name)
            }
            Some(tool) => {
                tracing::info!(tool = %tool.name(), id = %tool_call.id, "Executing tool");
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                    result = tool.execute(tool_call.function.arguments.clone(), &self.config.workspace_path) => result,
                };
                match result {
                    Ok(output) => output,
                    Err(e) => {
                        tracing::warn!(tool = %tool.name(), error = %e, "Tool failed");
                        format!("{} tool {} failed: {}", ERROR_MARKER, tool.name(), e)
                    }
                }
            }
        };

        conversation.push(ChatMessage::tool_result(tool_call.id.clone(), outcome.clone()));

        for event in outcome_events(category, tool_call, &outcome) {
            emit(events, event).await?;
        }
        Ok(())
    }
}

/// Send an event; a closed channel means the client is gone.
async fn emit(events: &mpsc::Sender<AgentEvent>, event: AgentEvent) -> Result<(), AgentError> {
    events.send(event).await.map_err(|_| AgentError::Cancelled)
}

#[async_trait]
impl QuestionAgent for Agent {
    async fn ask(&self, question: &str, events: mpsc::Sender<AgentEvent>, cancel: CancellationToken) {
        self.run(question, &events, &cancel).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::{json, Value};

    use crate::llm::{ChatResponse, Role};
    use crate::tools::Tool;

    /// Returns queued responses in order and records the history it was sent.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<anyhow::Result<ChatResponse>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<anyhow::Result<ChatResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn history_at(&self, call: usize) -> Vec<ChatMessage> {
            self.seen.lock().unwrap()[call].clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[ToolSchema]>,
        ) -> anyhow::Result<ChatResponse> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
        }
    }

    /// Asks for `add` forever.
    struct LoopingLlm;

    #[async_trait]
    impl LlmClient for LoopingLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[ToolSchema]>,
        ) -> anyhow::Result<ChatResponse> {
            Ok(calls(vec![ToolCall::new(
                format!("call_{}", messages.len()),
                "add",
                json!({"a": 1, "b": 1}),
            )]))
        }
    }

    /// Never answers.
    struct HangingLlm;

    #[async_trait]
    impl LlmClient for HangingLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolSchema]>,
        ) -> anyhow::Result<ChatResponse> {
            futures::future::pending().await
        }
    }

    /// Tool with a fixed category and canned output.
    struct StubTool {
        name: &'static str,
        category: ToolCategory,
        output: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        fn category(&self) -> ToolCategory {
            self.category
        }

        async fn execute(&self, _args: Value, _workspace: &Path) -> anyhow::Result<String> {
            self.output
                .map(str::to_string)
                .map_err(|e| anyhow::anyhow!(e))
        }
    }

    /// A tool whose execution never completes.
    struct HangingTool;

    #[async_trait]
    impl Tool for HangingTool {
        fn name(&self) -> &str {
            "hanging_tool"
        }

        fn description(&self) -> &str {
            "never finishes"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        fn category(&self) -> ToolCategory {
            ToolCategory::Other
        }

        async fn execute(&self, _args: Value, _workspace: &Path) -> anyhow::Result<String> {
            futures::future::pending().await
        }
    }

    fn text(content: &str) -> ChatResponse {
        ChatResponse {
            content: Some(content.to_string()),
            tool_calls: None,
        }
    }

    fn calls(tool_calls: Vec<ToolCall>) -> ChatResponse {
        ChatResponse {
            content: None,
            tool_calls: Some(tool_calls),
        }
    }

    fn agent_with(llm: Arc<dyn LlmClient>, tools: ToolRegistry, workspace: &Path) -> Agent {
        Agent::new(Config::new(workspace.to_path_buf()), llm, Arc::new(tools))
    }

    async fn run_collect(agent: &Agent, question: &str) -> (Vec<AgentEvent>, Conversation) {
        let (tx, mut rx) = mpsc::channel(256);
        let conversation = agent.run(question, &tx, &CancellationToken::new()).await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        (events, conversation)
    }

    fn assert_single_terminal_last(events: &[AgentEvent]) {
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminals, 1, "events: {:?}", events);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn arithmetic_question_streams_steps_then_final() {
        let llm = ScriptedLlm::new(vec![
            Ok(calls(vec![ToolCall::new("call_1", "add", json!({"a": 5, "b": 3}))])),
            Ok(text("8")),
        ]);
        let agent = agent_with(llm.clone(), ToolRegistry::new(), Path::new("."));

        let (events, conversation) = run_collect(&agent, "What is 5 + 3?").await;

        assert_eq!(
            events,
            vec![
                AgentEvent::step("computing 5 + 3"),
                AgentEvent::step("result: 8"),
                AgentEvent::final_answer("8"),
            ]
        );
        assert_eq!(llm.calls(), 2);
        assert_eq!(conversation.rounds(), 2);
        let results = conversation.tool_results_for("call_1");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content.as_deref(), Some("8"));
    }

    #[tokio::test]
    async fn knowledge_question_answers_without_tools() {
        let definition = "XSUAA is SAP's authorization and trust management service on BTP.";
        let llm = ScriptedLlm::new(vec![Ok(text(definition))]);
        let agent = agent_with(llm.clone(), ToolRegistry::new(), Path::new("."));

        let (events, conversation) = run_collect(&agent, "What is XSUAA?").await;

        assert_eq!(events, vec![AgentEvent::final_answer(definition)]);
        assert!(!events.iter().any(|e| matches!(e, AgentEvent::Step { .. })));
        assert!(conversation.messages().iter().all(|m| m.role != Role::Tool));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn commentary_alongside_tool_calls_is_analysis() {
        let llm = ScriptedLlm::new(vec![
            Ok(ChatResponse {
                content: Some("Let me multiply those.".to_string()),
                tool_calls: Some(vec![ToolCall::new("c1", "multiply", json!({"a": 10, "b": 4}))]),
            }),
            Ok(text("40")),
        ]);
        let agent = agent_with(llm, ToolRegistry::new(), Path::new("."));

        let (events, _) = run_collect(&agent, "What is 10 times 4?").await;

        assert_eq!(events[0], AgentEvent::analysis("Let me multiply those."));
        assert_eq!(events[1], AgentEvent::step("computing 10 * 4"));
        assert_single_terminal_last(&events);
    }

    #[tokio::test]
    async fn every_call_in_a_turn_gets_one_result_before_next_model_call() {
        let llm = ScriptedLlm::new(vec![
            Ok(calls(vec![
                ToolCall::new("c1", "add", json!({"a": 3, "b": 4})),
                ToolCall::new("c2", "divide", json!({"a": 7, "b": 3})),
            ])),
            Ok(text("2.33")),
        ]);
        let agent = agent_with(llm.clone(), ToolRegistry::new(), Path::new("."));

        let (events, conversation) = run_collect(&agent, "(3 + 4) / 3?").await;
        assert_single_terminal_last(&events);

        let second_call = llm.history_at(1);
        let tool_ids: Vec<_> = second_call
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(tool_ids, vec!["c1", "c2"]);
        assert_eq!(conversation.tool_results_for("c1").len(), 1);
        assert_eq!(conversation.tool_results_for("c2").len(), 1);
    }

    #[tokio::test]
    async fn failing_tool_is_reported_to_the_model_and_loop_continues() {
        let tools = ToolRegistry::empty().with_tool(StubTool {
            name: "always_fails",
            category: ToolCategory::Other,
            output: Err("disk on fire"),
        });
        let llm = ScriptedLlm::new(vec![
            Ok(calls(vec![ToolCall::new("c1", "always_fails", json!({}))])),
            Ok(text("Sorry, the tool failed.")),
        ]);
        let agent = agent_with(llm.clone(), tools, Path::new("."));

        let (events, conversation) = run_collect(&agent, "do it").await;

        let result = conversation.tool_results_for("c1")[0].content.clone().unwrap();
        assert_eq!(result, "Error: tool always_fails failed: disk on fire");
        assert_eq!(llm.calls(), 2);
        assert_eq!(
            events,
            vec![
                AgentEvent::step("executing always_fails"),
                AgentEvent::final_answer("Sorry, the tool failed."),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_tool_yields_synthetic_result() {
        let llm = ScriptedLlm::new(vec![
            Ok(calls(vec![ToolCall::new("c1", "fooBar", json!({"x": 1}))])),
            Ok(text("done")),
        ]);
        let agent = agent_with(llm, ToolRegistry::new(), Path::new("."));

        let (events, conversation) = run_collect(&agent, "foo?").await;

        assert_eq!(
            conversation.tool_results_for("c1")[0].content.as_deref(),
            Some("Error: unknown tool: fooBar")
        );
        assert_eq!(
            events,
            vec![AgentEvent::step("executing fooBar"), AgentEvent::final_answer("done")]
        );
    }

    #[tokio::test]
    async fn drifted_tool_name_resolves_through_alias() {
        let llm = ScriptedLlm::new(vec![
            Ok(calls(vec![ToolCall::new("c1", "Multiply", json!({"a": 6, "b": 7}))])),
            Ok(text("42")),
        ]);
        let agent = agent_with(llm, ToolRegistry::new(), Path::new("."));

        let (events, conversation) = run_collect(&agent, "6 * 7").await;

        assert_eq!(conversation.tool_results_for("c1")[0].content.as_deref(), Some("42"));
        assert_eq!(events[1], AgentEvent::step("result: 42"));
    }

    #[tokio::test]
    async fn missing_file_read_emits_no_snippet_but_records_result() {
        let ws = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![
            Ok(calls(vec![ToolCall::new("c1", "read_file", json!({"path": "nope.py"}))])),
            Ok(text("That file does not exist.")),
        ]);
        let agent = agent_with(llm, ToolRegistry::new(), ws.path());

        let (events, conversation) = run_collect(&agent, "show nope.py").await;

        assert!(!events.iter().any(|e| matches!(e, AgentEvent::CodeSnippet { .. })));
        assert_eq!(events[0], AgentEvent::step("reading file nope.py"));
        let result = conversation.tool_results_for("c1")[0].content.clone().unwrap();
        assert!(result.starts_with("Error:"));
        assert_single_terminal_last(&events);
    }

    #[tokio::test]
    async fn existing_file_read_emits_snippet() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("app.py"), "print('hi')\n").unwrap();
        let llm = ScriptedLlm::new(vec![
            Ok(calls(vec![ToolCall::new("c1", "read_file", json!({"path": "app.py"}))])),
            Ok(text("It prints hi.")),
        ]);
        let agent = agent_with(llm, ToolRegistry::new(), ws.path());

        let (events, _) = run_collect(&agent, "what does app.py do?").await;

        assert_eq!(
            events[1],
            AgentEvent::CodeSnippet {
                file_path: "app.py".to_string(),
                line_range: "1+".to_string(),
                code: "print('hi')".to_string(),
                language: "python".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn definition_search_references_precede_next_turn() {
        let tools = ToolRegistry::empty().with_tool(StubTool {
            name: "find_definition",
            category: ToolCategory::DefinitionSearch,
            output: Ok("a.py:3: def ask():\nb.py:10: def ask(q):\nc/d.js:7: function ask() {}"),
        });
        let llm = ScriptedLlm::new(vec![
            Ok(calls(vec![ToolCall::new("c1", "find_definition", json!({"name": "ask"}))])),
            Ok(text("Three definitions.")),
        ]);
        let agent = agent_with(llm, tools, Path::new("."));

        let (events, _) = run_collect(&agent, "where is ask defined?").await;

        let file_ref = |p: &str, line| AgentEvent::FileReference {
            file_path: p.to_string(),
            line,
        };
        assert_eq!(
            events,
            vec![
                AgentEvent::step("searching for definition of 'ask'"),
                file_ref("a.py", 3),
                file_ref("b.py", 10),
                file_ref("c/d.js", 7),
                AgentEvent::step("found 3 definitions"),
                AgentEvent::final_answer("Three definitions."),
            ]
        );
    }

    #[tokio::test]
    async fn model_failure_is_a_single_error_event() {
        let llm = ScriptedLlm::new(vec![Err(anyhow::anyhow!("connection refused"))]);
        let agent = agent_with(llm, ToolRegistry::new(), Path::new("."));

        let (events, _) = run_collect(&agent, "hello").await;

        assert_eq!(
            events,
            vec![AgentEvent::error("Agent invocation failed: connection refused")]
        );
    }

    #[tokio::test]
    async fn round_cap_turns_endless_tool_requests_into_error() {
        let mut config = Config::new(".".into());
        config.max_iterations = 3;
        let agent = Agent::new(config, Arc::new(LoopingLlm), Arc::new(ToolRegistry::new()));

        let (events, conversation) = run_collect(&agent, "loop").await;

        assert_eq!(conversation.rounds(), 3);
        assert_eq!(
            events.last(),
            Some(&AgentEvent::error("Max iterations (3) reached without completion"))
        );
        assert_single_terminal_last(&events);
    }

    #[tokio::test]
    async fn empty_answer_falls_back_to_notice() {
        let llm = ScriptedLlm::new(vec![Ok(ChatResponse::default())]);
        let agent = agent_with(llm, ToolRegistry::new(), Path::new("."));

        let (events, _) = run_collect(&agent, "?").await;

        assert_eq!(events, vec![AgentEvent::final_answer(EMPTY_ANSWER)]);
    }

    #[tokio::test]
    async fn cancellation_abandons_a_pending_model_call() {
        let agent = agent_with(Arc::new(HangingLlm), ToolRegistry::new(), Path::new("."));
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let conversation = tokio::time::timeout(Duration::from_secs(5), agent.run("hi", &tx, &cancel))
            .await
            .expect("run should stop once cancelled");
        drop(tx);

        assert_eq!(conversation.rounds(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_abandons_a_running_tool() {
        let llm = ScriptedLlm::new(vec![
            Ok(calls(vec![ToolCall::new("c1", "hanging_tool", json!({}))])),
            Ok(text("unreachable")),
        ]);
        let tools = ToolRegistry::empty().with_tool(HangingTool);
        let agent = agent_with(llm.clone(), tools, Path::new("."));
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let conversation = tokio::time::timeout(Duration::from_secs(5), agent.run("hang", &tx, &cancel))
            .await
            .expect("run should stop once cancelled");
        drop(tx);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events, vec![AgentEvent::step("executing hanging_tool")]);
        assert!(conversation.tool_results_for("c1").is_empty());
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn closed_event_channel_stops_the_loop() {
        let llm = ScriptedLlm::new(vec![
            Ok(calls(vec![ToolCall::new("c1", "add", json!({"a": 1, "b": 2}))])),
            Ok(text("3")),
        ]);
        let agent = agent_with(llm.clone(), ToolRegistry::new(), Path::new("."));
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let conversation = agent.run("1 + 2", &tx, &CancellationToken::new()).await;

        // The intent event fails to send, so the tool never runs.
        assert_eq!(llm.calls(), 1);
        assert!(conversation.tool_results_for("c1").is_empty());
    }
}
