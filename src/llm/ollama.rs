//! Ollama native chat client (`POST {host}/api/chat`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{ChatMessage, ChatResponse, LlmClient, Role, ToolCall, ToolSchema};

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
}

impl OllamaClient {
    /// Create a client for `host` (e.g. `http://127.0.0.1:11434`).
    pub fn new(host: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            host: normalize_host(&host.into()),
        })
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSchema]>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: OllamaFunction,
}

#[derive(Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

impl From<&ChatMessage> for OllamaMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone().unwrap_or_default(),
            tool_calls: msg
                .tool_calls
                .iter()
                .flatten()
                .map(|tc| OllamaToolCall {
                    id: Some(tc.id.clone()),
                    function: OllamaFunction {
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    },
                })
                .collect(),
        }
    }
}

/// Ollama only recently started returning call ids; synthesize one when absent.
fn into_tool_call(call: OllamaToolCall) -> ToolCall {
    let id = call
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
    let arguments = match call.function.arguments {
        // Some models emit the arguments as an encoded JSON string.
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    ToolCall::new(id, call.function.name, arguments)
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse> {
        let url = format!("{}/api/chat", self.host);
        let request = OllamaRequest {
            model,
            messages: messages.iter().map(OllamaMessage::from).collect(),
            tools,
            stream: false,
        };

        tracing::debug!(url = %url, model = model, messages = messages.len(), "Calling Ollama");

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("failed to reach ollama at {} (is it running?): {}", url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("ollama http error {}: {}", status, text));
        }

        let body: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("ollama returned invalid JSON: {}", e))?;

        let tool_calls: Vec<ToolCall> = body
            .message
            .tool_calls
            .into_iter()
            .map(into_tool_call)
            .collect();

        Ok(ChatResponse {
            content: Some(body.message.content).filter(|c| !c.is_empty()),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
        })
    }
}
