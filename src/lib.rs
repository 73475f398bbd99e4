//! # Answer Agent
//!
//! A backend that answers natural-language questions by orchestrating a
//! tool-calling language model, streaming its progress to the client.
//!
//! This library provides:
//! - An HTTP API that streams answer events as newline-delimited JSON
//! - A tool-calling agent loop with arithmetic and read-only repository tools
//! - Clients for Ollama and OpenAI-compatible chat endpoints
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a question via the API
//! 2. Seed the conversation with the system prompt and the question
//! 3. Call the LLM, execute any tool calls, narrate each one as events
//! 4. Feed results back to the LLM, repeat until it answers
//!
//! ## Example
//!
//! ```rust,ignore
//! use answer_agent::{api, config::Config};
//!
//! let config = Config::from_env()?;
//! let agent = api::build_agent(&config)?;
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! agent.ask("What is 5 + 3?", tx, Default::default()).await;
//! while let Some(event) = rx.recv().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod tools;

pub use config::Config;
