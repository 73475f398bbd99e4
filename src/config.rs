//! Configuration management for the answer agent.
//!
//! Configuration is read from environment variables:
//! - `AGENT_BACKEND` - Optional. `ollama` (default), `openai`, or `demo` (scripted, no model).
//! - `DEFAULT_MODEL` - Optional. Model name. Defaults to `llama3.1:8b` for Ollama and
//!   `openai/gpt-4o-mini` for OpenAI-compatible endpoints.
//! - `OLLAMA_HOST` - Optional. Ollama server. Defaults to `http://127.0.0.1:11434`.
//! - `OPENAI_BASE_URL` - Optional. Defaults to `https://openrouter.ai/api/v1`.
//! - `OPENAI_API_KEY` - Required when `AGENT_BACKEND=openai`.
//! - `WORKSPACE_PATH` - Optional. Repository the inspection tools read. Defaults to current directory.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `MAX_ITERATIONS` - Optional. Maximum model rounds per question. Defaults to `50`.
//! - `MODEL_TIMEOUT_SECS` - Optional. Timeout of one model call. Defaults to `120`.
//! - `STATIC_DIR` - Optional. Frontend directory served under `/static`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which implementation answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentBackend {
    /// Tool-calling agent backed by an Ollama server.
    Ollama,
    /// Tool-calling agent backed by an OpenAI-compatible endpoint.
    OpenAi,
    /// Scripted walkthrough, no model needed.
    Demo,
}

impl FromStr for AgentBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "openrouter" => Ok(Self::OpenAi),
            "demo" | "dummy" => Ok(Self::Demo),
            other => Err(format!("expected ollama, openai or demo, got: {}", other)),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: AgentBackend,

    /// Model identifier passed to the backend
    pub default_model: String,

    pub ollama_host: String,

    pub openai_base_url: String,

    /// API key for OpenAI-compatible endpoints
    pub api_key: Option<String>,

    /// Repository root for the read-only inspection tools
    pub workspace_path: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum model rounds for one question
    pub max_iterations: usize,

    /// Timeout applied to each model call
    pub model_timeout: Duration,

    /// Frontend directory, if any
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if the OpenAI backend is selected
    /// without `OPENAI_API_KEY`, and `ConfigError::InvalidValue` for values
    /// that do not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through `var`, which returns the value of a variable if set.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = var("AGENT_BACKEND")
            .map(|v| {
                v.parse::<AgentBackend>()
                    .map_err(|e| ConfigError::InvalidValue("AGENT_BACKEND".to_string(), e))
            })
            .transpose()?
            .unwrap_or(AgentBackend::Ollama);

        let api_key = var("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        if backend == AgentBackend::OpenAi && api_key.is_none() {
            return Err(ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()));
        }

        let default_model = var("DEFAULT_MODEL").unwrap_or_else(|| match backend {
            AgentBackend::OpenAi => "openai/gpt-4o-mini".to_string(),
            AgentBackend::Ollama | AgentBackend::Demo => "llama3.1:8b".to_string(),
        });

        let workspace_path = var("WORKSPACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let port = parse_var(&var, "PORT", 8000)?;
        let max_iterations: usize = parse_var(&var, "MAX_ITERATIONS", 50)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let timeout_secs = parse_var(&var, "MODEL_TIMEOUT_SECS", 120u64)?;

        Ok(Self {
            backend,
            default_model,
            ollama_host: var("OLLAMA_HOST").unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string()),
            api_key,
            workspace_path,
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            max_iterations,
            model_timeout: Duration::from_secs(timeout_secs),
            static_dir: var("STATIC_DIR").map(PathBuf::from),
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(workspace_path: PathBuf) -> Self {
        Self {
            backend: AgentBackend::Ollama,
            default_model: "llama3.1:8b".to_string(),
            ollama_host: "http://127.0.0.1:11434".to_string(),
            openai_base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            workspace_path,
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_iterations: 50,
            model_timeout: Duration::from_secs(120),
            static_dir: None,
        }
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}
