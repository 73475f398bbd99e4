//! HTTP API.
//!
//! - `POST /api/ask` - answer a question, streamed as newline-delimited JSON events
//! - `GET /api/health` - liveness probe
//! - `GET /` - frontend entry page, when one is installed
//! - `/static/*` - frontend assets

mod ask;
pub mod types;

pub use ask::{encode_line, NDJSON_CONTENT_TYPE};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::agent::{Agent, DemoAgent, QuestionAgent};
use crate::config::{AgentBackend, Config};
use crate::llm::{LlmClient, OllamaClient, OpenAiCompatClient};
use crate::tools::ToolRegistry;

use types::HealthResponse;

/// Frontend locations tried when `STATIC_DIR` is not set.
const STATIC_CANDIDATES: &[&str] = &["./frontend", "./frontend-vue/dist", "./frontend-vue"];

/// Shared, read-only server state.
pub struct AppState {
    pub agent: Arc<dyn QuestionAgent>,
    pub static_dir: Option<PathBuf>,
}

/// Build the question-answering agent selected by the configuration.
pub fn build_agent(config: &Config) -> anyhow::Result<Arc<dyn QuestionAgent>> {
    let llm: Arc<dyn LlmClient> = match config.backend {
        AgentBackend::Demo => return Ok(Arc::new(DemoAgent::default())),
        AgentBackend::Ollama => Arc::new(OllamaClient::new(
            config.ollama_host.clone(),
            config.model_timeout,
        )?),
        AgentBackend::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is required for the openai backend"))?;
            Arc::new(OpenAiCompatClient::new(
                config.openai_base_url.clone(),
                api_key,
                config.model_timeout,
            )?)
        }
    };
    Ok(Arc::new(Agent::new(
        config.clone(),
        llm,
        Arc::new(ToolRegistry::new()),
    )))
}

/// Pick the frontend directory: explicit setting first, then the usual build locations.
fn find_static_dir(configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(dir) => {
            if dir.is_dir() {
                Some(dir.to_path_buf())
            } else {
                tracing::warn!(dir = %dir.display(), "STATIC_DIR is not a directory; not serving a frontend");
                None
            }
        }
        None => STATIC_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_dir()),
    }
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/", get(index))
        .route("/api/ask", post(ask::ask))
        .route("/api/health", get(health));

    if let Some(dir) = &state.static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let agent = build_agent(&config)?;
    let static_dir = find_static_dir(config.static_dir.as_deref());
    match &static_dir {
        Some(dir) => tracing::info!(dir = %dir.display(), "Serving frontend"),
        None => tracing::info!("No frontend static directory found; continuing without static mount"),
    }

    let state = Arc::new(AppState { agent, static_dir });
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        futures::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// GET / - the frontend entry page, or a plain liveness message.
async fn index(State(state): State<Arc<AppState>>) -> Response {
    if let Some(dir) = &state.static_dir {
        if let Ok(html) = tokio::fs::read_to_string(dir.join("index.html")).await {
            return Html(html).into_response();
        }
    }
    "Agent backend running".into_response()
}

/// GET /api/health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
