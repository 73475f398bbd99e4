//! API request and response types.

use serde::{Deserialize, Serialize};

/// Request to answer a question.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    /// The user's question
    pub question: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}
