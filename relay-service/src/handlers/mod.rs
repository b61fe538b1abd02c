//! HTTP handlers for the relay service.

pub mod ask;

use axum::{http::Uri, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

pub use ask::{ask, AskQuery, AskResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
}

/// Liveness probe. No state, no rate limit.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "alive".to_string(),
    })
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No route for {}", uri.path()))
}
