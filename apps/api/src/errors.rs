use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::partition::{LayoutError, StructureError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// A failed extraction is deliberately absent: it is a degraded success, carried
/// in the response payload rather than raised.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or unusable request input. Caller-correctable.
    #[error("Input error: {0}")]
    Input(String),

    /// The model call failed, returned a non-success status, or timed out.
    #[error("Upstream error: {0}")]
    Upstream(#[from] LlmError),

    #[error("Structure error: {0}")]
    Structure(#[from] StructureError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Input(_) => "INPUT_ERROR",
            AppError::Upstream(_) => "UPSTREAM_ERROR",
            AppError::Structure(_) => "STRUCTURE_ERROR",
            AppError::Layout(_) => "LAYOUT_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Input(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Structure(_) | AppError::Layout(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the client. Logs the details of server-side
    /// failures as a side effect.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Input(msg) => msg.clone(),
            AppError::Upstream(e) => {
                tracing::error!(status = ?e.status(), "LLM error: {e}");
                format!("Model request failed: {e}")
            }
            AppError::Structure(e) => {
                tracing::warn!("Partition tree rejected: {e}");
                e.to_string()
            }
            AppError::Layout(e) => {
                tracing::warn!("Layout aborted: {e}");
                e.to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "error_kind": self.kind(),
                "message": self.client_message()
            }
        }));

        (self.status(), body).into_response()
    }
}
