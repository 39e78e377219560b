/// Unified error handling module
use crate::domain::IncursionLayout;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Errors raised while talking to ESI
#[derive(Debug, thiserror::Error)]
pub enum EsiError {
    #[error("request to ESI failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ESI returned {status} and no cached data was available")]
    ServerUnavailable { status: u16 },

    #[error("server answered 304 Not Modified but the cache was empty")]
    EmptyCache,

    #[error("status code {status} received from server: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("failed to decode ESI response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("enrichment failed: {0}")]
    Enrichment(String),
}

impl EsiError {
    /// Network trouble or an overloaded server, worth retrying on the next cycle
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EsiError::Transport(_) | EsiError::ServerUnavailable { .. }
        )
    }
}

pub type EsiResult<T> = Result<T, EsiError>;

/// Why a layout traversal stopped before reaching the HQ
#[derive(Debug)]
pub enum AbortReason {
    QueueExhausted,
    Lookup(EsiError),
}

/// Layout guess that could not be finished. `partial` holds whatever was assigned so far.
#[derive(Debug, thiserror::Error)]
#[error("layout classification aborted for staging {staging_id}: {reason}")]
pub struct LayoutAbort {
    pub staging_id: i64,
    pub reason: AbortReason,
    pub partial: IncursionLayout,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::QueueExhausted => write!(f, "ran out of systems before reaching the HQ"),
            AbortReason::Lookup(e) => write!(f, "lookup failed: {}", e),
        }
    }
}

/// Unified error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    InvalidInput(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            ApiError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            ApiError::InvalidInput(msg) => ("INVALID_INPUT", msg.clone()),
        };

        let error_response = ErrorResponse {
            ok: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        // Always return HTTP 200 with ok=false
        (StatusCode::OK, Json(error_response)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
