use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::services::conversation::types::ConversationId;

/// Failures of the conversation core that a caller can act on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),

    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),

    #[error("debate parameters already resolved for conversation {0}")]
    ParametersAlreadyResolved(ConversationId),
}

/// Failures of an upstream completion call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("failed to call LLM API: {0}")]
    Transport(String),

    #[error("LLM API error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse LLM response: {0}")]
    Malformed(String),

    #[error("LLM returned no content")]
    Empty,

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM is overloaded, no request slot became free")]
    Overloaded,
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
            Self::Empty => "empty",
            Self::Timeout(_) => "timeout",
            Self::Overloaded => "overloaded",
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", msg)
            },
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            },
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg)
            },
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound(_) => ApiError::NotFound("Conversation not found".to_string()),
            ConversationError::EmptyMessage | ConversationError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ConversationError::ParametersAlreadyResolved(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}
