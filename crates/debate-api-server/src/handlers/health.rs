use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::models::chat::StatusMessage;
use crate::services::conversation::ConversationManager;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: String,
    active_conversations: usize,
    activity_queue_len: usize,
}

pub async fn root() -> Json<StatusMessage> {
    Json(StatusMessage {
        message: "DebateBot API is running!".to_string(),
        status: Some("healthy".to_string()),
    })
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

pub async fn readiness_check(
    State(manager): State<Arc<ConversationManager>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready".to_string(),
            active_conversations: manager.stats().active_conversations,
            activity_queue_len: manager.logger().queue_len(),
        }),
    )
}
