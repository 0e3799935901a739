use axum::{extract::State, Json};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::models::chat::{ChatRequest, ChatResponse};
use crate::services::conversation::{ConversationId, ConversationManager, TurnRequest};
use crate::utils::error::ApiError;

pub async fn chat_handler(
    State(manager): State<Arc<ConversationManager>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let start_time = Instant::now();

    info!(
        "Chat request: conversation={:?}, message_len={}, topic={:?}, side={:?}",
        request.conversation_id,
        request.message.len(),
        request.topic,
        request.side
    );

    // A blank id opens a new conversation
    let turn = TurnRequest {
        conversation_id: request
            .conversation_id
            .filter(|id| !id.trim().is_empty())
            .map(ConversationId::from),
        message: request.message,
        topic: request.topic,
        side: request.side,
    };

    let outcome = manager.handle_turn(turn).await?;

    info!(
        "Chat response: conversation={}, degraded={}, elapsed={}ms",
        outcome.conversation_id,
        outcome.reply.is_degraded(),
        start_time.elapsed().as_millis()
    );

    Ok(Json(ChatResponse {
        conversation_id: outcome.conversation_id.to_string(),
        message: outcome.history,
        degraded: outcome.reply.is_degraded(),
    }))
}
