use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::models::chat::{ConversationResponse, StatusMessage};
use crate::services::conversation::{ConversationId, ConversationManager};
use crate::utils::error::ApiError;

/// Full stored history of one conversation.
pub async fn get_conversation_handler(
    State(manager): State<Arc<ConversationManager>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let snapshot = manager.conversation(&ConversationId::from(conversation_id))?;

    Ok(Json(ConversationResponse {
        conversation_id: snapshot.id.to_string(),
        topic: snapshot.parameters.topic,
        side: snapshot.parameters.side,
        created_at: snapshot.created_at,
        messages: snapshot.turns,
    }))
}

pub async fn delete_conversation_handler(
    State(manager): State<Arc<ConversationManager>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    manager
        .delete_conversation(&ConversationId::from(conversation_id))
        .await?;

    Ok(Json(StatusMessage {
        message: "Conversation deleted successfully".to_string(),
        status: None,
    }))
}
