use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::conversation::types::{Side, Turn};

/// One role/content entry of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: String) -> Self {
        Self { role: "system".to_string(), content }
    }

    pub fn user(content: String) -> Self {
        Self { role: "user".to_string(), content }
    }

    pub fn assistant(content: String) -> Self {
        Self { role: "assistant".to_string(), content }
    }
}

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub side: Option<Side>,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    /// Most recent turns, oldest first.
    pub message: Vec<Turn>,
    /// Set when the latest assistant turn stands in for a failed generation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub topic: Option<String>,
    pub side: Side,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Turn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}
