use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Opaque conversation identifier (UUID v4 text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Mint a fresh identifier. Never collides in practice.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    #[serde(rename = "message")]
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: TurnRole::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: TurnRole::Assistant, text: text.into() }
    }
}

/// Debate position the assistant argues for the whole conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Pro,
    Con,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pro => "pro",
            Self::Con => "con",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pro" => Ok(Self::Pro),
            "con" => Ok(Self::Con),
            other => Err(format!("side must be 'pro' or 'con', got '{}'", other)),
        }
    }
}

/// Text used in prompts when a conversation has no known topic.
pub const PLACEHOLDER_TOPIC: &str = "the given topic";

/// Topic and side governing a conversation. Fixed once resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateParameters {
    pub topic: Option<String>,
    pub side: Side,
}

impl DebateParameters {
    pub fn new(topic: Option<String>, side: Side) -> Self {
        Self { topic, side }
    }

    pub fn topic_or_placeholder(&self) -> &str {
        self.topic.as_deref().unwrap_or(PLACEHOLDER_TOPIC)
    }
}

/// Complete conversation state stored in memory
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub id: ConversationId,

    /// `None` only between creation and parameter resolution.
    pub parameters: Option<DebateParameters>,

    /// Full history, oldest first.
    pub turns: Vec<Turn>,

    pub created_at: DateTime<Utc>,

    /// Last read or write, drives idle expiry
    pub last_activity: Instant,
}

impl ConversationState {
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            parameters: None,
            turns: Vec::new(),
            created_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_activity.elapsed() > ttl
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Read-only copy of a conversation handed out by the store.
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub id: ConversationId,
    pub parameters: DebateParameters,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

/// Result of the generation step of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The backend produced an answer.
    Answered(String),
    /// The backend failed; the stored assistant turn carries an apology.
    Degraded { reason: String },
}

impl Reply {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Incoming turn, independent of transport.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub conversation_id: Option<ConversationId>,
    pub message: String,
    pub topic: Option<String>,
    pub side: Option<Side>,
}

impl TurnRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Default::default() }
    }

    pub fn in_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub conversation_id: ConversationId,
    pub parameters: DebateParameters,
    pub reply: Reply,
    /// Windowed view of the history after this turn.
    pub history: Vec<Turn>,
}
