use serde::{Deserialize, Serialize};

/// Activity type categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    RequestReceived,    // Log initial payload
    MessageSent,        // Log final completion
    SessionCreated,
    ParametersResolved,
    ClassificationFallback,
    LlmError,
    SessionDeleted,
    SessionExpired,
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::RequestReceived => "request_received",
            Self::MessageSent => "message_sent",
            Self::SessionCreated => "session_created",
            Self::ParametersResolved => "parameters_resolved",
            Self::ClassificationFallback => "classification_fallback",
            Self::LlmError => "llm_error",
            Self::SessionDeleted => "session_deleted",
            Self::SessionExpired => "session_expired",
        }
    }
}

/// Activity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Success,
    Error,
    Warning,
    Info, // For "RequestReceived"
}

impl ActivityStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// Complete activity log entry
#[derive(Debug, Clone)]
pub struct ActivityLog {
    pub conversation_id: String,

    // Activity
    pub activity_type: ActivityType,
    pub activity_status: ActivityStatus,

    // Context
    pub message_content: Option<String>,
    pub response_content: Option<String>,
    pub topic: Option<String>,
    pub side: Option<String>,

    // Performance
    pub processing_time_ms: Option<u64>,
    pub llm_call_duration_ms: Option<u64>,
    pub attempts: Option<u32>,

    // Error
    pub error_message: Option<String>,
    pub error_type: Option<String>,
}

impl ActivityLog {
    /// Create builder for fluent API
    pub fn builder(conversation_id: impl Into<String>, activity_type: ActivityType) -> ActivityLogBuilder {
        ActivityLogBuilder::new(conversation_id.into(), activity_type)
    }
}

/// Builder pattern for ActivityLog
pub struct ActivityLogBuilder {
    log: ActivityLog,
}

impl ActivityLogBuilder {
    pub fn new(conversation_id: String, activity_type: ActivityType) -> Self {
        Self {
            log: ActivityLog {
                conversation_id,
                activity_type,
                activity_status: ActivityStatus::Success,
                message_content: None,
                response_content: None,
                topic: None,
                side: None,
                processing_time_ms: None,
                llm_call_duration_ms: None,
                attempts: None,
                error_message: None,
                error_type: None,
            },
        }
    }

    pub fn status(mut self, status: ActivityStatus) -> Self {
        self.log.activity_status = status;
        self
    }

    pub fn message(mut self, content: impl Into<String>) -> Self {
        self.log.message_content = Some(content.into());
        self
    }

    pub fn response(mut self, content: impl Into<String>) -> Self {
        self.log.response_content = Some(content.into());
        self
    }

    pub fn parameters(mut self, topic: Option<&str>, side: impl Into<String>) -> Self {
        self.log.topic = topic.map(str::to_string);
        self.log.side = Some(side.into());
        self
    }

    pub fn processing_time(mut self, ms: u64) -> Self {
        self.log.processing_time_ms = Some(ms);
        self
    }

    pub fn llm_duration(mut self, ms: u64) -> Self {
        self.log.llm_call_duration_ms = Some(ms);
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.log.attempts = Some(attempts);
        self
    }

    pub fn error(mut self, message: impl Into<String>, error_type: impl Into<String>) -> Self {
        self.log.error_message = Some(message.into());
        self.log.error_type = Some(error_type.into());
        self.log.activity_status = ActivityStatus::Error;
        self
    }

    pub fn build(self) -> ActivityLog {
        self.log
    }
}
