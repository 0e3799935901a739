use flume::{bounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use super::types::{ActivityLog, ActivityStatus};

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Queue capacity (max logs in memory before entries are dropped)
    pub queue_capacity: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
        }
    }
}

/// Async activity logger with queue mechanism.
///
/// Requests enqueue entries without waiting; a single worker task drains the
/// queue and emits each entry as a structured `tracing` event on the
/// `activity` target.
#[derive(Clone)]
pub struct ActivityLogger {
    sender: Sender<ActivityLog>,
}

impl ActivityLogger {
    /// Initialize logger with its background worker. Must be called inside a
    /// tokio runtime.
    pub fn new(config: LoggerConfig) -> Self {
        let (logger, receiver) = Self::detached(config.queue_capacity);

        info!("Initializing ActivityLogger: queue={}", config.queue_capacity);

        tokio::spawn(async move {
            Self::worker_loop(receiver).await;
        });

        logger
    }

    /// Logger without a worker; the caller owns the receiving end.
    pub fn detached(capacity: usize) -> (Self, Receiver<ActivityLog>) {
        let (sender, receiver) = bounded(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Log activity (non-blocking, fire-and-forget)
    pub fn log(&self, activity: ActivityLog) {
        if let Err(e) = self.sender.try_send(activity) {
            warn!("Failed to enqueue activity log (queue full?): {}", e);
        }
    }

    async fn worker_loop(receiver: Receiver<ActivityLog>) {
        debug!("Activity logger worker started");

        while let Ok(log) = receiver.recv_async().await {
            Self::emit(&log);
        }

        info!("Activity logger worker shutting down (channel closed)");
    }

    fn emit(log: &ActivityLog) {
        let activity = log.activity_type.as_str();
        let status = log.activity_status.as_str();

        match log.activity_status {
            ActivityStatus::Error => error!(
                target: "activity",
                conversation_id = %log.conversation_id,
                activity,
                status,
                error_type = log.error_type.as_deref(),
                error = log.error_message.as_deref(),
                attempts = log.attempts,
                llm_ms = log.llm_call_duration_ms,
            ),
            ActivityStatus::Warning => warn!(
                target: "activity",
                conversation_id = %log.conversation_id,
                activity,
                status,
                error = log.error_message.as_deref(),
                topic = log.topic.as_deref(),
                side = log.side.as_deref(),
            ),
            _ => info!(
                target: "activity",
                conversation_id = %log.conversation_id,
                activity,
                status,
                topic = log.topic.as_deref(),
                side = log.side.as_deref(),
                message_len = log.message_content.as_ref().map(|m| m.len()),
                response_len = log.response_content.as_ref().map(|r| r.len()),
                processing_ms = log.processing_time_ms,
                llm_ms = log.llm_call_duration_ms,
                attempts = log.attempts,
            ),
        }
    }

    /// Entries waiting for the worker (for monitoring)
    pub fn queue_len(&self) -> usize {
        self.sender.len()
    }
}
