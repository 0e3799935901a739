use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{GenerationProfile, Settings, UnknownIdPolicy};
use crate::logging::{ActivityLog, ActivityLogger, ActivityStatus, ActivityType};
use crate::utils::error::ConversationError;

use super::context_builder::ContextBuilder;
use super::generation::{GenerationGate, LlmProvider};
use super::parameters::{ParameterResolver, ParameterSource};
use super::retention::RetentionPolicy;
use super::store::{ConversationStore, StoreStats};
use super::types::{
    ConversationId, ConversationSnapshot, DebateParameters, Reply, TurnOutcome, TurnRequest,
    TurnRole,
};

/// Leading text of the assistant turn stored when generation fails.
pub const DEGRADED_REPLY_PREFIX: &str =
    "I apologize, but I'm having trouble generating a response right now.";

pub fn degraded_reply_text(reason: &str) -> String {
    format!("{} Error: {}", DEGRADED_REPLY_PREFIX, reason)
}

/// Coordinates store, parameter resolution, context assembly, generation and
/// retention for each incoming turn. The only component with a public
/// request/response contract; both the HTTP handlers and the CLI call it.
pub struct ConversationManager {
    store: ConversationStore,
    resolver: ParameterResolver,
    context_builder: Arc<ContextBuilder>,
    retention: RetentionPolicy,
    gate: Arc<GenerationGate>,
    debate_profile: GenerationProfile,
    max_attempts: u32,
    unknown_id_policy: UnknownIdPolicy,
    max_message_chars: usize,
    logger: ActivityLogger,
}

impl ConversationManager {
    pub fn new(llm_provider: Arc<dyn LlmProvider>, settings: &Settings, logger: ActivityLogger) -> Self {
        let store = ConversationStore::new(Duration::from_secs(settings.conversation.session_ttl_secs));
        let context_builder = Arc::new(ContextBuilder::new(&settings.prompts));
        let gate = Arc::new(GenerationGate::from_config(llm_provider, &settings.llm));

        let resolver = ParameterResolver::new(
            store.clone(),
            context_builder.clone(),
            gate.clone(),
            settings.llm.classification.clone(),
        );

        Self {
            store,
            resolver,
            context_builder,
            retention: RetentionPolicy::new(settings.conversation.history_window),
            gate,
            debate_profile: settings.llm.debate.clone(),
            max_attempts: settings.llm.max_attempts,
            unknown_id_policy: settings.conversation.unknown_id_policy,
            max_message_chars: settings.conversation.max_message_chars,
            logger,
        }
    }

    fn validate(&self, message: &str) -> Result<(), ConversationError> {
        if message.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        if message.chars().count() > self.max_message_chars {
            return Err(ConversationError::MessageTooLong(self.max_message_chars));
        }
        Ok(())
    }

    /// Process one user turn and return the windowed history.
    ///
    /// Turns on the same conversation run one at a time; a concurrent turn
    /// waits for the previous one to finish. Generation failures never
    /// surface as errors, they become a [`Reply::Degraded`] turn.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnOutcome, ConversationError> {
        let start_time = Instant::now();
        self.validate(&request.message)?;

        // Under `Reject` a supplied id is only ever looked up. If it vanishes
        // before the turn lock is taken, the store reports `NotFound` below.
        let (id, is_new) = match (&request.conversation_id, self.unknown_id_policy) {
            (Some(requested), UnknownIdPolicy::Reject) => {
                if !self.store.contains(requested) {
                    return Err(ConversationError::NotFound(requested.clone()));
                }
                (requested.clone(), false)
            }
            (requested, _) => self.store.get_or_create(requested.as_ref()),
        };
        let turn_lock = self.store.turn_lock(&id);
        let _turn = turn_lock.lock().await;

        if is_new {
            if let Some(requested) = &request.conversation_id {
                info!("Unknown conversation {}, starting {} instead", requested, id);
            }
            self.logger.log(
                ActivityLog::builder(id.as_str(), ActivityType::SessionCreated)
                    .status(ActivityStatus::Info)
                    .build(),
            );
        }

        self.logger.log(
            ActivityLog::builder(id.as_str(), ActivityType::RequestReceived)
                .message(request.message.as_str())
                .status(ActivityStatus::Info)
                .build(),
        );

        let resolved = self
            .resolver
            .resolve(&id, is_new, request.topic, request.side, &request.message)
            .await?;
        self.log_resolution(&id, &resolved.parameters, &resolved.source);
        let parameters = resolved.parameters;

        let prior = self.store.history(&id)?;
        self.store.append(&id, TurnRole::User, request.message.as_str())?;

        let messages = self.context_builder.build(&parameters, &prior, &request.message);
        debug!("Conversation {}: sending {} messages to LLM", id, messages.len());

        let reply = match self.gate.generate(&messages, &self.debate_profile, self.max_attempts).await {
            Ok(generated) => {
                self.logger.log(
                    ActivityLog::builder(id.as_str(), ActivityType::MessageSent)
                        .response(generated.text.as_str())
                        .llm_duration(generated.elapsed.as_millis() as u64)
                        .attempts(generated.attempts)
                        .processing_time(start_time.elapsed().as_millis() as u64)
                        .build(),
                );
                Reply::Answered(generated.text)
            }
            Err(e) => {
                warn!("Conversation {}: generation failed, sending degraded reply: {}", id, e);
                self.logger.log(
                    ActivityLog::builder(id.as_str(), ActivityType::LlmError)
                        .error(e.to_string(), e.kind())
                        .attempts(self.max_attempts.max(1))
                        .processing_time(start_time.elapsed().as_millis() as u64)
                        .build(),
                );
                Reply::Degraded { reason: e.to_string() }
            }
        };

        let assistant_text = match &reply {
            Reply::Answered(text) => text.clone(),
            Reply::Degraded { reason } => degraded_reply_text(reason),
        };
        self.store.append(&id, TurnRole::Assistant, assistant_text)?;

        let history = self.store.history(&id)?;
        let window = self.retention.window(&history).to_vec();

        info!(
            "Conversation {} turn done in {}ms ({} stored turns, degraded={})",
            id,
            start_time.elapsed().as_millis(),
            history.len(),
            reply.is_degraded()
        );

        Ok(TurnOutcome {
            conversation_id: id,
            parameters,
            reply,
            history: window,
        })
    }

    fn log_resolution(
        &self,
        id: &ConversationId,
        parameters: &DebateParameters,
        source: &ParameterSource,
    ) {
        let builder = match source {
            ParameterSource::Stored => return,
            ParameterSource::Explicit | ParameterSource::Inferred => {
                ActivityLog::builder(id.as_str(), ActivityType::ParametersResolved)
            }
            ParameterSource::Fallback { reason } => {
                ActivityLog::builder(id.as_str(), ActivityType::ClassificationFallback)
                    .error(reason.as_str(), "classification")
                    .status(ActivityStatus::Warning)
            }
        };

        self.logger.log(
            builder
                .parameters(parameters.topic.as_deref(), parameters.side.as_str())
                .build(),
        );
    }

    /// Full stored history and parameters of one conversation.
    pub fn conversation(&self, id: &ConversationId) -> Result<ConversationSnapshot, ConversationError> {
        self.store.snapshot(id)
    }

    /// Delete a conversation, waiting for any in-flight turn on it first.
    pub async fn delete_conversation(&self, id: &ConversationId) -> Result<(), ConversationError> {
        if !self.store.contains(id) {
            return Err(ConversationError::NotFound(id.clone()));
        }

        let turn_lock = self.store.turn_lock(id);
        let _turn = turn_lock.lock().await;
        self.store.delete(id)?;

        self.logger.log(
            ActivityLog::builder(id.as_str(), ActivityType::SessionDeleted)
                .status(ActivityStatus::Info)
                .build(),
        );
        info!("Conversation {} deleted", id);
        Ok(())
    }

    pub fn cleanup_expired(&self) -> usize {
        let removed = self.store.cleanup_expired();
        for id in &removed {
            self.logger.log(
                ActivityLog::builder(id.as_str(), ActivityType::SessionExpired)
                    .status(ActivityStatus::Info)
                    .build(),
            );
        }
        removed.len()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn history_window(&self) -> usize {
        self.retention.limit_turns()
    }

    pub fn logger(&self) -> &ActivityLogger {
        &self.logger
    }
}
