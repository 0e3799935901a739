use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::utils::error::ConversationError;

use super::types::{
    ConversationId, ConversationSnapshot, ConversationState, DebateParameters, Turn, TurnRole,
};

/// Thread-safe in-memory conversation store.
///
/// Owns every turn mutation. Map guards are released before returning, so no
/// caller ever holds a store lock across an `.await`. Turns on the same
/// conversation are serialized by the caller through [`turn_lock`].
///
/// [`turn_lock`]: ConversationStore::turn_lock
#[derive(Clone)]
pub struct ConversationStore {
    /// conversation_id -> ConversationState
    storage: Arc<DashMap<ConversationId, ConversationState>>,

    /// conversation_id -> per-conversation turn guard
    turn_locks: Arc<DashMap<ConversationId, Arc<Mutex<()>>>>,

    /// Idle time after which a conversation counts as gone
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(ttl: Duration) -> Self {
        info!("Initializing conversation store (idle ttl: {:?})", ttl);
        Self {
            storage: Arc::new(DashMap::new()),
            turn_locks: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// A turn holds the conversation's guard. Such a conversation never
    /// expires, however long generation takes.
    fn turn_in_progress(&self, id: &ConversationId) -> bool {
        self.turn_locks
            .get(id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Run `f` on a live conversation, evicting it first if it went idle.
    fn with_live<T>(
        &self,
        id: &ConversationId,
        f: impl FnOnce(&mut ConversationState) -> T,
    ) -> Result<T, ConversationError> {
        // Checked before touching `storage`; no guard of one map is held
        // while the other is locked.
        let busy = self.turn_in_progress(id);

        match self.storage.get_mut(id) {
            Some(mut entry) if busy || !entry.is_expired(self.ttl) => {
                entry.touch();
                return Ok(f(entry.value_mut()));
            }
            Some(_) => {}
            None => return Err(ConversationError::NotFound(id.clone())),
        }

        // Guard released above; removing now cannot deadlock the shard.
        self.evict(id);
        debug!("Conversation {} expired, removed from store", id);
        Err(ConversationError::NotFound(id.clone()))
    }

    fn evict(&self, id: &ConversationId) -> Option<ConversationState> {
        self.turn_locks.remove(id);
        self.storage.remove(id).map(|(_, state)| state)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.with_live(id, |_| ()).is_ok()
    }

    /// Return the live conversation named by `id`, or allocate a new one with
    /// a freshly minted identifier when `id` is unset, unknown or expired.
    pub fn get_or_create(&self, id: Option<&ConversationId>) -> (ConversationId, bool) {
        if let Some(id) = id {
            if self.contains(id) {
                return (id.clone(), false);
            }
        }

        let id = ConversationId::generate();
        self.storage.insert(id.clone(), ConversationState::new(id.clone()));
        debug!("Created conversation {}", id);
        (id, true)
    }

    pub fn append(
        &self,
        id: &ConversationId,
        role: TurnRole,
        text: impl Into<String>,
    ) -> Result<(), ConversationError> {
        let text = text.into();
        self.with_live(id, |state| state.turns.push(Turn { role, text }))
    }

    /// Full history, oldest first.
    pub fn history(&self, id: &ConversationId) -> Result<Vec<Turn>, ConversationError> {
        self.with_live(id, |state| state.turns.clone())
    }

    pub fn parameters(&self, id: &ConversationId) -> Result<DebateParameters, ConversationError> {
        self.with_live(id, |state| state.parameters.clone().unwrap_or_default())
    }

    /// Record the debate parameters. Succeeds once per conversation.
    pub fn seal_parameters(
        &self,
        id: &ConversationId,
        parameters: DebateParameters,
    ) -> Result<(), ConversationError> {
        self.with_live(id, |state| {
            if state.parameters.is_some() {
                return Err(ConversationError::ParametersAlreadyResolved(id.clone()));
            }
            state.parameters = Some(parameters);
            Ok(())
        })?
    }

    pub fn snapshot(&self, id: &ConversationId) -> Result<ConversationSnapshot, ConversationError> {
        self.with_live(id, |state| ConversationSnapshot {
            id: state.id.clone(),
            parameters: state.parameters.clone().unwrap_or_default(),
            turns: state.turns.clone(),
            created_at: state.created_at,
        })
    }

    pub fn delete(&self, id: &ConversationId) -> Result<(), ConversationError> {
        self.contains(id)
            .then(|| self.evict(id))
            .flatten()
            .map(|_| ())
            .ok_or_else(|| ConversationError::NotFound(id.clone()))
    }

    /// Guard serializing turns on one conversation. Independent conversations
    /// get independent guards.
    pub fn turn_lock(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        self.turn_locks.entry(id.clone()).or_default().clone()
    }

    /// Drop idle conversations and orphaned turn guards. Conversations with
    /// a turn in progress are kept. Returns the identifiers removed.
    pub fn cleanup_expired(&self) -> Vec<ConversationId> {
        let busy: HashSet<ConversationId> = self
            .turn_locks
            .iter()
            .filter(|entry| entry.value().try_lock().is_err())
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = Vec::new();
        self.storage.retain(|id, state| {
            let expired = state.is_expired(self.ttl) && !busy.contains(id);
            if expired {
                removed.push(id.clone());
            }
            !expired
        });

        let live: HashSet<ConversationId> =
            self.storage.iter().map(|entry| entry.key().clone()).collect();
        // A guard still cloned out belongs to a turn that is queued or running.
        self.turn_locks
            .retain(|id, lock| live.contains(id) || Arc::strong_count(lock) > 1);

        if !removed.is_empty() {
            info!("Cleaned up {} expired conversations", removed.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            active_conversations: self.storage.len(),
            total_turns: self.storage.iter().map(|entry| entry.turns.len()).sum(),
        }
    }
}

/// Store statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub active_conversations: usize,
    pub total_turns: usize,
}
