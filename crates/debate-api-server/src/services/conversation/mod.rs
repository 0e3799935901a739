//! Debate conversation management
//!
//! In-memory multi-turn debate sessions:
//! - Thread-safe store (DashMap) with per-conversation turn guards
//! - Topic/side resolution, explicit or inferred from the first message
//! - Persona prompt and context assembly
//! - Guarded upstream generation with degraded replies on failure
//! - Windowed history views

pub mod context_builder;
pub mod generation;
pub mod manager;
pub mod parameters;
pub mod retention;
pub mod store;
pub mod types;

pub use context_builder::ContextBuilder;
pub use generation::{GenerationGate, LlmProvider};
pub use manager::{ConversationManager, DEGRADED_REPLY_PREFIX};
pub use parameters::{ParameterResolver, ParameterSource};
pub use retention::RetentionPolicy;
pub use store::{ConversationStore, StoreStats};
pub use types::{
    ConversationId, ConversationSnapshot, DebateParameters, Reply, Side, Turn, TurnOutcome,
    TurnRequest, TurnRole,
};
