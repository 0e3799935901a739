use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::GenerationProfile;
use crate::utils::error::ConversationError;

use super::context_builder::ContextBuilder;
use super::generation::GenerationGate;
use super::store::ConversationStore;
use super::types::{ConversationId, DebateParameters, Side};

/// Where a conversation's parameters came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSource {
    /// Continuation turn, stored values reused.
    Stored,
    /// Caller supplied topic and/or side.
    Explicit,
    /// Derived from the first message by the classification call.
    Inferred,
    /// Classification failed; defaults were used.
    Fallback { reason: String },
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub parameters: DebateParameters,
    pub source: ParameterSource,
}

/// Map free-form SIDE text to a side: any word equal to `pro` or `for`
/// selects pro, everything else selects con.
pub fn side_from_text(text: &str) -> Side {
    let lowered = text.to_lowercase();
    let is_pro = lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == "pro" || word == "for");

    if is_pro {
        Side::Pro
    } else {
        Side::Con
    }
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    head.eq_ignore_ascii_case(label).then(|| &line[label.len()..])
}

/// Parse a `TOPIC: ...` / `SIDE: ...` classification reply. Each field keeps
/// its default (unset topic, pro) when its line is missing.
pub fn parse_classification(reply: &str) -> DebateParameters {
    let mut parameters = DebateParameters::default();

    for line in reply.lines().map(str::trim) {
        if let Some(rest) = strip_label(line, "TOPIC:") {
            let topic = rest.trim().trim_matches(|c| c == '[' || c == ']' || c == '"').trim();
            parameters.topic = (!topic.is_empty()).then(|| topic.to_string());
        } else if let Some(rest) = strip_label(line, "SIDE:") {
            parameters.side = side_from_text(rest);
        }
    }

    parameters
}

/// Derives or retrieves the (topic, side) pair of a conversation.
pub struct ParameterResolver {
    store: ConversationStore,
    context_builder: Arc<ContextBuilder>,
    gate: Arc<GenerationGate>,
    profile: GenerationProfile,
}

impl ParameterResolver {
    pub fn new(
        store: ConversationStore,
        context_builder: Arc<ContextBuilder>,
        gate: Arc<GenerationGate>,
        profile: GenerationProfile,
    ) -> Self {
        Self {
            store,
            context_builder,
            gate,
            profile,
        }
    }

    /// Continuation turns return the stored pair and ignore every input.
    /// New conversations take explicit values verbatim, or infer them from
    /// the first message; the result is sealed into the store.
    pub async fn resolve(
        &self,
        id: &ConversationId,
        is_new: bool,
        explicit_topic: Option<String>,
        explicit_side: Option<Side>,
        first_message: &str,
    ) -> Result<Resolved, ConversationError> {
        if !is_new {
            return Ok(Resolved {
                parameters: self.store.parameters(id)?,
                source: ParameterSource::Stored,
            });
        }

        let explicit_topic = explicit_topic.filter(|topic| !topic.trim().is_empty());

        let resolved = if explicit_topic.is_some() || explicit_side.is_some() {
            Resolved {
                parameters: DebateParameters::new(explicit_topic, explicit_side.unwrap_or_default()),
                source: ParameterSource::Explicit,
            }
        } else {
            self.infer(first_message).await
        };

        self.store.seal_parameters(id, resolved.parameters.clone())?;
        debug!(
            "Conversation {} parameters: topic={:?}, side={} ({:?})",
            id, resolved.parameters.topic, resolved.parameters.side, resolved.source
        );
        Ok(resolved)
    }

    /// Never fails: any upstream problem yields the defaults.
    async fn infer(&self, first_message: &str) -> Resolved {
        let messages = self.context_builder.build_classification(first_message);

        match self.gate.generate(&messages, &self.profile, 1).await {
            Ok(generated) => Resolved {
                parameters: parse_classification(&generated.text),
                source: ParameterSource::Inferred,
            },
            Err(e) => {
                warn!("Topic/side classification failed, using defaults: {}", e);
                Resolved {
                    parameters: DebateParameters::default(),
                    source: ParameterSource::Fallback { reason: e.to_string() },
                }
            }
        }
    }
}
