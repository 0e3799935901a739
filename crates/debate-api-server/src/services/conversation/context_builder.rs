use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::PromptsConfig;
use crate::models::chat::ChatMessage;

use super::types::{DebateParameters, Turn, TurnRole};

pub const DEFAULT_DEBATE_SYSTEM_PROMPT: &str = r#"You are a friendly academic taking part in a relaxed but rigorous discussion about '{topic}'. For the whole conversation you argue the {side} position and try to win the other person over to it.

Character:
- Speak as someone who has studied the topic closely and reached your position through careful thought
- Stay confident and respectful; invite dialogue rather than confrontation
- Lean on Socratic questions that lead the other person to examine their assumptions

Guidelines:
- Keep to the topic '{topic}' at all times
- Never give up your core position, but acknowledge good points before reframing them
- Prefer collaborative phrasing such as "let's look at this together" over "you're wrong"
- Build on common ground before moving to the harder parts of your case

Consistency:
- Remember the points you already made and build on them from turn to turn
- When pressed on a weak spot, steer back to your strongest arguments

Close every reply with a short summary of your point and a question that keeps the debate going.

Your goal is a sustained, persuasive case for the {side} side of '{topic}', delivered with warmth and curiosity rather than force."#;

pub const DEFAULT_CLASSIFICATION_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that extracts debate topics and positions from messages.";

pub const DEFAULT_CLASSIFICATION_USER_PROMPT: &str = r#"Analyze this message and extract:
1. The debate topic
2. What side the bot should argue (pro/for or con/against)

Message: "{message}"

Respond in this exact format:
TOPIC: [the debate topic]
SIDE: [pro or con]"#;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(topic|side|message)\}").expect("placeholder pattern is valid"));

/// Builds the exact message lists sent to the completion backend.
pub struct ContextBuilder {
    debate_template: String,
    classification_system: String,
    classification_template: String,
}

impl ContextBuilder {
    pub fn new(prompts: &PromptsConfig) -> Self {
        Self {
            debate_template: prompts.debate_system_prompt.clone(),
            classification_system: prompts.classification_system_prompt.clone(),
            classification_template: prompts.classification_user_prompt.clone(),
        }
    }

    /// Substitute `{topic}`, `{side}` and `{message}` in a single pass, so
    /// values containing braces are never expanded again.
    fn render(template: &str, topic: &str, side: &str, message: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match &caps[1] {
                "topic" => topic.to_string(),
                "side" => side.to_string(),
                _ => message.to_string(),
            })
            .into_owned()
    }

    pub fn persona(&self, parameters: &DebateParameters) -> String {
        Self::render(
            &self.debate_template,
            parameters.topic_or_placeholder(),
            parameters.side.as_str(),
            "",
        )
    }

    /// Persona, then every prior turn oldest first, then the new user text.
    /// Nothing is truncated here.
    pub fn build(
        &self,
        parameters: &DebateParameters,
        history: &[Turn],
        new_user_text: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.persona(parameters)));

        messages.extend(history.iter().map(|turn| match turn.role {
            TurnRole::User => ChatMessage::user(turn.text.clone()),
            TurnRole::Assistant => ChatMessage::assistant(turn.text.clone()),
        }));

        messages.push(ChatMessage::user(new_user_text.to_string()));
        messages
    }

    /// Prompt asking the backend for `TOPIC:` / `SIDE:` lines.
    pub fn build_classification(&self, first_message: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.classification_system.clone()),
            ChatMessage::user(Self::render(&self.classification_template, "", "", first_message)),
        ]
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(&PromptsConfig::default())
    }
}
