use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::services::conversation::context_builder::{
    DEFAULT_CLASSIFICATION_SYSTEM_PROMPT, DEFAULT_CLASSIFICATION_USER_PROMPT,
    DEFAULT_DEBATE_SYSTEM_PROMPT,
};

/// Environment variable holding the upstream credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("missing required credential: {0}")]
    MissingCredential(&'static str),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub max_concurrent_requests: usize,
    pub acquire_timeout_ms: u64,
    pub debate: GenerationProfile,
    pub classification: GenerationProfile,
}

impl LlmConfig {
    /// Longest a single turn can spend upstream: one classification call
    /// plus every debate attempt, each waiting for a slot and timing out,
    /// with the linear backoff between attempts.
    pub fn worst_case_turn(&self) -> Duration {
        let attempts = u64::from(self.max_attempts.max(1));
        let per_call = Duration::from_secs(self.timeout_seconds)
            + Duration::from_millis(self.acquire_timeout_ms);
        let backoff = Duration::from_millis(self.retry_backoff_ms * attempts * (attempts - 1) / 2);

        per_call * (attempts as u32 + 1) + backoff
    }
}

/// Sampling parameters sent with one kind of completion call.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GenerationProfile {
    pub temperature: f32,
    pub max_tokens: usize,
    #[serde(default)]
    pub presence_penalty: Option<f32>,
    #[serde(default)]
    pub frequency_penalty: Option<f32>,
}

impl GenerationProfile {
    pub fn debate() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 500,
            presence_penalty: Some(0.6),
            frequency_penalty: Some(0.3),
        }
    }

    pub fn classification() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 100,
            presence_penalty: None,
            frequency_penalty: None,
        }
    }
}

/// What to do when a caller names a conversation the store does not know.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownIdPolicy {
    /// Fail the turn with a not-found error.
    #[default]
    Reject,
    /// Open a fresh conversation under a newly minted identifier.
    StartNew,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversationConfig {
    /// Number of most recent turns returned to callers.
    pub history_window: usize,
    /// Idle time after which a conversation is forgotten.
    pub session_ttl_secs: u64,
    /// Period of the background expiry sweep, 0 disables it.
    pub cleanup_interval_secs: u64,
    pub unknown_id_policy: UnknownIdPolicy,
    pub max_message_chars: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            session_ttl_secs: 6 * 60 * 60,
            cleanup_interval_secs: 300,
            unknown_id_policy: UnknownIdPolicy::Reject,
            max_message_chars: 8_000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PromptsConfig {
    pub debate_system_prompt: String,
    pub classification_system_prompt: String,
    pub classification_user_prompt: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            debate_system_prompt: DEFAULT_DEBATE_SYSTEM_PROMPT.to_string(),
            classification_system_prompt: DEFAULT_CLASSIFICATION_SYSTEM_PROMPT.to_string(),
            classification_user_prompt: DEFAULT_CLASSIFICATION_USER_PROMPT.to_string(),
        }
    }
}

impl Settings {
    /// Load `.env`, `config/settings.toml` and `APP__*` variables, then
    /// require the upstream credential.
    pub fn load() -> Result<Self, ConfigurationError> {
        dotenvy::dotenv().ok();

        let config = Self::defaults()?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        settings.llm.api_key =
            resolve_credential(&settings.llm.api_key, std::env::var(API_KEY_ENV).ok())?;
        Ok(settings)
    }

    /// Idle expiry must outlast the slowest possible turn.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let ttl = Duration::from_secs(self.conversation.session_ttl_secs);
        let worst_case = self.llm.worst_case_turn();
        if ttl <= worst_case {
            return Err(ConfigurationError::Invalid(format!(
                "conversation.session_ttl_secs ({}s) must exceed the longest possible turn ({:?})",
                self.conversation.session_ttl_secs, worst_case
            )));
        }
        Ok(())
    }

    /// Built-in defaults overlaid with a TOML document. No environment and
    /// no credential check.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigurationError> {
        let config = Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        let conversation = ConversationConfig::default();
        let debate = GenerationProfile::debate();
        let classification = GenerationProfile::classification();

        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("llm.base_url", "https://api.openai.com")?
            .set_default("llm.model", "gpt-3.5-turbo")?
            .set_default("llm.timeout_seconds", 30)?
            .set_default("llm.max_attempts", 1)?
            .set_default("llm.retry_backoff_ms", 1000)?
            .set_default("llm.max_concurrent_requests", 16)?
            .set_default("llm.acquire_timeout_ms", 5000)?
            .set_default("llm.debate.temperature", f64::from(debate.temperature))?
            .set_default("llm.debate.max_tokens", debate.max_tokens as u64)?
            .set_default(
                "llm.debate.presence_penalty",
                debate.presence_penalty.map(f64::from),
            )?
            .set_default(
                "llm.debate.frequency_penalty",
                debate.frequency_penalty.map(f64::from),
            )?
            .set_default(
                "llm.classification.temperature",
                f64::from(classification.temperature),
            )?
            .set_default(
                "llm.classification.max_tokens",
                classification.max_tokens as u64,
            )?
            .set_default(
                "conversation.history_window",
                conversation.history_window as u64,
            )?
            .set_default("conversation.session_ttl_secs", conversation.session_ttl_secs)?
            .set_default(
                "conversation.cleanup_interval_secs",
                conversation.cleanup_interval_secs,
            )?
            .set_default("conversation.unknown_id_policy", "reject")?
            .set_default(
                "conversation.max_message_chars",
                conversation.max_message_chars as u64,
            )
    }
}

/// Prefer an explicitly configured key, fall back to the environment.
pub fn resolve_credential(
    configured: &str,
    from_env: Option<String>,
) -> Result<String, ConfigurationError> {
    if !configured.trim().is_empty() {
        return Ok(configured.trim().to_string());
    }

    from_env
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or(ConfigurationError::MissingCredential(API_KEY_ENV))
}
