pub mod settings;

pub use settings::{
    ConfigurationError, ConversationConfig, GenerationProfile, LlmConfig, PromptsConfig,
    ServerConfig, Settings, UnknownIdPolicy,
};
