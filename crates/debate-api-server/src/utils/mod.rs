pub mod error;
pub mod limiters;

pub use error::{ApiError, ConversationError, GenerationError};
pub use limiters::Limiters;
