pub mod conversation;
pub mod prompts;
pub mod providers;
pub mod retry;

pub use conversation::{ConversationPipeline, FALLBACK_RESPONSE};
pub use providers::{build_generator, MockProvider, OpenAiClient};
