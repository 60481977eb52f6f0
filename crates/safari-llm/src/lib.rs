pub mod gemini;
mod http;
pub mod models;
pub mod openai;
pub mod reliable;
pub mod repair;

pub mod mock;

pub use gemini::GeminiReasoner;
pub use mock::{MockReasoner, MockReply};
pub use models::{ModelEntry, ModelInfo, ModelRegistry, ProviderKind};
pub use openai::OpenAiReasoner;
pub use reliable::{ReliableConfig, ReliableReasoner};
