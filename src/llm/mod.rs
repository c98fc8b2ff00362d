pub mod embeddings;
pub mod provider;
pub mod types;
pub mod zhipu;

pub use embeddings::EmbeddingGateway;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};
pub use zhipu::ZhipuProvider;
