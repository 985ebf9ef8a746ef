pub mod embeddings;
pub mod factory;
pub mod generator;
pub mod providers;

pub use embeddings::{EmbeddingError, EmbeddingGenerator, EmbeddingProvider};
pub use factory::{EmbeddingProviderFactory, LlmProviderFactory};
pub use generator::AnswerGenerator;
pub use providers::{LlmMetadata, LlmProvider, LlmProviderError};
