use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::db::HelixClientError;
use crate::llm::embeddings::EmbeddingError;
use crate::llm::providers::LlmProviderError;


/// External collaborator a failed call was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Upstream {
    Embedding,
    GraphStore,
    Generation,
}


#[derive(Error, Debug)]
pub enum PolicyGraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream {service} unavailable: {message}")]
    UpstreamUnavailable { service: Upstream, message: String },

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Vector index is empty: {0}")]
    EmptyCorpus(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PolicyGraphError {
    pub fn upstream(service: Upstream, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}

impl From<HelixClientError> for PolicyGraphError {
    fn from(err: HelixClientError) -> Self {
        Self::upstream(Upstream::GraphStore, err.to_string())
    }
}

impl From<EmbeddingError> for PolicyGraphError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::EmptyText => Self::Validation("cannot embed empty text".to_string()),
            other => Self::upstream(Upstream::Embedding, other.to_string()),
        }
    }
}

impl From<LlmProviderError> for PolicyGraphError {
    fn from(err: LlmProviderError) -> Self {
        Self::upstream(Upstream::Generation, err.to_string())
    }
}

impl From<config::ConfigError> for PolicyGraphError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}


pub type Result<T> = std::result::Result<T, PolicyGraphError>;


/// Runs `fut` under a deadline; an elapsed deadline becomes `UpstreamUnavailable`.
pub async fn with_timeout<T, F>(service: Upstream, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(PolicyGraphError::upstream(
            service,
            format!("timed out after {}ms", limit.as_millis()),
        )),
    }
}
