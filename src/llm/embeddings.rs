use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::cache::{CacheStats, EmbeddingCache};
use crate::llm::providers::base::http_client;


#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty text")]
    EmptyText,

    #[error("Provider not implemented: {0}")]
    NotImplemented(String),

    #[error("Both primary and fallback failed: primary={0}, fallback={1}")]
    BothFailed(String, String),
}


/// Turns text into a fixed-dimension vector. Must match the model that built the indexes.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn model_name(&self) -> &str;
}


#[async_trait]
impl EmbeddingProvider for Arc<dyn EmbeddingProvider> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}


#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}


/// Wire protocol of an embedding endpoint.
#[derive(Debug, Clone)]
pub enum EmbeddingBackend {
    Ollama { url: String },
    OpenAi { base_url: String, api_key: Option<String> },
}

impl EmbeddingBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ollama { .. } => "ollama",
            Self::OpenAi { .. } => "openai",
        }
    }

    /// Parses the configured provider name.
    pub fn from_name(name: &str, url: &str, api_key: Option<String>) -> Result<Self, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama {
                url: url.trim_end_matches('/').to_string(),
            }),
            "openai" => Ok(Self::OpenAi {
                base_url: url.trim_end_matches('/').to_string(),
                api_key,
            }),
            other => Err(EmbeddingError::NotImplemented(other.to_string())),
        }
    }
}


/// Local Ollama model used when the primary endpoint is down.
#[derive(Debug, Clone)]
pub struct EmbeddingFallback {
    pub url: String,
    pub model: String,
}


/// HTTP embedding client with an LRU cache and optional Ollama fallback.
pub struct EmbeddingGenerator {
    backend: EmbeddingBackend,
    model: String,
    client: Client,
    cache: EmbeddingCache,
    fallback: Option<EmbeddingFallback>,
    using_fallback: AtomicBool,
    fallback_count: AtomicUsize,
}

impl EmbeddingGenerator {

    pub fn new(
        backend: EmbeddingBackend,
        model: impl Into<String>,
        timeout: Duration,
        cache_size: usize,
        cache_ttl_secs: u64,
        fallback: Option<EmbeddingFallback>,
    ) -> Self {
        let model = model.into();

        info!(
            "EmbeddingGenerator initialized: provider={}, model={}, cache={}, fallback={}",
            backend.name(),
            model,
            cache_size,
            fallback.as_ref().map(|f| f.model.as_str()).unwrap_or("none")
        );

        Self {
            backend,
            model,
            client: http_client(timeout),
            cache: EmbeddingCache::new(cache_size, cache_ttl_secs),
            fallback,
            using_fallback: AtomicBool::new(false),
            fallback_count: AtomicUsize::new(0),
        }
    }


    pub async fn generate(&self, text: &str, use_cache: bool) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        let key = EmbeddingCache::key(&self.model, text);
        if use_cache {
            if let Some(cached) = self.cache.get(&key) {
                debug!("Cache HIT for: {}...", crate::safe_truncate(text, 50));
                return Ok(cached);
            }
        }

        let result = match &self.backend {
            EmbeddingBackend::Ollama { url } => self.request_ollama(url, &self.model, text).await,
            EmbeddingBackend::OpenAi { base_url, api_key } => {
                self.request_openai(base_url, api_key.as_deref(), text).await
            }
        };

        let embedding = match result {
            Ok(embedding) => {
                self.using_fallback.store(false, Ordering::SeqCst);
                embedding
            }
            Err(e) => match &self.fallback {
                Some(fallback) => self.fallback_generate(fallback, text, &e).await?,
                None => return Err(e),
            },
        };

        if embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse("empty embedding".to_string()));
        }
        if use_cache {
            self.cache.set(key, embedding.clone());
        }
        Ok(embedding)
    }

    async fn request_ollama(&self, url: &str, model: &str, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", url))
            .json(&OllamaEmbeddingRequest { model, prompt: text })
            .send()
            .await?
            .error_for_status()?
            .json::<OllamaEmbeddingResponse>()
            .await?;

        Ok(response.embedding)
    }

    async fn request_openai(&self, base_url: &str, api_key: Option<&str>, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let api_key = api_key.ok_or_else(|| EmbeddingError::InvalidResponse("API key required".to_string()))?;

        let response = self
            .client
            .post(format!("{}/embeddings", base_url))
            .bearer_auth(api_key)
            .json(&OpenAiEmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<OpenAiEmbeddingResponse>()
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))
    }

    async fn fallback_generate(
        &self,
        fallback: &EmbeddingFallback,
        text: &str,
        original_error: &EmbeddingError,
    ) -> Result<Vec<f32>, EmbeddingError> {
        warn!(
            "Primary embedding provider failed ({}), using fallback {}/{}",
            original_error, fallback.url, fallback.model
        );

        let embedding = self
            .request_ollama(fallback.url.trim_end_matches('/'), &fallback.model, text)
            .await
            .map_err(|e| EmbeddingError::BothFailed(original_error.to_string(), e.to_string()))?;

        self.using_fallback.store(true, Ordering::SeqCst);
        let total = self.fallback_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Fallback successful, dims={}, total_fallbacks={}", embedding.len(), total);

        Ok(embedding)
    }


    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::SeqCst)
    }


    pub fn fallback_count(&self) -> usize {
        self.fallback_count.load(Ordering::SeqCst)
    }


    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }


    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Embedding cache cleared");
    }


    pub fn provider(&self) -> &str {
        self.backend.name()
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingGenerator {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.generate(text, true).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_generator(fallback: Option<EmbeddingFallback>) -> EmbeddingGenerator {
        EmbeddingGenerator::new(
            EmbeddingBackend::Ollama {
                url: "http://127.0.0.1:9".to_string(),
            },
            "nomic-embed-text",
            Duration::from_millis(200),
            16,
            60,
            fallback,
        )
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let generator = unreachable_generator(None);
        let err = generator.embed("   ").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyText));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let generator = unreachable_generator(None);
        let err = generator.embed("청년수당").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Http(_)));
        assert!(!generator.is_using_fallback());
    }

    #[tokio::test]
    async fn test_both_failed_when_fallback_unreachable() {
        let generator = unreachable_generator(Some(EmbeddingFallback {
            url: "http://127.0.0.1:9".to_string(),
            model: "nomic-embed-text".to_string(),
        }));
        let err = generator.embed("청년수당").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::BothFailed(_, _)));
        assert_eq!(generator.fallback_count(), 0);
    }

    #[test]
    fn test_backend_from_name() {
        let backend = EmbeddingBackend::from_name("OpenAI", "https://api.openai.com/v1/", Some("k".into())).unwrap();
        match backend {
            EmbeddingBackend::OpenAi { base_url, .. } => assert_eq!(base_url, "https://api.openai.com/v1"),
            other => panic!("unexpected backend {:?}", other),
        }
        assert!(matches!(
            EmbeddingBackend::from_name("cohere", "", None),
            Err(EmbeddingError::NotImplemented(_))
        ));
    }
}
