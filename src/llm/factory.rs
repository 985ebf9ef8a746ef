use std::sync::Arc;
use std::time::Duration;

use super::embeddings::{EmbeddingBackend, EmbeddingFallback, EmbeddingGenerator};
use super::providers::{LlmProvider, LlmProviderWithFallback, OllamaProvider, OpenAiProvider};
use crate::core::config::PolicyGraphConfig;
use crate::core::error::{PolicyGraphError, Result};
use crate::{DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_URL};


pub struct LlmProviderFactory;

impl LlmProviderFactory {

    pub fn create(
        provider: &str,
        model: &str,
        api_key: Option<&str>,
        base_url: Option<&str>,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Arc<dyn LlmProvider>> {
        match provider.to_lowercase().as_str() {
            "openai" => Ok(Arc::new(OpenAiProvider::new(
                api_key.map(String::from),
                base_url.unwrap_or(DEFAULT_OPENAI_URL),
                model,
                temperature,
                timeout,
            ))),
            "ollama" => Ok(Arc::new(OllamaProvider::new(
                base_url.unwrap_or(DEFAULT_OLLAMA_URL),
                model,
                temperature,
                timeout,
            ))),
            other => Err(PolicyGraphError::Config(format!(
                "Unknown LLM provider: {other}. Supported: openai, ollama"
            ))),
        }
    }

    /// Primary provider from config, wrapped with the Ollama fallback when enabled.
    pub fn from_config(config: &PolicyGraphConfig) -> Result<Arc<dyn LlmProvider>> {
        let timeout = config.generation_timeout();
        let primary = Self::create(
            &config.llm_provider,
            &config.llm_model,
            config.llm_api_key.as_deref(),
            config.llm_base_url.as_deref(),
            config.llm_temperature,
            timeout,
        )?;

        let fallback: Option<Arc<dyn LlmProvider>> = config.llm_fallback_enabled.then(|| {
            Arc::new(OllamaProvider::new(
                config.llm_fallback_url.clone(),
                config.llm_fallback_model.clone(),
                config.llm_temperature,
                timeout,
            )) as Arc<dyn LlmProvider>
        });

        Ok(Arc::new(LlmProviderWithFallback::new(primary, fallback)))
    }
}


pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {

    pub fn from_config(config: &PolicyGraphConfig) -> Result<EmbeddingGenerator> {
        let backend = EmbeddingBackend::from_name(
            &config.embedding_provider,
            &config.embedding_url,
            config.embedding_api_key.clone(),
        )
        .map_err(|e| PolicyGraphError::Config(e.to_string()))?;

        let fallback = config.embedding_fallback_enabled.then(|| EmbeddingFallback {
            url: config.embedding_fallback_url.clone(),
            model: config.embedding_fallback_model.clone(),
        });

        Ok(EmbeddingGenerator::new(
            backend,
            config.embedding_model.clone(),
            config.embedding_timeout(),
            config.embedding_cache_size,
            config.embedding_cache_ttl_secs,
            fallback,
        ))
    }
}
