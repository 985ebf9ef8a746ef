use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};

use super::base::{LlmMetadata, LlmProvider, LlmProviderError};


/// Wraps a primary provider and retries failed generations on a secondary one.
pub struct LlmProviderWithFallback {
    primary: Arc<dyn LlmProvider>,
    fallback: Option<Arc<dyn LlmProvider>>,
    using_fallback: AtomicBool,
    fallback_count: AtomicUsize,
    primary_failures: AtomicUsize,
}

impl LlmProviderWithFallback {

    pub fn new(primary: Arc<dyn LlmProvider>, fallback: Option<Arc<dyn LlmProvider>>) -> Self {
        match &fallback {
            Some(f) => info!(
                "LlmProviderWithFallback initialized: primary={}/{}, fallback={}/{}",
                primary.provider_name(),
                primary.model_name(),
                f.provider_name(),
                f.model_name()
            ),
            None => info!(
                "LlmProviderWithFallback initialized: primary={}/{}, fallback disabled",
                primary.provider_name(),
                primary.model_name()
            ),
        }

        Self {
            primary,
            fallback,
            using_fallback: AtomicBool::new(false),
            fallback_count: AtomicUsize::new(0),
            primary_failures: AtomicUsize::new(0),
        }
    }

    async fn fallback_generate(
        &self,
        fallback: &dyn LlmProvider,
        system_prompt: &str,
        user_prompt: &str,
        original_error: &LlmProviderError,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        warn!(
            "Falling back to {}/{} due to: {}",
            fallback.provider_name(),
            fallback.model_name(),
            original_error
        );

        let (content, mut metadata) = fallback.generate(system_prompt, user_prompt).await?;
        metadata.fallback_used = true;
        metadata.original_error = Some(original_error.to_string());

        self.using_fallback.store(true, Ordering::SeqCst);
        let total = self.fallback_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Fallback successful, total_fallbacks={}", total);

        Ok((content, metadata))
    }


    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::SeqCst)
    }


    pub fn fallback_count(&self) -> usize {
        self.fallback_count.load(Ordering::SeqCst)
    }


    pub fn primary_failures(&self) -> usize {
        self.primary_failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for LlmProviderWithFallback {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<(String, LlmMetadata), LlmProviderError> {
        match self.primary.generate(system_prompt, user_prompt).await {
            Ok(result) => {
                self.using_fallback.store(false, Ordering::SeqCst);
                self.primary_failures.store(0, Ordering::SeqCst);
                Ok(result)
            }
            Err(e) => {
                let failures = self.primary_failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!("Primary LLM provider failed ({}x): {}", failures, e);

                match &self.fallback {
                    Some(fallback) => self.fallback_generate(fallback.as_ref(), system_prompt, user_prompt, &e).await,
                    None => Err(e),
                }
            }
        }
    }

    fn provider_name(&self) -> &str {
        match &self.fallback {
            Some(f) if self.is_using_fallback() => f.provider_name(),
            _ => self.primary.provider_name(),
        }
    }

    fn model_name(&self) -> &str {
        match &self.fallback {
            Some(f) if self.is_using_fallback() => f.model_name(),
            _ => self.primary.model_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingLlm, ScriptedLlm};

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let provider = LlmProviderWithFallback::new(
            Arc::new(ScriptedLlm::new("primary answer")),
            Some(Arc::new(ScriptedLlm::new("fallback answer"))),
        );

        let (text, metadata) = provider.generate("sys", "user").await.unwrap();
        assert_eq!(text, "primary answer");
        assert!(!metadata.fallback_used);
        assert_eq!(provider.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_switches_to_fallback() {
        let provider = LlmProviderWithFallback::new(
            Arc::new(FailingLlm),
            Some(Arc::new(ScriptedLlm::new("fallback answer"))),
        );

        let (text, metadata) = provider.generate("sys", "user").await.unwrap();
        assert_eq!(text, "fallback answer");
        assert!(metadata.fallback_used);
        assert!(metadata.original_error.is_some());
        assert!(provider.is_using_fallback());
        assert_eq!(provider.primary_failures(), 1);
    }

    #[tokio::test]
    async fn test_failure_without_fallback_propagates() {
        let provider = LlmProviderWithFallback::new(Arc::new(FailingLlm), None);
        assert!(provider.generate("sys", "user").await.is_err());
        assert_eq!(provider.fallback_count(), 0);
    }
}
