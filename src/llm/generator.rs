use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::providers::LlmProvider;
use crate::core::error::{PolicyGraphError, Result, Upstream, with_timeout};


pub const ANSWER_SYSTEM_PROMPT: &str = "당신은 서울시 청년정책 전문가입니다. \
제공된 민원(Complaint)과 공문서(Document) 정보를 바탕으로 답변하세요. \
질문과 관련된 민원 사례가 있다면 언급하고, 그 해결 근거가 되는 공문서와 담당자 정보를 반드시 포함하세요. \
제공된 정보에 없는 내용은 추측하지 마세요.";


pub const HYDE_SYSTEM_PROMPT: &str = "당신은 서울시 청년정책 전문가입니다. \
다음 질문에 대해 공문서에 실릴 법한 간결한 답변을 작성하세요. \
사실 여부보다 관련 용어와 표현을 담는 것이 중요합니다.";


/// Fixed reply when retrieval found nothing close enough to ground an answer.
pub const INSUFFICIENT_EVIDENCE_ANSWER: &str =
    "질문과 충분히 관련된 공문서나 민원 사례를 찾지 못했습니다. 질문을 더 구체적으로 작성해 주세요.";


fn answer_prompt(question: &str, context: &str) -> String {
    format!("[참고 정보]\n{context}\n\n[질문]\n{question}")
}


/// Answer and HyDE drafting on top of an [`LlmProvider`].
pub struct AnswerGenerator {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        info!(
            "AnswerGenerator initialized: {}/{}",
            provider.provider_name(),
            provider.model_name()
        );
        Self { provider, timeout }
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let (text, metadata) = with_timeout(Upstream::Generation, self.timeout, async {
            self.provider
                .generate(system_prompt, user_prompt)
                .await
                .map_err(PolicyGraphError::from)
        })
        .await?;

        debug!(
            "Generation done: provider={}, model={}, fallback={}, tokens={:?}/{:?}",
            metadata.provider, metadata.model, metadata.fallback_used, metadata.tokens_prompt, metadata.tokens_completion
        );

        let text = text.trim();
        if text.is_empty() {
            return Err(PolicyGraphError::Generation("model returned an empty answer".to_string()));
        }
        Ok(text.to_string())
    }


    pub async fn generate(&self, question: &str, context: &str) -> Result<String> {
        self.complete(ANSWER_SYSTEM_PROMPT, &answer_prompt(question, context)).await
    }

    /// Drafts a plausible answer whose embedding stands in for the question's.
    pub async fn hypothetical_document(&self, question: &str) -> Result<String> {
        self.complete(HYDE_SYSTEM_PROMPT, question).await
    }


    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }
}
