use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::config::RetrievalConfig;
use super::models::Retrieval;
use super::phases::{graph_expansion_phase, merge_hits, vector_search_phase};
use crate::core::error::{PolicyGraphError, Result, Upstream, with_timeout};
use crate::graph::{GraphStore, VectorIndex};
use crate::llm::embeddings::EmbeddingProvider;


/// Vector search over both indexes followed by fixed-depth graph expansion.
/// Read-only: nothing here mutates the store.
pub struct HybridRetriever {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_timeout: Duration,
}

impl HybridRetriever {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn EmbeddingProvider>, embedding_timeout: Duration) -> Self {
        info!(
            "HybridRetriever initialized: store={}, embedding_model={}",
            store.backend_name(),
            embedder.model_name()
        );
        Self {
            store,
            embedder,
            embedding_timeout,
        }
    }

    /// Embeds `text`. Any failure here aborts the request.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(PolicyGraphError::Validation("question must not be empty".to_string()));
        }
        with_timeout(Upstream::Embedding, self.embedding_timeout, async {
            self.embedder.embed(text).await.map_err(PolicyGraphError::from)
        })
        .await
    }

    /// Retrieves and expands evidence for `query_text`, which is the question itself
    /// or a hypothetical answer standing in for it.
    pub async fn retrieve(&self, query_text: &str, config: &RetrievalConfig) -> Result<Retrieval> {
        let start = Instant::now();
        let embedding = self.embed(query_text).await?;
        let retrieval = self.retrieve_with_embedding(&embedding, config).await?;

        info!(
            "Retrieval done in {:.1}ms: {} hits, coverage={}",
            start.elapsed().as_secs_f64() * 1000.0,
            retrieval.hits.len(),
            retrieval.coverage()
        );
        Ok(retrieval)
    }


    /// Fails only when every index that was searched is unreachable; one lost side
    /// degrades coverage instead.
    pub async fn retrieve_with_embedding(&self, embedding: &[f32], config: &RetrievalConfig) -> Result<Retrieval> {
        let store = self.store.as_ref();

        let (documents, complaints) = tokio::join!(
            vector_search_phase(store, VectorIndex::Documents, embedding, config.document_top_k, config.store_timeout),
            vector_search_phase(store, VectorIndex::Complaints, embedding, config.complaint_top_k, config.store_timeout),
        );

        let sides = [&documents, &complaints];
        let searched = sides.iter().filter(|s| s.queried).count();
        if searched > 0 && sides.iter().filter(|s| s.queried).all(|s| s.failed) {
            let reasons: Vec<&str> = sides.iter().filter_map(|s| s.note.as_deref()).collect();
            return Err(PolicyGraphError::upstream(Upstream::GraphStore, reasons.join("; ")));
        }

        let mut notes: Vec<String> = documents.note.into_iter().chain(complaints.note).collect();

        let hits = merge_hits(documents.hits, complaints.hits, config.min_hit_score);
        debug!("Hits above {:.2}: {}", config.min_hit_score, hits.len());

        let (hits, expansion_notes) = graph_expansion_phase(store, hits, config.store_timeout).await;
        notes.extend(expansion_notes);

        Ok(Retrieval { hits, notes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKey, VectorIndex};
    use crate::retrieval::models::{Coverage, Expansion, SourceType};
    use crate::testing::{FailingEmbedder, FaultyStore, KeywordEmbedder, SCENARIO_QUERY, scenario_store};

    fn retriever(store: Arc<dyn GraphStore>) -> HybridRetriever {
        HybridRetriever::new(store, Arc::new(KeywordEmbedder), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_scenario_surfaces_complaint_and_linked_document() {
        let retriever = retriever(Arc::new(scenario_store()));
        let retrieval = retriever.retrieve(SCENARIO_QUERY, &RetrievalConfig::default()).await.unwrap();

        assert_eq!(retrieval.coverage(), Coverage::Full);
        let complaint = retrieval
            .hits
            .iter()
            .find(|h| h.hit.key == NodeKey::complaint("C-1"))
            .expect("complaint hit");
        assert_eq!(complaint.hit.source, SourceType::Complaint);
        match &complaint.expansion {
            Expansion::Complaint(linked) => {
                assert_eq!(linked[0].key, NodeKey::document("D-100"));
                assert_eq!(linked[0].facts.author.as_deref(), Some("김OO"));
            }
            other => panic!("unexpected expansion {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hits_unique_and_present_in_graph() {
        let store = Arc::new(scenario_store());
        let retriever = retriever(store.clone());
        let config = RetrievalConfig {
            min_hit_score: 0.0,
            ..RetrievalConfig::default()
        };
        let retrieval = retriever.retrieve(SCENARIO_QUERY, &config).await.unwrap();

        let mut seen = std::collections::HashSet::new();
        for expanded in &retrieval.hits {
            assert!(seen.insert(expanded.hit.key.clone()));
            assert!(store.get_node(&expanded.hit.key).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_unrelated_question_has_no_hits() {
        let retriever = retriever(Arc::new(scenario_store()));
        let retrieval = retriever.retrieve("오늘 날씨 어때요", &RetrievalConfig::default()).await.unwrap();
        assert!(retrieval.is_empty());
    }

    #[tokio::test]
    async fn test_one_index_down_is_partial() {
        let store = FaultyStore::new(scenario_store()).fail_vector(VectorIndex::Documents);
        let retriever = retriever(Arc::new(store));
        let retrieval = retriever.retrieve(SCENARIO_QUERY, &RetrievalConfig::default()).await.unwrap();

        assert_eq!(retrieval.coverage(), Coverage::Partial);
        assert!(retrieval.hits.iter().all(|h| h.hit.source == SourceType::Complaint));
        assert!(!retrieval.hits.is_empty());
    }

    #[tokio::test]
    async fn test_both_indexes_down_is_an_error() {
        let store = FaultyStore::new(scenario_store())
            .fail_vector(VectorIndex::Documents)
            .fail_vector(VectorIndex::Complaints);
        let retriever = retriever(Arc::new(store));
        let err = retriever.retrieve(SCENARIO_QUERY, &RetrievalConfig::default()).await.unwrap_err();
        assert!(matches!(
            err,
            PolicyGraphError::UpstreamUnavailable {
                service: Upstream::GraphStore,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_skipped_side_does_not_mask_outage() {
        let store = FaultyStore::new(scenario_store()).fail_vector(VectorIndex::Documents);
        let retriever = retriever(Arc::new(store));
        let config = RetrievalConfig {
            complaint_top_k: 0,
            ..RetrievalConfig::default()
        };
        assert!(retriever.retrieve(SCENARIO_QUERY, &config).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_corpus_is_not_an_outage() {
        let retriever = retriever(Arc::new(crate::graph::InMemoryGraphStore::new()));
        let retrieval = retriever.retrieve(SCENARIO_QUERY, &RetrievalConfig::default()).await.unwrap();
        assert!(retrieval.is_empty());
        assert_eq!(retrieval.coverage(), Coverage::Full);
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts() {
        let retriever = HybridRetriever::new(Arc::new(scenario_store()), Arc::new(FailingEmbedder), Duration::from_secs(1));
        let err = retriever.retrieve(SCENARIO_QUERY, &RetrievalConfig::default()).await.unwrap_err();
        assert!(matches!(
            err,
            PolicyGraphError::UpstreamUnavailable {
                service: Upstream::Embedding,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let retriever = retriever(Arc::new(scenario_store()));
        let err = retriever.retrieve("  ", &RetrievalConfig::default()).await.unwrap_err();
        assert!(matches!(err, PolicyGraphError::Validation(_)));
    }
}
