use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::error::{PolicyGraphError, Upstream, with_timeout};
use crate::graph::{GraphStore, ScoredNode, VectorIndex};


/// Result of searching one index. A failed side is empty and carries a note.
#[derive(Debug, Default)]
pub struct IndexHits {
    pub hits: Vec<ScoredNode>,
    pub note: Option<String>,
    /// False when the side was skipped (`limit == 0`).
    pub queried: bool,
    pub failed: bool,
}

impl IndexHits {
    fn answered(hits: Vec<ScoredNode>) -> Self {
        Self {
            hits,
            note: None,
            queried: true,
            failed: false,
        }
    }
}


pub async fn vector_search_phase(
    store: &dyn GraphStore,
    index: VectorIndex,
    query_embedding: &[f32],
    limit: usize,
    timeout: Duration,
) -> IndexHits {
    if limit == 0 {
        return IndexHits::default();
    }

    let result = with_timeout(
        Upstream::GraphStore,
        timeout,
        store.vector_search(index, query_embedding, limit),
    )
    .await;

    match result {
        Ok(mut hits) => {
            hits.retain(|h| h.node.label() == index.label() && h.node.key().is_resolvable());
            hits.truncate(limit);
            info!("Vector search on {}: {} results", index, hits.len());
            IndexHits::answered(hits)
        }
        Err(PolicyGraphError::EmptyCorpus(_)) => {
            debug!("Index {} holds no vectors", index);
            IndexHits::answered(Vec::new())
        }
        Err(e) => {
            warn!("Vector search on {} failed: {}", index, e);
            IndexHits {
                hits: Vec::new(),
                note: Some(format!("{} search unavailable: {}", index.label(), e)),
                queried: true,
                failed: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraphStore;
    use crate::testing::{FaultyStore, keyword_vector, scenario_store};

    #[tokio::test]
    async fn test_empty_corpus_is_silent() {
        let store = InMemoryGraphStore::new();
        let side = vector_search_phase(&store, VectorIndex::Complaints, &[1.0, 0.0], 3, Duration::from_secs(1)).await;
        assert!(side.hits.is_empty());
        assert!(side.note.is_none());
        assert!(side.queried && !side.failed);
    }

    #[tokio::test]
    async fn test_failure_leaves_a_note() {
        let store = FaultyStore::new(scenario_store()).fail_vector(VectorIndex::Documents);
        let side = vector_search_phase(&store, VectorIndex::Documents, &keyword_vector("청년수당 지급"), 3, Duration::from_secs(1)).await;
        assert!(side.hits.is_empty());
        assert!(side.failed);
        assert!(side.note.unwrap().contains("Document"));
    }

    #[tokio::test]
    async fn test_zero_limit_skips_search() {
        let store = FaultyStore::new(scenario_store()).fail_vector(VectorIndex::Documents);
        let side = vector_search_phase(&store, VectorIndex::Documents, &keyword_vector("청년수당"), 0, Duration::from_secs(1)).await;
        assert!(!side.queried && !side.failed);
        assert!(side.note.is_none());
    }

    #[tokio::test]
    async fn test_limit_respected() {
        let store = scenario_store();
        let side = vector_search_phase(&store, VectorIndex::Documents, &keyword_vector("청년수당 지급"), 2, Duration::from_secs(1)).await;
        assert_eq!(side.hits.len(), 2);
        assert!(side.hits.iter().all(|h| h.node.label() == crate::graph::NodeLabel::Document));
    }
}
