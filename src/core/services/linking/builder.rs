use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::events::{LinkCreatedEvent, LinkReport, LinkerEvent, LinkingCompleteEvent};
use crate::core::error::{PolicyGraphError, Result, Upstream, with_timeout};
use crate::graph::{Complaint, Direction, GraphStore, NodeKey, NodeLabel, RelationType, ScoredEdge, ScoredNode, VectorIndex};
use crate::llm::embeddings::EmbeddingProvider;


#[derive(Debug, Clone, PartialEq)]
enum ComplaintOutcome {
    Linked(usize),
    Skipped(String),
}


/// Keeps the first `top_k` candidates by score; equal scores keep input order.
pub fn select_candidates(mut candidates: Vec<ScoredNode>, top_k: usize, min_score: Option<f64>) -> Vec<ScoredNode> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(top_k);
    if let Some(min) = min_score {
        candidates.retain(|c| c.score >= min);
    }
    candidates
}


/// Materializes RELATED_TO edges from each Complaint to its most similar Documents.
///
/// Runs as a batch over every Complaint. For each one the existing RELATED_TO edges
/// are removed before the new ones are written, so repeated runs converge on the
/// same edge set. Other relationships are never touched. Callers serialize runs.
pub struct SimilarityLinker {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    min_score: Option<f64>,
    embedding_timeout: Duration,
    store_timeout: Duration,
    event_tx: Option<tokio::sync::mpsc::Sender<LinkerEvent>>,
}

impl SimilarityLinker {

    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn EmbeddingProvider>, top_k: usize) -> Self {
        info!("SimilarityLinker initialized: top_k={}", top_k);

        Self {
            store,
            embedder,
            top_k,
            min_score: None,
            embedding_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(10),
            event_tx: None,
        }
    }


    pub fn with_min_score(mut self, min_score: Option<f64>) -> Self {
        self.min_score = min_score;
        self
    }


    pub fn with_timeouts(mut self, embedding: Duration, store: Duration) -> Self {
        self.embedding_timeout = embedding;
        self.store_timeout = store;
        self
    }


    pub fn with_event_sender(mut self, tx: tokio::sync::mpsc::Sender<LinkerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }


    /// Rebuilds RELATED_TO for every Complaint. Only failing to list Complaints is fatal.
    pub async fn link_all(&self, correlation_id: Option<String>) -> Result<LinkReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let complaints = with_timeout(
            Upstream::GraphStore,
            self.store_timeout,
            self.store.list_nodes(NodeLabel::Complaint),
        )
        .await?;

        let mut report = LinkReport {
            complaints_total: complaints.len(),
            complaints_linked: 0,
            complaints_skipped: 0,
            complaints_failed: 0,
            edges_created: 0,
            started_at,
            duration_ms: 0.0,
            correlation_id: correlation_id.clone(),
        };

        for node in &complaints {
            let Some(complaint) = node.as_complaint() else { continue };

            match self.link_complaint(complaint, correlation_id.as_deref()).await {
                Ok(ComplaintOutcome::Linked(edges)) => {
                    report.complaints_linked += 1;
                    report.edges_created += edges;
                }
                Ok(ComplaintOutcome::Skipped(reason)) => {
                    warn!("Skipping complaint {}: {}", node.key(), reason);
                    report.complaints_skipped += 1;
                }
                Err(e) => {
                    warn!("Linking complaint {} failed: {}", node.key(), e);
                    report.complaints_failed += 1;
                }
            }
        }

        report.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            "Linking complete: {} linked, {} skipped, {} failed, {} edges in {:.1}ms",
            report.complaints_linked,
            report.complaints_skipped,
            report.complaints_failed,
            report.edges_created,
            report.duration_ms
        );

        self.emit_event(LinkerEvent::Complete(LinkingCompleteEvent { report: report.clone() }))
            .await;

        Ok(report)
    }

    async fn complaint_embedding(&self, key: &NodeKey, complaint: &Complaint) -> std::result::Result<Vec<f32>, String> {
        if let Some(existing) = complaint.embedding.as_ref().filter(|e| !e.is_empty()) {
            return Ok(existing.clone());
        }

        let text = complaint
            .embedding_text()
            .ok_or_else(|| "no title or body to embed".to_string())?;

        let embedding = with_timeout(Upstream::Embedding, self.embedding_timeout, async {
            self.embedder.embed(&text).await.map_err(PolicyGraphError::from)
        })
        .await
        .map_err(|e| e.to_string())?;

        if let Err(e) = with_timeout(
            Upstream::GraphStore,
            self.store_timeout,
            self.store.set_embedding(key, embedding.clone()),
        )
        .await
        {
            warn!("Could not store embedding for {}: {}", key, e);
        }

        Ok(embedding)
    }

    async fn link_complaint(&self, complaint: &Complaint, correlation_id: Option<&str>) -> Result<ComplaintOutcome> {
        let key = NodeKey::complaint(&complaint.id);
        if !key.is_resolvable() {
            return Ok(ComplaintOutcome::Skipped("blank identifier".to_string()));
        }

        let embedding = match self.complaint_embedding(&key, complaint).await {
            Ok(embedding) => embedding,
            Err(reason) => return Ok(ComplaintOutcome::Skipped(reason)),
        };

        let candidates = match with_timeout(
            Upstream::GraphStore,
            self.store_timeout,
            self.store.vector_search(VectorIndex::Documents, &embedding, self.top_k),
        )
        .await
        {
            Ok(candidates) => candidates,
            Err(PolicyGraphError::EmptyCorpus(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let selected = select_candidates(candidates, self.top_k, self.min_score);
        let edges: Vec<ScoredEdge> = selected
            .iter()
            .map(|c| ScoredEdge {
                from: key.clone(),
                to: c.node.key(),
                score: c.score,
            })
            .collect();

        let removed = with_timeout(
            Upstream::GraphStore,
            self.store_timeout,
            self.store.delete_relations(&key, RelationType::RelatedTo, Direction::Outgoing),
        )
        .await?;

        let written = with_timeout(
            Upstream::GraphStore,
            self.store_timeout,
            self.store.upsert_scored_relations(RelationType::RelatedTo, &edges),
        )
        .await?;

        debug!("{}: replaced {} RELATED_TO edges with {}", key, removed, written);

        for (rank, edge) in edges.iter().enumerate() {
            self.emit_event(LinkerEvent::LinkCreated(LinkCreatedEvent {
                complaint_id: edge.from.id.clone(),
                document_id: edge.to.id.clone(),
                score: edge.score,
                rank,
                correlation_id: correlation_id.map(String::from),
            }))
            .await;
        }

        Ok(ComplaintOutcome::Linked(written))
    }

    async fn emit_event(&self, event: LinkerEvent) {
        if let Some(ref tx) = self.event_tx {
            if let Err(e) = tx.send(event).await {
                warn!("Failed to emit linker event: {}", e);
            }
        }
    }
}
