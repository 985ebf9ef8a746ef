use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::Mutex;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::config::PolicyGraphConfig;
use super::error::{PolicyGraphError, Result, Upstream, with_timeout};
use super::search_modes::SearchMode;
use super::services::linking::{LinkReport, LinkerEvent, SimilarityLinker};
use crate::context::{ContextAssembler, SourceCitation};
use crate::db::HelixClient;
use crate::graph::{GraphSnapshot, GraphStore, HelixGraphStore, InMemoryGraphStore};
use crate::llm::embeddings::EmbeddingProvider;
use crate::llm::factory::{EmbeddingProviderFactory, LlmProviderFactory};
use crate::llm::generator::{AnswerGenerator, INSUFFICIENT_EVIDENCE_ANSWER};
use crate::llm::providers::LlmProvider;
use crate::retrieval::{Coverage, HybridRetriever, RetrievalConfig};

pub const DEFAULT_OVERVIEW_NODE_LIMIT: usize = 400;


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    pub mode: Option<SearchMode>,
    pub use_hyde: Option<bool>,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Confidence {
    Grounded,
    InsufficientEvidence,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub confidence: Confidence,
    pub coverage: Coverage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypothetical_document: Option<String>,
    pub mode: SearchMode,
    pub request_id: String,
}


/// Process-wide entry point: owns the store, the model clients, and the pipeline.
pub struct PolicyGraphEngine {
    config: PolicyGraphConfig,
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: HybridRetriever,
    generator: AnswerGenerator,
    link_lock: Mutex<()>,
}

impl PolicyGraphEngine {

    /// Builds every collaborator from `config`. No network call is made here.
    pub async fn new(config: PolicyGraphConfig) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn GraphStore> = match config.store_backend.as_str() {
            "memory" => {
                let path = config
                    .seed_path
                    .as_deref()
                    .ok_or_else(|| PolicyGraphError::Config("store_backend=memory requires seed_path".into()))?;
                Arc::new(InMemoryGraphStore::from_json_file(path).await?)
            }
            _ => {
                let client = HelixClient::new(
                    &config.helix_host,
                    config.helix_port,
                    config.helix_api_key.as_deref(),
                    config.store_timeout(),
                );
                Arc::new(HelixGraphStore::new(Arc::new(client)))
            }
        };

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(EmbeddingProviderFactory::from_config(&config)?);
        let llm = LlmProviderFactory::from_config(&config)?;

        Ok(Self::with_components(config, store, embedder, llm))
    }


    pub fn with_components(
        config: PolicyGraphConfig,
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let retriever = HybridRetriever::new(store.clone(), embedder.clone(), config.embedding_timeout());
        let generator = AnswerGenerator::new(llm, config.generation_timeout());

        info!(
            "PolicyGraphEngine ready: store={}, embedding={}, llm={}, mode={}",
            store.backend_name(),
            embedder.model_name(),
            generator.model_name(),
            config.search_mode
        );

        Self {
            config,
            store,
            embedder,
            retriever,
            generator,
            link_lock: Mutex::new(()),
        }
    }

    /// Verifies the store is reachable.
    pub async fn initialize(&self) -> Result<()> {
        with_timeout(Upstream::GraphStore, self.config.store_timeout(), self.store.health_check()).await?;
        info!("Graph store {} reachable", self.store.backend_name());
        Ok(())
    }


    pub async fn shutdown(&self) -> Result<()> {
        let _guard = self.link_lock.lock().await;
        self.store.close().await?;
        info!("PolicyGraphEngine shut down");
        Ok(())
    }


    pub fn config(&self) -> &PolicyGraphConfig {
        &self.config
    }


    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Answers `query` from retrieved Documents and Complaints.
    ///
    /// A failed question embedding, a failed generation, or both indexes being
    /// unreachable is an error. A single lost index or expansion is reported through
    /// `coverage` and `notes`.
    /// With nothing relevant retrieved, no model call is made.
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("search", request_id = %request_id);
        self.search_inner(query, options, request_id).instrument(span).await
    }

    async fn search_inner(&self, query: &str, options: SearchOptions, request_id: String) -> Result<SearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PolicyGraphError::Validation("query must not be empty".to_string()));
        }

        let config = RetrievalConfig::resolve(&self.config, options.mode, options.use_hyde);
        info!(
            "Search: '{}' [mode={}, hyde={}]",
            crate::safe_truncate(query, 50),
            config.mode,
            config.use_hyde
        );

        let hypothetical_document = if config.use_hyde {
            match self.generator.hypothetical_document(query).await {
                Ok(draft) => Some(draft),
                Err(e) => {
                    warn!("HyDE draft failed, embedding the question instead: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let retrieval = self
            .retriever
            .retrieve(hypothetical_document.as_deref().unwrap_or(query), &config)
            .await?;
        let coverage = retrieval.coverage();

        let context = ContextAssembler::new(config.max_context_chars, config.content_excerpt_chars).assemble(&retrieval);

        let (answer, confidence) = if context.is_empty() {
            info!("No evidence above {:.2}, skipping generation", config.min_hit_score);
            (INSUFFICIENT_EVIDENCE_ANSWER.to_string(), Confidence::InsufficientEvidence)
        } else {
            (self.generator.generate(query, &context.text).await?, Confidence::Grounded)
        };

        info!(
            "Search complete: {} sources, confidence={}, coverage={}",
            context.sources.len(),
            confidence,
            coverage
        );

        Ok(SearchResponse {
            answer,
            sources: context.sources,
            confidence,
            coverage,
            notes: retrieval.notes,
            hypothetical_document,
            mode: config.mode,
            request_id,
        })
    }

    /// Nodes (up to `node_limit`, default 400) and the edges among them.
    pub async fn graph_overview(&self, node_limit: Option<usize>) -> Result<GraphSnapshot> {
        let node_limit = node_limit.unwrap_or(DEFAULT_OVERVIEW_NODE_LIMIT);
        with_timeout(Upstream::GraphStore, self.config.store_timeout(), self.store.snapshot(node_limit)).await
    }

    /// Rebuilds every Complaint's RELATED_TO edges. Concurrent calls run one at a time.
    pub async fn link_complaints(&self) -> Result<LinkReport> {
        self.run_linker(None).await
    }


    pub async fn link_complaints_with_events(&self, tx: tokio::sync::mpsc::Sender<LinkerEvent>) -> Result<LinkReport> {
        self.run_linker(Some(tx)).await
    }

    async fn run_linker(&self, tx: Option<tokio::sync::mpsc::Sender<LinkerEvent>>) -> Result<LinkReport> {
        let _guard = self.link_lock.lock().await;

        let mut linker = SimilarityLinker::new(self.store.clone(), self.embedder.clone(), self.config.link_top_k)
            .with_min_score(self.config.link_min_score)
            .with_timeouts(self.config.embedding_timeout(), self.config.store_timeout());
        if let Some(tx) = tx {
            linker = linker.with_event_sender(tx);
        }

        linker.link_all(Some(Uuid::new_v4().to_string())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Document, Node, NodeKey, RelationType, VectorIndex};
    use crate::retrieval::SourceType;
    use crate::testing::{
        EchoLlm, FailingLlm, FaultyStore, KeywordEmbedder, SCENARIO_QUERY, ScriptedLlm, keyword_vector, scenario_store,
    };
    use tokio_test::assert_ok;

    fn engine_with(store: Arc<dyn GraphStore>, llm: Arc<dyn LlmProvider>) -> PolicyGraphEngine {
        PolicyGraphEngine::with_components(PolicyGraphConfig::default(), store, Arc::new(KeywordEmbedder), llm)
    }

    fn scenario_engine() -> PolicyGraphEngine {
        engine_with(Arc::new(scenario_store()), Arc::new(EchoLlm))
    }

    #[tokio::test]
    async fn test_scenario_cites_complaint_document_and_department() {
        let engine = scenario_engine();
        let response = engine.search(SCENARIO_QUERY, SearchOptions::default()).await.unwrap();

        assert_eq!(response.confidence, Confidence::Grounded);
        assert_eq!(response.coverage, Coverage::Full);
        assert!(
            response
                .sources
                .iter()
                .any(|s| s.source_type == SourceType::Complaint && s.id == "C-1")
        );
        assert!(
            response
                .sources
                .iter()
                .any(|s| s.source_type == SourceType::Document && s.title == "청년수당 지급 중단 안내")
        );
        // EchoLlm returns the prompt, so the answer shows the context the model saw.
        assert!(response.answer.contains("청년사업담당관"));
        assert!(response.answer.contains("김OO"));
    }

    #[tokio::test]
    async fn test_sources_are_unique() {
        let engine = scenario_engine();
        let response = engine.search(SCENARIO_QUERY, SearchOptions::default()).await.unwrap();

        let mut ids = std::collections::HashSet::new();
        for source in &response.sources {
            assert!(ids.insert((source.source_type, source.id.clone())));
        }
    }

    #[tokio::test]
    async fn test_unrelated_question_is_insufficient_evidence() {
        let engine = engine_with(Arc::new(scenario_store()), Arc::new(FailingLlm));
        let response = engine.search("오늘 날씨 어때요", SearchOptions::default()).await.unwrap();

        assert_eq!(response.confidence, Confidence::InsufficientEvidence);
        assert!(response.sources.is_empty());
        assert_eq!(response.answer, INSUFFICIENT_EVIDENCE_ANSWER);
    }

    #[tokio::test]
    async fn test_empty_corpus_is_insufficient_evidence() {
        let engine = engine_with(Arc::new(InMemoryGraphStore::new()), Arc::new(EchoLlm));
        let response = engine.search(SCENARIO_QUERY, SearchOptions::default()).await.unwrap();

        assert_eq!(response.confidence, Confidence::InsufficientEvidence);
        assert_eq!(response.coverage, Coverage::Full);
    }

    #[tokio::test]
    async fn test_generation_failure_aborts() {
        let engine = engine_with(Arc::new(scenario_store()), Arc::new(FailingLlm));
        let err = engine.search(SCENARIO_QUERY, SearchOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            PolicyGraphError::UpstreamUnavailable {
                service: Upstream::Generation,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_index_outage_is_partial() {
        let store = FaultyStore::new(scenario_store()).fail_vector(VectorIndex::Complaints);
        let engine = engine_with(Arc::new(store), Arc::new(EchoLlm));
        let response = engine.search(SCENARIO_QUERY, SearchOptions::default()).await.unwrap();

        assert_eq!(response.coverage, Coverage::Partial);
        assert_eq!(response.notes.len(), 1);
        assert!(response.sources.iter().all(|s| s.source_type == SourceType::Document));
        assert!(!response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_is_not_insufficient_evidence() {
        let store = FaultyStore::new(scenario_store())
            .fail_vector(VectorIndex::Documents)
            .fail_vector(VectorIndex::Complaints);
        let engine = engine_with(Arc::new(store), Arc::new(EchoLlm));
        let err = engine.search(SCENARIO_QUERY, SearchOptions::default()).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(matches!(
            err,
            PolicyGraphError::UpstreamUnavailable {
                service: Upstream::GraphStore,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_hyde_embeds_the_draft() {
        let engine = engine_with(Arc::new(scenario_store()), Arc::new(ScriptedLlm::new("청년수당 지급 중단 시 담당 부서 안내")));
        let options = SearchOptions {
            mode: Some(SearchMode::Focused),
            use_hyde: Some(true),
        };
        let response = engine.search("이거 누구한테 물어봐야 해요", options).await.unwrap();

        assert_eq!(response.hypothetical_document.as_deref(), Some("청년수당 지급 중단 시 담당 부서 안내"));
        assert_eq!(response.mode, SearchMode::Focused);
        assert_eq!(response.confidence, Confidence::Grounded);
    }

    #[tokio::test]
    async fn test_citation_chain_is_one_hop() {
        let store = InMemoryGraphStore::new();
        for (id, title, keywords, cites) in [
            ("A", "청년 월세 지원 공고", "월세 지원", vec!["B"]),
            ("B", "주거 안정 기본계획", "주거", vec!["C"]),
            ("C", "취업 상담 운영지침", "취업 상담", vec![]),
        ] {
            store.insert_node(Node::Document(Document {
                id: id.into(),
                title: title.into(),
                content: String::new(),
                embedding: Some(keyword_vector(keywords)),
                cites: cites.into_iter().map(String::from).collect(),
            }));
        }

        let engine = engine_with(Arc::new(store), Arc::new(EchoLlm));
        let response = engine.search("월세 지원 신청", SearchOptions::default()).await.unwrap();

        let ids: Vec<_> = response.sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["A"]);
        assert!(response.answer.contains("인용 문서: 주거 안정 기본계획"));
        assert!(!response.answer.contains("취업 상담 운영지침"));
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let engine = scenario_engine();
        let err = engine.search("   ", SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, PolicyGraphError::Validation(_)));
    }

    #[tokio::test]
    async fn test_concurrent_link_runs_serialize() {
        let store = Arc::new(scenario_store());
        let engine = engine_with(store.clone(), Arc::new(EchoLlm));

        let (first, second) = tokio::join!(engine.link_complaints(), engine.link_complaints());
        let first = first.unwrap();
        let second = second.unwrap();

        assert_eq!(first.edges_created, 6);
        assert_eq!(second.edges_created, 6);
        assert_eq!(store.relation_count(RelationType::RelatedTo), 6);
    }

    #[tokio::test]
    async fn test_graph_overview_defaults() {
        let engine = scenario_engine();
        let snapshot = engine.graph_overview(None).await.unwrap();
        assert_eq!(snapshot.nodes.len(), 9);
        assert!(snapshot.edges.iter().any(|e| e.relation == RelationType::RelatedTo));

        let limited = engine.graph_overview(Some(2)).await.unwrap();
        assert_eq!(limited.nodes.len(), 2);
        assert!(
            limited
                .edges
                .iter()
                .all(|e| limited.nodes.iter().any(|n| n.id == e.from) && limited.nodes.iter().any(|n| n.id == e.to))
        );
    }

    #[tokio::test]
    async fn test_new_from_seed_file() {
        let seed = serde_json::json!({
            "nodes": [
                {"label": "Document", "id": "D-1", "title": "청년수당 지급 중단 안내", "content": "안내문"},
                {"label": "Complaint", "id": "C-1", "title": "지급 중단 문의", "body": ""}
            ],
            "edges": [
                {"type": "RELATED_TO", "from": "Complaint:C-1", "to": "Document:D-1", "score": 0.9}
            ]
        });
        let path = std::env::temp_dir().join(format!("policygraph-seed-{}.json", Uuid::new_v4()));
        tokio::fs::write(&path, seed.to_string()).await.unwrap();

        let config = PolicyGraphConfig {
            store_backend: "memory".into(),
            seed_path: Some(path.to_string_lossy().into_owned()),
            embedding_provider: "ollama".into(),
            embedding_url: "http://localhost:11434".into(),
            llm_provider: "ollama".into(),
            ..Default::default()
        };
        let engine = PolicyGraphEngine::new(config).await.unwrap();
        assert_ok!(engine.initialize().await);

        let snapshot = engine.graph_overview(None).await.unwrap();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);
        assert_eq!(snapshot.edges[0].from, "Complaint:C-1");

        assert_ok!(engine.shutdown().await);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_new_rejects_unknown_provider() {
        let config = PolicyGraphConfig {
            llm_provider: "mystery".into(),
            ..Default::default()
        };
        assert!(matches!(
            PolicyGraphEngine::new(config).await,
            Err(PolicyGraphError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_linked_document_keeps_key() {
        let engine = scenario_engine();
        engine.link_complaints().await.unwrap();
        let neighbors = engine
            .store()
            .neighbors(&NodeKey::complaint("C-1"), RelationType::RelatedTo, crate::graph::Direction::Outgoing)
            .await
            .unwrap();
        assert_eq!(neighbors[0].key, NodeKey::document("D-100"));
    }
}
