//! Deterministic collaborators shared by unit tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::core::error::{PolicyGraphError, Result, Upstream};
use crate::graph::{
    Complaint, Department, Direction, Document, GraphSnapshot, GraphStore, InMemoryGraphStore, Neighbor, Node,
    NodeKey, NodeLabel, Person, RelationType, ScoredEdge, ScoredNode, VectorIndex,
};
use crate::llm::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::llm::providers::{LlmMetadata, LlmProvider, LlmProviderError};


const VOCAB: [&str; 16] = [
    "청년수당", "지급", "중단", "서류", "미비", "제출", "신청", "자격", "월세", "주거", "지원", "취업", "상담", "일정",
    "담당", "안내",
];


/// Bag-of-keywords vector over a small policy vocabulary.
pub fn keyword_vector(text: &str) -> Vec<f32> {
    VOCAB.iter().map(|word| text.matches(word).count() as f32).collect()
}


pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }
        Ok(keyword_vector(text))
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}


pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::InvalidResponse("embedding service down".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing-test"
    }
}


fn metadata(provider: &str) -> LlmMetadata {
    LlmMetadata {
        provider: provider.to_string(),
        model: format!("{provider}-model"),
        ..Default::default()
    }
}


/// Always replies with the same text.
pub struct ScriptedLlm(String);

impl ScriptedLlm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self(reply.into())
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, _system: &str, _user: &str) -> std::result::Result<(String, LlmMetadata), LlmProviderError> {
        Ok((self.0.clone(), metadata("scripted")))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}


/// Replies with the user prompt, so tests can inspect what the model was shown.
pub struct EchoLlm;

#[async_trait]
impl LlmProvider for EchoLlm {
    async fn generate(&self, _system: &str, user: &str) -> std::result::Result<(String, LlmMetadata), LlmProviderError> {
        Ok((user.to_string(), metadata("echo")))
    }

    fn provider_name(&self) -> &str {
        "echo"
    }

    fn model_name(&self) -> &str {
        "echo-model"
    }
}


pub struct FailingLlm;

#[async_trait]
impl LlmProvider for FailingLlm {
    async fn generate(&self, _system: &str, _user: &str) -> std::result::Result<(String, LlmMetadata), LlmProviderError> {
        Err(LlmProviderError::Provider("model overloaded".to_string()))
    }

    fn provider_name(&self) -> &str {
        "failing"
    }

    fn model_name(&self) -> &str {
        "failing-model"
    }
}


pub struct SlowLlm(pub Duration);

#[async_trait]
impl LlmProvider for SlowLlm {
    async fn generate(&self, _system: &str, user: &str) -> std::result::Result<(String, LlmMetadata), LlmProviderError> {
        tokio::time::sleep(self.0).await;
        Ok((user.to_string(), metadata("slow")))
    }

    fn provider_name(&self) -> &str {
        "slow"
    }

    fn model_name(&self) -> &str {
        "slow-model"
    }
}


/// Wraps an in-memory store and fails selected calls as an unavailable upstream.
pub struct FaultyStore {
    inner: InMemoryGraphStore,
    vector_failures: Vec<VectorIndex>,
    neighbor_failures: Vec<NodeKey>,
}

impl FaultyStore {
    pub fn new(inner: InMemoryGraphStore) -> Self {
        Self {
            inner,
            vector_failures: Vec::new(),
            neighbor_failures: Vec::new(),
        }
    }

    pub fn fail_vector(mut self, index: VectorIndex) -> Self {
        self.vector_failures.push(index);
        self
    }

    pub fn fail_neighbors(mut self, key: NodeKey) -> Self {
        self.neighbor_failures.push(key);
        self
    }

    fn outage(what: impl std::fmt::Display) -> PolicyGraphError {
        PolicyGraphError::upstream(Upstream::GraphStore, format!("injected failure: {what}"))
    }
}

#[async_trait]
impl GraphStore for FaultyStore {
    async fn vector_search(&self, index: VectorIndex, query: &[f32], limit: usize) -> Result<Vec<ScoredNode>> {
        if self.vector_failures.contains(&index) {
            return Err(Self::outage(index));
        }
        self.inner.vector_search(index, query, limit).await
    }

    async fn neighbors(&self, key: &NodeKey, relation: RelationType, direction: Direction) -> Result<Vec<Neighbor>> {
        if self.neighbor_failures.contains(key) {
            return Err(Self::outage(key));
        }
        self.inner.neighbors(key, relation, direction).await
    }

    async fn upsert_scored_relations(&self, relation: RelationType, edges: &[ScoredEdge]) -> Result<usize> {
        self.inner.upsert_scored_relations(relation, edges).await
    }

    async fn delete_relations(&self, key: &NodeKey, relation: RelationType, direction: Direction) -> Result<usize> {
        self.inner.delete_relations(key, relation, direction).await
    }

    async fn get_node(&self, key: &NodeKey) -> Result<Option<Node>> {
        self.inner.get_node(key).await
    }

    async fn list_nodes(&self, label: NodeLabel) -> Result<Vec<Node>> {
        self.inner.list_nodes(label).await
    }

    async fn set_embedding(&self, key: &NodeKey, embedding: Vec<f32>) -> Result<()> {
        self.inner.set_embedding(key, embedding).await
    }

    async fn snapshot(&self, node_limit: usize) -> Result<GraphSnapshot> {
        self.inner.snapshot(node_limit).await
    }

    fn backend_name(&self) -> &str {
        "faulty"
    }
}


pub const SCENARIO_QUERY: &str = "지급이 중단된 경우 담당자는?";


fn scenario_document(id: &str, title: &str, content: &str, cites: &[&str]) -> Node {
    Node::Document(Document {
        id: id.into(),
        title: title.into(),
        content: content.into(),
        embedding: Some(keyword_vector(&format!("{title} {content}"))),
        cites: cites.iter().map(|c| c.to_string()).collect(),
    })
}


fn scenario_complaint(id: &str, title: &str, body: &str) -> Node {
    let mut complaint = Complaint {
        id: id.into(),
        title: title.into(),
        body: body.into(),
        embedding: None,
    };
    complaint.embedding = complaint.embedding_text().map(|text| keyword_vector(&text));
    Node::Complaint(complaint)
}


/// Two complaints, three documents, their authors and departments, already linked.
pub fn scenario_store() -> InMemoryGraphStore {
    let store = InMemoryGraphStore::new();

    store.insert_node(scenario_document(
        "D-100",
        "청년수당 지급 중단 안내",
        "서류 미비 등으로 청년수당 지급이 중단된 경우 담당 부서에 이의신청을 할 수 있습니다.",
        &["D-200"],
    ));
    store.insert_node(scenario_document(
        "D-200",
        "청년수당 신청 자격 안내",
        "만 19세에서 34세 사이의 서울 거주 청년은 청년수당을 신청할 수 있습니다.",
        &[],
    ));
    store.insert_node(scenario_document(
        "D-300",
        "청년 월세 지원 공고",
        "무주택 청년에게 월 20만원의 월세를 지원합니다.",
        &[],
    ));

    store.insert_node(scenario_complaint(
        "C-1",
        "서류 미비로 지급이 중단됨",
        "서류를 제출했는데도 청년수당 지급이 중단되었습니다. 담당자가 누구인지 알고 싶습니다.",
    ));
    store.insert_node(scenario_complaint("C-2", "월세 지원 신청 문의", "월세 지원 신청 방법을 알려주세요."));

    for (person, department, document) in [("김OO", "청년사업담당관", "D-100"), ("이OO", "청년정책과", "D-200")] {
        let person = store.insert_node(Node::Person(Person { name: person.into() }));
        let department = store.insert_node(Node::Department(Department {
            name: department.into(),
        }));
        store.insert_edge(RelationType::Authored, person.clone(), NodeKey::document(document), None);
        store.insert_edge(RelationType::BelongsTo, person, department, None);
    }

    store.insert_edge(
        RelationType::RelatedTo,
        NodeKey::complaint("C-1"),
        NodeKey::document("D-100"),
        Some(0.92),
    );
    store.insert_edge(
        RelationType::RelatedTo,
        NodeKey::complaint("C-2"),
        NodeKey::document("D-300"),
        Some(0.88),
    );

    store
}
