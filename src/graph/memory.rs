use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::models::{
    Direction, GraphSnapshot, Neighbor, Node, NodeKey, NodeLabel, OverviewEdge, OverviewNode,
    RelationType, ScoredEdge, ScoredNode, VectorIndex,
};
use super::similarity::cosine_similarity;
use super::store::GraphStore;
use crate::core::error::{PolicyGraphError, Result};
use crate::utils::safe_truncate;

const PREVIEW_CHARS: usize = 160;


#[derive(Debug, Clone, PartialEq)]
struct StoredEdge {
    relation: RelationType,
    from: NodeKey,
    to: NodeKey,
    score: Option<f64>,
}


#[derive(Default)]
struct Inner {
    /// Insertion order; vector search ties resolve in this order.
    order: Vec<NodeKey>,
    nodes: HashMap<NodeKey, Node>,
    edges: Vec<StoredEdge>,
}


/// Edge record in a JSON seed file; endpoints use the `Label:id` form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEdge {
    #[serde(rename = "type")]
    pub relation: RelationType,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub score: Option<f64>,
}


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSeed {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<SeedEdge>,
}


/// Process-local graph store with brute-force cosine search. Suitable for small
/// corpora, local runs from a seed file, and tests.
#[derive(Default)]
pub struct InMemoryGraphStore {
    inner: RwLock<Inner>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }


    pub fn from_seed(seed: GraphSeed) -> Result<Self> {
        let store = Self::new();
        let node_count = seed.nodes.len();
        for node in seed.nodes {
            store.insert_node(node);
        }
        for edge in &seed.edges {
            let from = NodeKey::parse(&edge.from)
                .ok_or_else(|| PolicyGraphError::Validation(format!("bad edge source: {}", edge.from)))?;
            let to = NodeKey::parse(&edge.to)
                .ok_or_else(|| PolicyGraphError::Validation(format!("bad edge target: {}", edge.to)))?;
            let (source_label, target_label) = edge.relation.endpoints();
            if from.label != source_label || to.label != target_label {
                return Err(PolicyGraphError::Validation(format!(
                    "{} edge must run {} -> {}, got {} -> {}",
                    edge.relation, source_label, target_label, from, to
                )));
            }
            store.insert_edge(edge.relation, from, to, edge.score);
        }
        info!("In-memory graph seeded: {} nodes, {} edges", node_count, seed.edges.len());
        Ok(store)
    }


    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PolicyGraphError::Config(format!("cannot read seed {}: {}", path.display(), e)))?;
        let seed: GraphSeed = serde_json::from_str(&raw)?;
        Self::from_seed(seed)
    }


    /// Inserts or replaces a node. A Document's `cites` become CITES edges.
    pub fn insert_node(&self, node: Node) -> NodeKey {
        let node = node.normalized();
        let key = node.key();
        let mut inner = self.inner.write();

        if let Node::Document(doc) = &node {
            for target in &doc.cites {
                push_edge(&mut inner.edges, RelationType::Cites, key.clone(), NodeKey::document(target), None);
            }
        }

        if inner.nodes.insert(key.clone(), node).is_none() {
            inner.order.push(key.clone());
        }
        key
    }


    pub fn insert_edge(&self, relation: RelationType, from: NodeKey, to: NodeKey, score: Option<f64>) {
        let from = NodeKey::new(from.label, &from.id);
        let to = NodeKey::new(to.label, &to.id);
        push_edge(&mut self.inner.write().edges, relation, from, to, score);
    }


    pub fn relation_count(&self, relation: RelationType) -> usize {
        self.inner.read().edges.iter().filter(|e| e.relation == relation).count()
    }


    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }
}


fn push_edge(edges: &mut Vec<StoredEdge>, relation: RelationType, from: NodeKey, to: NodeKey, score: Option<f64>) {
    match edges
        .iter_mut()
        .find(|e| e.relation == relation && e.from == from && e.to == to)
    {
        Some(existing) => existing.score = score,
        None => edges.push(StoredEdge {
            relation,
            from,
            to,
            score,
        }),
    }
}


#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn vector_search(&self, index: VectorIndex, query: &[f32], limit: usize) -> Result<Vec<ScoredNode>> {
        let inner = self.inner.read();
        let label = index.label();

        let mut scored: Vec<ScoredNode> = inner
            .order
            .iter()
            .filter(|key| key.label == label)
            .filter_map(|key| inner.nodes.get(key))
            .filter_map(|node| {
                node.embedding().map(|embedding| ScoredNode {
                    node: node.clone(),
                    score: cosine_similarity(query, embedding),
                })
            })
            .collect();

        if scored.is_empty() {
            return Err(PolicyGraphError::EmptyCorpus(index.name().to_string()));
        }

        // Stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        debug!("Vector search on {}: {} results", index, scored.len());
        Ok(scored)
    }

    async fn neighbors(&self, key: &NodeKey, relation: RelationType, direction: Direction) -> Result<Vec<Neighbor>> {
        let key = NodeKey::new(key.label, &key.id);
        let inner = self.inner.read();

        let neighbors = inner
            .edges
            .iter()
            .filter(|e| e.relation == relation)
            .filter_map(|e| match direction {
                Direction::Outgoing if e.from == key => Some((&e.to, e.score)),
                Direction::Incoming if e.to == key => Some((&e.from, e.score)),
                _ => None,
            })
            .map(|(other, score)| Neighbor {
                key: other.clone(),
                node: inner.nodes.get(other).cloned(),
                score,
            })
            .collect();

        Ok(neighbors)
    }

    async fn upsert_scored_relations(&self, relation: RelationType, edges: &[ScoredEdge]) -> Result<usize> {
        let mut inner = self.inner.write();
        for edge in edges {
            let from = NodeKey::new(edge.from.label, &edge.from.id);
            let to = NodeKey::new(edge.to.label, &edge.to.id);
            push_edge(&mut inner.edges, relation, from, to, Some(edge.score));
        }
        Ok(edges.len())
    }

    async fn delete_relations(&self, key: &NodeKey, relation: RelationType, direction: Direction) -> Result<usize> {
        let key = NodeKey::new(key.label, &key.id);
        let mut inner = self.inner.write();
        let before = inner.edges.len();

        inner.edges.retain(|e| {
            let touches = match direction {
                Direction::Outgoing => e.from == key,
                Direction::Incoming => e.to == key,
            };
            !(e.relation == relation && touches)
        });

        Ok(before - inner.edges.len())
    }

    async fn get_node(&self, key: &NodeKey) -> Result<Option<Node>> {
        let key = NodeKey::new(key.label, &key.id);
        Ok(self.inner.read().nodes.get(&key).cloned())
    }

    async fn list_nodes(&self, label: NodeLabel) -> Result<Vec<Node>> {
        let inner = self.inner.read();
        Ok(inner
            .order
            .iter()
            .filter(|key| key.label == label)
            .filter_map(|key| inner.nodes.get(key).cloned())
            .collect())
    }

    async fn set_embedding(&self, key: &NodeKey, embedding: Vec<f32>) -> Result<()> {
        let key = NodeKey::new(key.label, &key.id);
        let mut inner = self.inner.write();

        match inner.nodes.get_mut(&key) {
            Some(Node::Document(doc)) => doc.embedding = Some(embedding),
            Some(Node::Complaint(complaint)) => complaint.embedding = Some(embedding),
            Some(_) => {
                return Err(PolicyGraphError::Validation(format!("{} does not carry an embedding", key)));
            }
            None => return Err(PolicyGraphError::NotFound(key.to_string())),
        }
        Ok(())
    }

    async fn snapshot(&self, node_limit: usize) -> Result<GraphSnapshot> {
        let inner = self.inner.read();

        let nodes: Vec<OverviewNode> = inner
            .order
            .iter()
            .take(node_limit)
            .filter_map(|key| inner.nodes.get(key).map(|node| (key, node)))
            .map(|(key, node)| OverviewNode {
                id: key.to_string(),
                label: key.label,
                title: if node.title().trim().is_empty() {
                    "Untitled".to_string()
                } else {
                    node.title().to_string()
                },
                preview: safe_truncate(node.text(), PREVIEW_CHARS),
            })
            .collect();

        let edges = {
            let included: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
            inner
                .edges
                .iter()
                .map(|e| (e.from.to_string(), e.to.to_string(), e.relation))
                .filter(|(from, to, _)| included.contains(from.as_str()) && included.contains(to.as_str()))
                .map(|(from, to, relation)| OverviewEdge { from, to, relation })
                .collect()
        };

        Ok(GraphSnapshot { nodes, edges })
    }

    async fn close(&self) -> Result<()> {
        let inner = self.inner.read();
        if inner.nodes.is_empty() {
            warn!("Closing an empty in-memory graph");
        }
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
