use async_trait::async_trait;

use super::models::{
    Direction, GraphSnapshot, Neighbor, Node, NodeKey, NodeLabel, RelationType, ScoredEdge,
    ScoredNode, VectorIndex,
};
use crate::core::error::Result;


/// Query surface the retrieval engine needs from a property graph.
///
/// Implementations normalize every identifier they receive (see
/// [`crate::utils::normalize_id`]) so lookups are insensitive to stray whitespace
/// and control characters. Vector search scores are similarities in `[0, 1]`,
/// higher is closer, returned best-first.
#[async_trait]
pub trait GraphStore: Send + Sync {

    /// Nearest neighbors of `query` in `index`. An index holding no vectors fails
    /// with `EmptyCorpus`.
    async fn vector_search(&self, index: VectorIndex, query: &[f32], limit: usize) -> Result<Vec<ScoredNode>>;


    /// One hop along `relation` from `key`. Unknown `key` yields an empty list.
    async fn neighbors(&self, key: &NodeKey, relation: RelationType, direction: Direction) -> Result<Vec<Neighbor>>;


    /// Creates or overwrites the scored edges; returns how many were written.
    async fn upsert_scored_relations(&self, relation: RelationType, edges: &[ScoredEdge]) -> Result<usize>;


    /// Removes every `relation` edge leaving (or entering) `key`; returns how many.
    async fn delete_relations(&self, key: &NodeKey, relation: RelationType, direction: Direction) -> Result<usize>;


    async fn get_node(&self, key: &NodeKey) -> Result<Option<Node>>;


    async fn list_nodes(&self, label: NodeLabel) -> Result<Vec<Node>>;


    /// Stores a computed embedding on a Document or Complaint node.
    async fn set_embedding(&self, key: &NodeKey, embedding: Vec<f32>) -> Result<()>;


    /// Up to `node_limit` nodes plus every edge between them.
    async fn snapshot(&self, node_limit: usize) -> Result<GraphSnapshot>;


    async fn health_check(&self) -> Result<()> {
        Ok(())
    }


    async fn close(&self) -> Result<()> {
        Ok(())
    }


    fn backend_name(&self) -> &str;
}
