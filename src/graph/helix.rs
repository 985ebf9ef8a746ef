use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::models::{
    Direction, GraphSnapshot, Neighbor, Node, NodeKey, NodeLabel, OverviewEdge, OverviewNode,
    RelationType, ScoredEdge, ScoredNode, VectorIndex,
};
use super::store::GraphStore;
use crate::core::error::{PolicyGraphError, Result};
use crate::db::{HelixClient, HelixClientError};
use crate::utils::safe_truncate;

const PREVIEW_CHARS: usize = 160;


/// Name of the deployed HelixQL query serving one hop of `relation`.
fn neighbor_query(relation: RelationType, direction: Direction) -> &'static str {
    match (relation, direction) {
        (RelationType::Authored, Direction::Incoming) => "documentAuthors",
        (RelationType::Authored, Direction::Outgoing) => "personDocuments",
        (RelationType::BelongsTo, Direction::Outgoing) => "personDepartments",
        (RelationType::BelongsTo, Direction::Incoming) => "departmentMembers",
        (RelationType::Cites, Direction::Outgoing) => "documentCitations",
        (RelationType::Cites, Direction::Incoming) => "documentCitedBy",
        (RelationType::RelatedTo, Direction::Outgoing) => "complaintRelatedDocuments",
        (RelationType::RelatedTo, Direction::Incoming) => "documentRelatedComplaints",
    }
}


fn vector_query(index: VectorIndex) -> &'static str {
    match index {
        VectorIndex::Documents => "searchDocumentEmbeddings",
        VectorIndex::Complaints => "searchComplaintEmbeddings",
    }
}


#[derive(Serialize)]
struct KeyParams<'a> {
    label: NodeLabel,
    id: &'a str,
}


#[derive(Deserialize)]
struct VectorResponse {
    #[serde(default)]
    hits: Vec<ScoredNode>,
}


#[derive(Deserialize)]
struct NeighborRow {
    /// `Label:id`
    key: String,
    #[serde(default)]
    node: Option<Node>,
    #[serde(default)]
    score: Option<f64>,
}


#[derive(Deserialize)]
struct NeighborResponse {
    #[serde(default)]
    neighbors: Vec<NeighborRow>,
}


#[derive(Deserialize)]
struct CountResponse {
    #[serde(default)]
    count: usize,
}


#[derive(Deserialize)]
struct NodeResponse {
    #[serde(default)]
    node: Option<Node>,
}


#[derive(Deserialize)]
struct NodesResponse {
    #[serde(default)]
    nodes: Vec<Node>,
}


#[derive(Deserialize)]
struct OverviewEdgeRow {
    #[serde(rename = "type")]
    relation: RelationType,
    from: String,
    to: String,
}


#[derive(Deserialize)]
struct OverviewResponse {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<OverviewEdgeRow>,
}


/// [`GraphStore`] backed by HelixDB through named queries.
pub struct HelixGraphStore {
    client: Arc<HelixClient>,
}

impl HelixGraphStore {
    pub fn new(client: Arc<HelixClient>) -> Self {
        info!("HelixGraphStore initialized ({})", client.base_url());
        Self { client }
    }
}


fn is_not_found(err: &HelixClientError) -> bool {
    err.to_string().to_lowercase().contains("not found")
}


#[async_trait]
impl GraphStore for HelixGraphStore {
    async fn vector_search(&self, index: VectorIndex, query: &[f32], limit: usize) -> Result<Vec<ScoredNode>> {
        let params = serde_json::json!({
            "query_vector": query,
            "limit": limit,
        });

        let response: VectorResponse = self.client.execute_query(vector_query(index), &params).await?;

        // The index returns `limit` nearest whenever it holds any vector at all.
        if response.hits.is_empty() {
            return Err(PolicyGraphError::EmptyCorpus(index.name().to_string()));
        }

        let mut hits: Vec<ScoredNode> = response
            .hits
            .into_iter()
            .map(|hit| ScoredNode {
                node: hit.node.normalized(),
                score: hit.score.clamp(0.0, 1.0),
            })
            .filter(|hit| hit.node.label() == index.label() && hit.node.key().is_resolvable())
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);

        debug!("Vector search on {}: {} results", index, hits.len());
        Ok(hits)
    }

    async fn neighbors(&self, key: &NodeKey, relation: RelationType, direction: Direction) -> Result<Vec<Neighbor>> {
        let key = NodeKey::new(key.label, &key.id);
        let params = KeyParams {
            label: key.label,
            id: &key.id,
        };

        let response: NeighborResponse = match self
            .client
            .execute_query(neighbor_query(relation, direction), &params)
            .await
        {
            Ok(r) => r,
            Err(e) if is_not_found(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut neighbors = Vec::with_capacity(response.neighbors.len());
        for row in response.neighbors {
            match NodeKey::parse(&row.key) {
                Some(other) => neighbors.push(Neighbor {
                    key: other,
                    node: row.node.map(Node::normalized),
                    score: row.score,
                }),
                None => warn!("Skipping neighbor with malformed key {:?} of {}", row.key, key),
            }
        }
        Ok(neighbors)
    }

    async fn upsert_scored_relations(&self, relation: RelationType, edges: &[ScoredEdge]) -> Result<usize> {
        if relation != RelationType::RelatedTo {
            return Err(PolicyGraphError::Validation(format!("{} carries no score", relation)));
        }
        if edges.is_empty() {
            return Ok(0);
        }

        let rows: Vec<serde_json::Value> = edges
            .iter()
            .map(|e| {
                serde_json::json!({
                    "complaint_id": crate::normalize_id(&e.from.id),
                    "document_id": crate::normalize_id(&e.to.id),
                    "score": e.score,
                })
            })
            .collect();

        let response: CountResponse = self
            .client
            .execute_query("upsertRelatedTo", &serde_json::json!({ "edges": rows }))
            .await?;
        Ok(response.count)
    }

    async fn delete_relations(&self, key: &NodeKey, relation: RelationType, direction: Direction) -> Result<usize> {
        if (relation, direction) != (RelationType::RelatedTo, Direction::Outgoing) {
            return Err(PolicyGraphError::Validation(format!(
                "deleting {:?} {} edges is not supported",
                direction, relation
            )));
        }

        let params = serde_json::json!({ "complaint_id": crate::normalize_id(&key.id) });
        match self.client.execute_query::<CountResponse, _>("deleteComplaintRelatedTo", &params).await {
            Ok(r) => Ok(r.count),
            Err(e) if is_not_found(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_node(&self, key: &NodeKey) -> Result<Option<Node>> {
        let key = NodeKey::new(key.label, &key.id);
        if !key.is_resolvable() {
            return Ok(None);
        }
        let params = KeyParams {
            label: key.label,
            id: &key.id,
        };

        match self.client.execute_query::<NodeResponse, _>("getNode", &params).await {
            Ok(r) => Ok(r.node.map(Node::normalized)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_nodes(&self, label: NodeLabel) -> Result<Vec<Node>> {
        let response: NodesResponse = self
            .client
            .execute_query("listNodes", &serde_json::json!({ "label": label }))
            .await?;
        Ok(response.nodes.into_iter().map(Node::normalized).collect())
    }

    async fn set_embedding(&self, key: &NodeKey, embedding: Vec<f32>) -> Result<()> {
        let query = match key.label {
            NodeLabel::Document => "setDocumentEmbedding",
            NodeLabel::Complaint => "setComplaintEmbedding",
            other => {
                return Err(PolicyGraphError::Validation(format!("{} does not carry an embedding", other)));
            }
        };

        let params = serde_json::json!({
            "id": crate::normalize_id(&key.id),
            "embedding": embedding,
        });
        match self.client.execute_query::<serde_json::Value, _>(query, &params).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Err(PolicyGraphError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn snapshot(&self, node_limit: usize) -> Result<GraphSnapshot> {
        let response: OverviewResponse = self
            .client
            .execute_query("graphOverview", &serde_json::json!({ "node_limit": node_limit }))
            .await?;

        let nodes: Vec<OverviewNode> = response
            .nodes
            .into_iter()
            .take(node_limit)
            .map(Node::normalized)
            .map(|node| OverviewNode {
                id: node.key().to_string(),
                label: node.label(),
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
            response
                .edges
                .into_iter()
                .filter_map(|row| {
                    let from = NodeKey::parse(&row.from)?.to_string();
                    let to = NodeKey::parse(&row.to)?.to_string();
                    (included.contains(from.as_str()) && included.contains(to.as_str())).then_some(OverviewEdge {
                        from,
                        to,
                        relation: row.relation,
                    })
                })
                .collect()
        };

        Ok(GraphSnapshot { nodes, edges })
    }

    async fn health_check(&self) -> Result<()> {
        self.client.health_check().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.mark_disconnected();
        info!("HelixGraphStore closed ({})", self.client.base_url());
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "helixdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_hop_has_a_query() {
        let relations = [
            RelationType::Authored,
            RelationType::BelongsTo,
            RelationType::Cites,
            RelationType::RelatedTo,
        ];
        let mut names = HashSet::new();
        for relation in relations {
            for direction in [Direction::Outgoing, Direction::Incoming] {
                assert!(names.insert(neighbor_query(relation, direction)));
            }
        }
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_neighbor_rows_deserialize() {
        let response: NeighborResponse = serde_json::from_value(serde_json::json!({
            "neighbors": [
                {"key": "Document:D-1", "node": {"label": "Document", "id": "D-1", "title": "안내"}, "score": 0.91},
                {"key": "Document:D-9"}
            ]
        }))
        .unwrap();

        assert_eq!(response.neighbors.len(), 2);
        assert_eq!(response.neighbors[0].score, Some(0.91));
        assert!(response.neighbors[1].node.is_none());
    }

    #[tokio::test]
    async fn test_rejects_unscored_upsert() {
        let client = Arc::new(HelixClient::new("localhost", 6969, None, std::time::Duration::from_millis(10)));
        let store = HelixGraphStore::new(client);
        let err = store.upsert_scored_relations(RelationType::Cites, &[]).await.unwrap_err();
        assert!(matches!(err, PolicyGraphError::Validation(_)));
    }
}
