use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::core::error::{PolicyGraphError, Result, Upstream, with_timeout};
use crate::graph::{Direction, GraphStore, Neighbor, Node, NodeKey, NodeLabel, RelationType};
use crate::retrieval::models::{CitedDocument, DocumentFacts, ExpandedHit, Expansion, Hit, LinkedDocument, SourceType};


async fn hop(
    store: &dyn GraphStore,
    key: &NodeKey,
    relation: RelationType,
    direction: Direction,
    timeout: Duration,
) -> Result<Vec<Neighbor>> {
    with_timeout(Upstream::GraphStore, timeout, store.neighbors(key, relation, direction)).await
}


/// First resolvable neighbor carrying `label`.
fn first_resolved(neighbors: Vec<Neighbor>, label: NodeLabel) -> Option<Node> {
    neighbors
        .into_iter()
        .filter_map(|n| n.node)
        .find(|node| node.label() == label && node.key().is_resolvable())
}


async fn author_and_department(
    store: &dyn GraphStore,
    document: &NodeKey,
    timeout: Duration,
) -> Result<(Option<String>, Option<String>)> {
    let authors = hop(store, document, RelationType::Authored, Direction::Incoming, timeout).await?;
    let Some(author) = first_resolved(authors, NodeLabel::Person) else {
        return Ok((None, None));
    };

    let departments = hop(store, &author.key(), RelationType::BelongsTo, Direction::Outgoing, timeout).await?;
    let department = first_resolved(departments, NodeLabel::Department).map(|d| d.title().to_string());

    Ok((Some(author.title().to_string()), department))
}


/// One CITES hop. Self-citations and repeats are dropped; cited documents are not
/// expanded further.
async fn citations(store: &dyn GraphStore, document: &NodeKey, timeout: Duration) -> Result<Vec<CitedDocument>> {
    let neighbors = hop(store, document, RelationType::Cites, Direction::Outgoing, timeout).await?;

    let mut seen = HashSet::new();
    let mut cited = Vec::new();
    for neighbor in neighbors {
        if neighbor.key == *document || !seen.insert(neighbor.key.clone()) {
            continue;
        }
        match neighbor.node {
            Some(node) if node.label() == NodeLabel::Document => cited.push(CitedDocument {
                key: neighbor.key,
                title: node.title().to_string(),
            }),
            _ => debug!("Citation {} of {} not found", neighbor.key, document),
        }
    }
    Ok(cited)
}


/// Author, department, and one hop of citations for a Document.
pub async fn document_facts(store: &dyn GraphStore, document: &NodeKey, timeout: Duration) -> Result<DocumentFacts> {
    let (people, cited) = tokio::join!(
        author_and_department(store, document, timeout),
        citations(store, document, timeout)
    );
    let (author, department) = people?;

    Ok(DocumentFacts {
        author,
        department,
        citations: cited?,
    })
}


/// Documents behind a Complaint's RELATED_TO edges, best link first, each with its facts.
pub async fn linked_documents(
    store: &dyn GraphStore,
    complaint: &NodeKey,
    timeout: Duration,
) -> Result<(Vec<LinkedDocument>, Vec<String>)> {
    let neighbors = hop(store, complaint, RelationType::RelatedTo, Direction::Outgoing, timeout).await?;

    let mut resolved = Vec::with_capacity(neighbors.len());
    for neighbor in neighbors {
        match neighbor.node {
            Some(node @ Node::Document(_)) => resolved.push((neighbor.key, node, neighbor.score.unwrap_or(0.0))),
            _ => {
                let err = PolicyGraphError::DataIntegrity(format!(
                    "{} is RELATED_TO missing {}",
                    complaint, neighbor.key
                ));
                warn!("Skipping link: {}", err);
            }
        }
    }
    resolved.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let facts = join_all(resolved.iter().map(|(key, _, _)| document_facts(store, key, timeout))).await;

    let mut notes = Vec::new();
    let linked = resolved
        .into_iter()
        .zip(facts)
        .map(|((key, node, link_score), facts)| {
            let facts = facts.unwrap_or_else(|e| {
                warn!("Expansion of {} failed: {}", key, e);
                notes.push(format!("facts for {} unavailable: {}", key, e));
                DocumentFacts::default()
            });
            LinkedDocument {
                key,
                node,
                link_score,
                facts,
            }
        })
        .collect();

    Ok((linked, notes))
}


async fn expand_hit(store: &dyn GraphStore, hit: Hit, timeout: Duration) -> (ExpandedHit, Vec<String>) {
    match hit.source {
        SourceType::Document => match document_facts(store, &hit.key, timeout).await {
            Ok(facts) => (
                ExpandedHit {
                    hit,
                    expansion: Expansion::Document(facts),
                },
                Vec::new(),
            ),
            Err(e) => {
                warn!("Expansion of {} failed: {}", hit.key, e);
                let note = format!("expansion of {} unavailable: {}", hit.key, e);
                (
                    ExpandedHit {
                        hit,
                        expansion: Expansion::Document(DocumentFacts::default()),
                    },
                    vec![note],
                )
            }
        },
        SourceType::Complaint => match linked_documents(store, &hit.key, timeout).await {
            Ok((linked, notes)) => (
                ExpandedHit {
                    hit,
                    expansion: Expansion::Complaint(linked),
                },
                notes,
            ),
            Err(e) => {
                warn!("Expansion of {} failed: {}", hit.key, e);
                let note = format!("expansion of {} unavailable: {}", hit.key, e);
                (
                    ExpandedHit {
                        hit,
                        expansion: Expansion::Complaint(Vec::new()),
                    },
                    vec![note],
                )
            }
        },
    }
}


/// Expands every hit concurrently. Output order follows `hits`.
pub async fn graph_expansion_phase(
    store: &dyn GraphStore,
    hits: Vec<Hit>,
    timeout: Duration,
) -> (Vec<ExpandedHit>, Vec<String>) {
    let count = hits.len();
    let outcomes = join_all(hits.into_iter().map(|hit| expand_hit(store, hit, timeout))).await;

    let mut expanded = Vec::with_capacity(count);
    let mut notes = Vec::new();
    for (hit, hit_notes) in outcomes {
        expanded.push(hit);
        notes.extend(hit_notes);
    }

    info!("Graph expansion: {} hits, {} notes", expanded.len(), notes.len());
    (expanded, notes)
}
