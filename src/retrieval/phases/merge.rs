use std::collections::HashMap;

use tracing::debug;

use crate::graph::ScoredNode;
use crate::retrieval::models::{Hit, SourceType};


/// Interleaves the two ranked lists by rank, Document side first. Scores are not
/// normalized across indexes. Duplicates keep their best score at their first
/// position; hits under `min_score` are dropped.
pub fn merge_hits(documents: Vec<ScoredNode>, complaints: Vec<ScoredNode>, min_score: f64) -> Vec<Hit> {
    let mut merged: Vec<Hit> = Vec::with_capacity(documents.len() + complaints.len());
    let mut position = HashMap::new();

    let mut documents = documents.into_iter();
    let mut complaints = complaints.into_iter();

    loop {
        let next_doc = documents.next();
        let next_complaint = complaints.next();
        if next_doc.is_none() && next_complaint.is_none() {
            break;
        }

        for scored in next_doc.into_iter().chain(next_complaint) {
            if scored.score < min_score {
                continue;
            }
            let Some(source) = SourceType::from_label(scored.node.label()) else {
                continue;
            };
            let key = scored.node.key();
            if !key.is_resolvable() {
                continue;
            }

            match position.get(&key) {
                Some(&idx) => {
                    let existing: &mut Hit = &mut merged[idx];
                    if scored.score > existing.score {
                        existing.score = scored.score;
                    }
                }
                None => {
                    position.insert(key.clone(), merged.len());
                    merged.push(Hit {
                        key,
                        source,
                        score: scored.score,
                        node: scored.node,
                    });
                }
            }
        }
    }

    debug!("Merged hits: {}", merged.len());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Complaint, Document, Node};

    fn doc(id: &str, score: f64) -> ScoredNode {
        ScoredNode {
            node: Node::Document(Document {
                id: id.into(),
                title: format!("문서 {id}"),
                ..Default::default()
            }),
            score,
        }
    }

    fn complaint(id: &str, score: f64) -> ScoredNode {
        ScoredNode {
            node: Node::Complaint(Complaint {
                id: id.into(),
                title: format!("민원 {id}"),
                ..Default::default()
            }),
            score,
        }
    }

    fn ids(hits: &[Hit]) -> Vec<String> {
        hits.iter().map(|h| h.key.to_string()).collect()
    }

    #[test]
    fn test_round_robin_document_first() {
        let merged = merge_hits(
            vec![doc("D1", 0.9), doc("D2", 0.8), doc("D3", 0.7)],
            vec![complaint("C1", 0.95)],
            0.0,
        );
        assert_eq!(ids(&merged), ["Document:D1", "Complaint:C1", "Document:D2", "Document:D3"]);
    }

    #[test]
    fn test_no_cross_index_normalization() {
        let merged = merge_hits(vec![doc("D1", 0.61)], vec![complaint("C1", 0.99)], 0.0);
        assert_eq!(merged[0].score, 0.61);
        assert_eq!(merged[1].score, 0.99);
    }

    #[test]
    fn test_duplicates_keep_best_score() {
        let merged = merge_hits(vec![doc("D1", 0.7), doc(" D1 ", 0.9)], vec![], 0.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].score, 0.9);
    }

    #[test]
    fn test_min_score_and_blank_ids_dropped() {
        let merged = merge_hits(vec![doc("D1", 0.55), doc("\u{200B}", 0.9)], vec![complaint("C1", 0.7)], 0.6);
        assert_eq!(ids(&merged), ["Complaint:C1"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge_hits(vec![], vec![], 0.0).is_empty());
    }
}
