use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::{debug, info};

use super::models::{AssembledContext, ContextEntry, SourceCitation};
use crate::graph::{Node, NodeKey};
use crate::retrieval::{DocumentFacts, Expansion, LinkedDocument, Retrieval, SourceType};
use crate::utils::safe_truncate_ellipsis;

const ENTRY_SEPARATOR: &str = "\n\n";


/// Turns a [`Retrieval`] into a bounded prompt context plus citations.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_context_chars: usize,
    content_excerpt_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_context_chars: usize, content_excerpt_chars: usize) -> Self {
        Self {
            max_context_chars,
            content_excerpt_chars,
        }
    }

    fn excerpt(&self, node: &Node) -> String {
        safe_truncate_ellipsis(node.text().trim(), self.content_excerpt_chars)
    }

    fn render_document(&self, key: &NodeKey, node: &Node, facts: &DocumentFacts) -> String {
        let mut text = format!("[공문서] {} ({})", node.title(), key);

        let excerpt = self.excerpt(node);
        if !excerpt.is_empty() {
            let _ = write!(text, "\n{}", excerpt);
        }
        if let Some(author) = &facts.author {
            let _ = write!(text, "\n작성자: {}", author);
        }
        if let Some(department) = &facts.department {
            let _ = write!(text, "\n담당 부서: {}", department);
        }
        if !facts.citations.is_empty() {
            let titles: Vec<&str> = facts.citations.iter().map(|c| c.title.as_str()).collect();
            let _ = write!(text, "\n인용 문서: {}", titles.join(", "));
        }
        text
    }

    fn render_complaint(&self, key: &NodeKey, node: &Node, linked: &[LinkedDocument]) -> String {
        let mut text = format!("[민원] {} ({})", node.title(), key);

        let excerpt = self.excerpt(node);
        if !excerpt.is_empty() {
            let _ = write!(text, "\n{}", excerpt);
        }
        if !linked.is_empty() {
            let titles: Vec<&str> = linked.iter().map(|d| d.node.title()).collect();
            let _ = write!(text, "\n관련 공문서: {}", titles.join(", "));
        }
        text
    }

    /// Every node the retrieval reached, one entry per key at its best path score,
    /// best first. Equal scores keep retrieval order.
    pub fn collect_entries(&self, retrieval: &Retrieval) -> Vec<ContextEntry> {
        let mut entries: Vec<ContextEntry> = Vec::new();
        let mut position: HashMap<NodeKey, usize> = HashMap::new();

        let mut offer = |entry: ContextEntry| match position.get(&entry.key) {
            Some(&idx) if entries[idx].score < entry.score => entries[idx] = entry,
            Some(_) => {}
            None => {
                position.insert(entry.key.clone(), entries.len());
                entries.push(entry);
            }
        };

        for expanded in &retrieval.hits {
            let hit = &expanded.hit;
            match &expanded.expansion {
                Expansion::Document(facts) => offer(ContextEntry {
                    key: hit.key.clone(),
                    source: SourceType::Document,
                    title: hit.node.title().to_string(),
                    score: hit.score,
                    text: self.render_document(&hit.key, &hit.node, facts),
                }),
                Expansion::Complaint(linked) => {
                    offer(ContextEntry {
                        key: hit.key.clone(),
                        source: SourceType::Complaint,
                        title: hit.node.title().to_string(),
                        score: hit.score,
                        text: self.render_complaint(&hit.key, &hit.node, linked),
                    });
                    for doc in linked {
                        offer(ContextEntry {
                            key: doc.key.clone(),
                            source: SourceType::Document,
                            title: doc.node.title().to_string(),
                            score: hit.score * doc.link_score,
                            text: self.render_document(&doc.key, &doc.node, &doc.facts),
                        });
                    }
                }
            }
        }

        entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        entries
    }

    /// Keeps the longest best-first prefix of entries that fits the character budget.
    pub fn assemble(&self, retrieval: &Retrieval) -> AssembledContext {
        let entries = self.collect_entries(retrieval);
        let entries_total = entries.len();

        let mut text = String::new();
        let mut used = 0usize;
        let mut sources = Vec::new();

        for entry in &entries {
            let separator = if sources.is_empty() { 0 } else { ENTRY_SEPARATOR.len() };
            let cost = separator + entry.char_len();
            if used + cost > self.max_context_chars {
                debug!("Context budget reached at {} ({} chars used)", entry.key, used);
                break;
            }
            if separator > 0 {
                text.push_str(ENTRY_SEPARATOR);
            }
            text.push_str(&entry.text);
            used += cost;
            sources.push(SourceCitation::from(entry));
        }

        let entries_dropped = entries_total - sources.len();
        info!(
            "Context assembled: {}/{} entries, {} chars (limit {})",
            sources.len(),
            entries_total,
            used,
            self.max_context_chars
        );

        AssembledContext {
            text,
            sources,
            entries_total,
            entries_dropped,
        }
    }
}
