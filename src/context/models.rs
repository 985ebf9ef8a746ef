use serde::{Deserialize, Serialize};

use crate::graph::NodeKey;
use crate::retrieval::SourceType;


/// One node rendered together with its attached facts. Entries are the unit of
/// budgeting: an entry is either in the context whole or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub key: NodeKey,
    pub source: SourceType,
    pub title: String,
    pub score: f64,
    pub text: String,
}

impl ContextEntry {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub id: String,
    pub title: String,
    pub score: f64,
}

impl From<&ContextEntry> for SourceCitation {
    fn from(entry: &ContextEntry) -> Self {
        Self {
            source_type: entry.source,
            id: entry.key.id.clone(),
            title: entry.title.clone(),
            score: entry.score,
        }
    }
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    /// Citations for exactly the entries present in `text`, best first.
    pub sources: Vec<SourceCitation>,
    pub entries_total: usize,
    pub entries_dropped: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
