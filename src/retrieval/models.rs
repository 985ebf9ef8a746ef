use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::graph::{Node, NodeKey, NodeLabel};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum SourceType {
    Document,
    Complaint,
}

impl SourceType {
    pub fn from_label(label: NodeLabel) -> Option<Self> {
        match label {
            NodeLabel::Document => Some(Self::Document),
            NodeLabel::Complaint => Some(Self::Complaint),
            NodeLabel::Person | NodeLabel::Department => None,
        }
    }
}


/// One nearest-neighbor result after the cross-index merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub key: NodeKey,
    pub source: SourceType,
    pub score: f64,
    pub node: Node,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedDocument {
    pub key: NodeKey,
    pub title: String,
}


/// Accountability facts attached to a Document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFacts {
    pub author: Option<String>,
    pub department: Option<String>,
    pub citations: Vec<CitedDocument>,
}


/// A Document reached through a Complaint's RELATED_TO edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedDocument {
    pub key: NodeKey,
    pub node: Node,
    pub link_score: f64,
    pub facts: DocumentFacts,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expansion {
    Document(DocumentFacts),
    Complaint(Vec<LinkedDocument>),
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedHit {
    pub hit: Hit,
    pub expansion: Expansion,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Coverage {
    #[default]
    Full,
    Partial,
}


/// Everything retrieval produced for one question. `notes` explain any lost coverage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Retrieval {
    pub hits: Vec<ExpandedHit>,
    pub notes: Vec<String>,
}

impl Retrieval {
    pub fn coverage(&self) -> Coverage {
        if self.notes.is_empty() {
            Coverage::Full
        } else {
            Coverage::Partial
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
