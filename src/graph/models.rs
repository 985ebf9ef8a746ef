use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::utils::normalize_id;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
pub enum NodeLabel {
    Document,
    Complaint,
    Person,
    Department,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// Person → Document
    Authored,
    /// Person → Department
    BelongsTo,
    /// Document → Document
    Cites,
    /// Complaint → Document, scored
    RelatedTo,
}

impl RelationType {
    /// Expected (source, target) labels.
    pub fn endpoints(&self) -> (NodeLabel, NodeLabel) {
        match self {
            Self::Authored => (NodeLabel::Person, NodeLabel::Document),
            Self::BelongsTo => (NodeLabel::Person, NodeLabel::Department),
            Self::Cites => (NodeLabel::Document, NodeLabel::Document),
            Self::RelatedTo => (NodeLabel::Complaint, NodeLabel::Document),
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
}


/// The two embedding indexes the engine searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorIndex {
    Documents,
    Complaints,
}

impl VectorIndex {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Documents => "document_embedding_index",
            Self::Complaints => "complaint_index",
        }
    }

    pub fn label(&self) -> NodeLabel {
        match self {
            Self::Documents => NodeLabel::Document,
            Self::Complaints => NodeLabel::Complaint,
        }
    }
}

impl fmt::Display for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}


/// Typed node identity. The id is always stored in normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub label: NodeLabel,
    pub id: String,
}

impl NodeKey {
    pub fn new(label: NodeLabel, id: impl AsRef<str>) -> Self {
        Self {
            label,
            id: normalize_id(id.as_ref()),
        }
    }

    pub fn document(id: impl AsRef<str>) -> Self {
        Self::new(NodeLabel::Document, id)
    }

    pub fn complaint(id: impl AsRef<str>) -> Self {
        Self::new(NodeLabel::Complaint, id)
    }

    pub fn person(id: impl AsRef<str>) -> Self {
        Self::new(NodeLabel::Person, id)
    }

    pub fn department(id: impl AsRef<str>) -> Self {
        Self::new(NodeLabel::Department, id)
    }

    /// An id that normalizes to nothing can never resolve.
    pub fn is_resolvable(&self) -> bool {
        !self.id.is_empty()
    }

    /// Parses the `Label:id` form used by the graph overview.
    pub fn parse(raw: &str) -> Option<Self> {
        let (label, id) = raw.split_once(':')?;
        let label = label.trim().parse::<NodeLabel>().ok()?;
        let key = Self::new(label, id);
        key.is_resolvable().then_some(key)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.label, self.id)
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Ids of documents this one references.
    #[serde(default)]
    pub cites: Vec<String>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Complaint {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Complaint {
    /// Text fed to the embedding provider; `None` when there is nothing to embed.
    pub fn embedding_text(&self) -> Option<String> {
        let title = self.title.trim();
        let body = self.body.trim();
        match (title.is_empty(), body.is_empty()) {
            (_, false) => Some(format!("제목: {}\n내용: {}", title, body)),
            (false, true) => Some(title.to_string()),
            (true, true) => None,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub name: String,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "label")]
pub enum Node {
    Document(Document),
    Complaint(Complaint),
    Person(Person),
    Department(Department),
}

impl Node {
    pub fn label(&self) -> NodeLabel {
        match self {
            Self::Document(_) => NodeLabel::Document,
            Self::Complaint(_) => NodeLabel::Complaint,
            Self::Person(_) => NodeLabel::Person,
            Self::Department(_) => NodeLabel::Department,
        }
    }

    pub fn raw_id(&self) -> &str {
        match self {
            Self::Document(d) => &d.id,
            Self::Complaint(c) => &c.id,
            Self::Person(p) => &p.name,
            Self::Department(d) => &d.name,
        }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.label(), self.raw_id())
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Document(d) => &d.title,
            Self::Complaint(c) => &c.title,
            Self::Person(p) => &p.name,
            Self::Department(d) => &d.name,
        }
    }

    /// Long-form text, empty for Person and Department.
    pub fn text(&self) -> &str {
        match self {
            Self::Document(d) => &d.content,
            Self::Complaint(c) => &c.body,
            Self::Person(_) | Self::Department(_) => "",
        }
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            Self::Document(d) => d.embedding.as_deref(),
            Self::Complaint(c) => c.embedding.as_deref(),
            Self::Person(_) | Self::Department(_) => None,
        }
    }

    /// Same node with the identifier rewritten to its normalized form.
    pub fn normalized(mut self) -> Self {
        match &mut self {
            Self::Document(d) => {
                d.id = normalize_id(&d.id);
                d.cites = d.cites.iter().map(|c| normalize_id(c)).filter(|c| !c.is_empty()).collect();
            }
            Self::Complaint(c) => c.id = normalize_id(&c.id),
            Self::Person(p) => p.name = normalize_id(&p.name),
            Self::Department(d) => d.name = normalize_id(&d.name),
        }
        self
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_complaint(&self) -> Option<&Complaint> {
        match self {
            Self::Complaint(c) => Some(c),
            _ => None,
        }
    }
}


/// A node returned by nearest-neighbor search with its similarity in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNode {
    pub node: Node,
    pub score: f64,
}


/// One hop away from a node. `node` is `None` when the edge points at a key the
/// store cannot resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub key: NodeKey,
    pub node: Option<Node>,
    pub score: Option<f64>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEdge {
    pub from: NodeKey,
    pub to: NodeKey,
    pub score: f64,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewNode {
    pub id: String,
    pub label: NodeLabel,
    pub title: String,
    pub preview: String,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub relation: RelationType,
}


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<OverviewNode>,
    pub edges: Vec<OverviewEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_key_normalizes() {
        let key = NodeKey::document(" D-1\u{200B}\n");
        assert_eq!(key.id, "D-1");
        assert_eq!(key.to_string(), "Document:D-1");
        assert_eq!(key, NodeKey::document("D-1"));
    }

    #[test]
    fn test_node_key_ignores_embedded_artifacts() {
        assert_eq!(NodeKey::person("김\u{200B}OO"), NodeKey::person("김OO"));
        assert_eq!(NodeKey::document("D-2023\u{0000}-001"), NodeKey::document("D-2023-001"));
    }

    #[test]
    fn test_node_key_parse() {
        assert_eq!(NodeKey::parse("Complaint:12"), Some(NodeKey::complaint("12")));
        assert_eq!(NodeKey::parse("Person: 김OO "), Some(NodeKey::person("김OO")));
        assert!(NodeKey::parse("Unknown:1").is_none());
        assert!(NodeKey::parse("Document:   ").is_none());
        assert!(NodeKey::parse("no-separator").is_none());
    }

    #[test]
    fn test_relation_type_names() {
        assert_eq!(RelationType::RelatedTo.to_string(), "RELATED_TO");
        assert_eq!(RelationType::BelongsTo.to_string(), "BELONGS_TO");
        assert_eq!("CITES".parse::<RelationType>().ok(), Some(RelationType::Cites));
        let json = serde_json::to_string(&RelationType::Authored).unwrap();
        assert_eq!(json, "\"AUTHORED\"");
    }

    #[test]
    fn test_complaint_embedding_text() {
        let complaint = Complaint {
            id: "1".into(),
            title: "지급 중단".into(),
            body: "서류 미비로 지급이 중단됨".into(),
            embedding: None,
        };
        assert_eq!(
            complaint.embedding_text().as_deref(),
            Some("제목: 지급 중단\n내용: 서류 미비로 지급이 중단됨")
        );

        let title_only = Complaint {
            body: "  ".into(),
            ..complaint.clone()
        };
        assert_eq!(title_only.embedding_text().as_deref(), Some("지급 중단"));

        let empty = Complaint {
            title: String::new(),
            body: String::new(),
            ..complaint
        };
        assert!(empty.embedding_text().is_none());
    }

    #[test]
    fn test_node_tagged_serialization() {
        let node = Node::Person(Person { name: "김OO".into() });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["label"], "Person");
        assert_eq!(json["name"], "김OO");

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back.key(), NodeKey::person("김OO"));
    }

    #[test]
    fn test_normalized_document_drops_blank_citations() {
        let node = Node::Document(Document {
            id: " D-1 ".into(),
            title: "t".into(),
            cites: vec![" D-2".into(), "\u{FEFF}".into()],
            ..Default::default()
        })
        .normalized();

        let doc = node.as_document().unwrap();
        assert_eq!(doc.id, "D-1");
        assert_eq!(doc.cites, vec!["D-2".to_string()]);
    }
}
