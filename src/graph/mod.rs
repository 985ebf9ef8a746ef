pub mod helix;
pub mod memory;
pub mod models;
pub mod similarity;
pub mod store;

pub use helix::HelixGraphStore;
pub use memory::{GraphSeed, InMemoryGraphStore, SeedEdge};
pub use models::{
    Complaint, Department, Direction, Document, GraphSnapshot, Neighbor, Node, NodeKey, NodeLabel,
    OverviewEdge, OverviewNode, Person, RelationType, ScoredEdge, ScoredNode, VectorIndex,
};
pub use similarity::cosine_similarity;
pub use store::GraphStore;
