pub mod expansion;
pub mod merge;
pub mod vector;

pub use expansion::{document_facts, graph_expansion_phase, linked_documents};
pub use merge::merge_hits;
pub use vector::{IndexHits, vector_search_phase};
