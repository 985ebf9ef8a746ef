pub mod config;
pub mod models;
pub mod phases;
pub mod retriever;

pub use config::RetrievalConfig;
pub use models::{
    CitedDocument, Coverage, DocumentFacts, ExpandedHit, Expansion, Hit, LinkedDocument, Retrieval, SourceType,
};
pub use retriever::HybridRetriever;
