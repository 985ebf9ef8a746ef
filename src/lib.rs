pub mod context;
pub mod core;
pub mod db;
pub mod graph;
pub mod llm;
pub mod mcp;
pub mod retrieval;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use utils::{normalize_id, safe_truncate, safe_truncate_ellipsis};


pub use core::config::PolicyGraphConfig;
pub use core::engine::{PolicyGraphEngine, SearchOptions, SearchResponse};
pub use core::error::{PolicyGraphError, Result, Upstream};
pub use db::{HelixClient, HelixClientError};
pub use graph::{GraphStore, InMemoryGraphStore, Node, NodeKey, NodeLabel, RelationType};
pub use llm::embeddings::{EmbeddingGenerator, EmbeddingProvider};


pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";


pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";


pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";


pub const DEFAULT_LLM_MODEL: &str = "gpt-4o";


pub const DEFAULT_HELIX_PORT: u16 = 6969;


pub const DEFAULT_CACHE_SIZE: usize = 1000;


pub const DEFAULT_CACHE_TTL: u64 = 300;


/// Number of RELATED_TO edges kept per complaint.
pub const DEFAULT_LINK_TOP_K: usize = 5;
