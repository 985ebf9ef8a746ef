pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod search_modes;
pub mod services;

pub use config::PolicyGraphConfig;
pub use engine::{Confidence, PolicyGraphEngine, SearchOptions, SearchResponse};
pub use error::{PolicyGraphError, Result, Upstream};
pub use search_modes::{SearchMode, SearchModeDefaults};
pub use services::{LinkReport, LinkerEvent, SimilarityLinker};
