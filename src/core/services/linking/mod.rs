pub mod builder;
pub mod events;

pub use builder::{SimilarityLinker, select_candidates};
pub use events::{LinkCreatedEvent, LinkReport, LinkerEvent, LinkingCompleteEvent};
