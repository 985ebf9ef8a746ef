pub mod linking;

pub use linking::{LinkReport, LinkerEvent, SimilarityLinker};
