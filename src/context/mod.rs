pub mod assembler;
pub mod models;

pub use assembler::ContextAssembler;
pub use models::{AssembledContext, ContextEntry, SourceCitation};
