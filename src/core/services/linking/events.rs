use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCreatedEvent {
    pub complaint_id: String,

    pub document_id: String,

    pub score: f64,

    /// 0-based position in the complaint's candidate ranking.
    pub rank: usize,

    pub correlation_id: Option<String>,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkingCompleteEvent {
    pub report: LinkReport,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LinkerEvent {
    LinkCreated(LinkCreatedEvent),
    Complete(LinkingCompleteEvent),
}


/// Outcome of one full linker run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkReport {
    pub complaints_total: usize,

    pub complaints_linked: usize,

    /// No embeddable text, or the embedding provider failed.
    pub complaints_skipped: usize,

    /// Store errors while replacing the complaint's edges.
    pub complaints_failed: usize,

    pub edges_created: usize,

    pub started_at: DateTime<Utc>,

    pub duration_ms: f64,

    pub correlation_id: Option<String>,
}
