use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::config::PolicyGraphConfig;
use crate::core::search_modes::SearchMode;


/// Per-request retrieval knobs: the mode preset with config overrides applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub mode: SearchMode,
    pub document_top_k: usize,
    pub complaint_top_k: usize,
    pub min_hit_score: f64,
    pub max_context_chars: usize,
    pub content_excerpt_chars: usize,
    pub use_hyde: bool,
    #[serde(with = "duration_millis")]
    pub store_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::resolve(&PolicyGraphConfig::default(), None, None)
    }
}

impl RetrievalConfig {

    /// `mode` and `use_hyde` fall back to the process config when not given.
    pub fn resolve(config: &PolicyGraphConfig, mode: Option<SearchMode>, use_hyde: Option<bool>) -> Self {
        let mode = mode.unwrap_or(config.search_mode);
        let defaults = mode.get_defaults();

        Self {
            mode,
            document_top_k: config.document_top_k.unwrap_or(defaults.document_top_k),
            complaint_top_k: config.complaint_top_k.unwrap_or(defaults.complaint_top_k),
            min_hit_score: config.min_hit_score,
            max_context_chars: config.max_context_chars.unwrap_or(defaults.max_context_chars),
            content_excerpt_chars: config.content_excerpt_chars,
            use_hyde: use_hyde.unwrap_or(config.use_hyde),
            store_timeout: config.store_timeout(),
        }
    }
}


mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
