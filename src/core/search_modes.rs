use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};


/// Retrieval breadth presets. Wider modes raise recall at the cost of prompt length.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Focused,
    #[default]
    Balanced,
    Broad,
}

impl SearchMode {
    #[must_use]
    pub fn get_defaults(&self) -> SearchModeDefaults {
        match self {
            Self::Focused => SearchModeDefaults {
                document_top_k: 3,
                complaint_top_k: 2,
                max_context_chars: 6_000,
            },
            Self::Balanced => SearchModeDefaults {
                document_top_k: 4,
                complaint_top_k: 3,
                max_context_chars: 12_000,
            },
            Self::Broad => SearchModeDefaults {
                document_top_k: 5,
                complaint_top_k: 5,
                max_context_chars: 20_000,
            },
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Focused => "Few nearest hits per index, short prompt",
            Self::Balanced => "Moderate hits per index (default)",
            Self::Broad => "Maximum hits per index, long prompt",
        }
    }

    /// Lenient parse: unknown names resolve to the default mode.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        s.trim().parse().unwrap_or_default()
    }
}


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchModeDefaults {
    pub document_top_k: usize,
    pub complaint_top_k: usize,
    pub max_context_chars: usize,
}
