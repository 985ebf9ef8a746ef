use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{PolicyGraphError, Result};
use super::search_modes::SearchMode;

const CONFIG_FILE_STEM: &str = "policygraph";
const ENV_PREFIX: &str = "POLICYGRAPH";


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyGraphConfig {

    /// `helix` or `memory` (loads `seed_path`).
    pub store_backend: String,
    pub seed_path: Option<String>,
    pub helix_host: String,
    pub helix_port: u16,
    pub helix_api_key: Option<String>,
    pub store_timeout_secs: u64,


    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_timeout_secs: u64,
    pub embedding_cache_size: usize,
    pub embedding_cache_ttl_secs: u64,


    pub embedding_fallback_enabled: bool,
    pub embedding_fallback_url: String,
    pub embedding_fallback_model: String,


    pub llm_provider: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_temperature: f64,
    pub generation_timeout_secs: u64,


    pub llm_fallback_enabled: bool,
    pub llm_fallback_url: String,
    pub llm_fallback_model: String,


    pub search_mode: SearchMode,
    pub document_top_k: Option<usize>,
    pub complaint_top_k: Option<usize>,
    pub min_hit_score: f64,
    pub max_context_chars: Option<usize>,
    pub content_excerpt_chars: usize,
    pub use_hyde: bool,


    pub link_top_k: usize,
    pub link_min_score: Option<f64>,
}

impl Default for PolicyGraphConfig {
    fn default() -> Self {
        Self {
            store_backend: "helix".to_string(),
            seed_path: None,
            helix_host: "localhost".to_string(),
            helix_port: crate::DEFAULT_HELIX_PORT,
            helix_api_key: None,
            store_timeout_secs: 10,

            embedding_provider: "openai".to_string(),
            embedding_model: crate::DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_url: crate::DEFAULT_OPENAI_URL.to_string(),
            embedding_api_key: None,
            embedding_timeout_secs: 30,
            embedding_cache_size: crate::DEFAULT_CACHE_SIZE,
            embedding_cache_ttl_secs: crate::DEFAULT_CACHE_TTL,

            embedding_fallback_enabled: false,
            embedding_fallback_url: crate::DEFAULT_OLLAMA_URL.to_string(),
            embedding_fallback_model: "nomic-embed-text".to_string(),

            llm_provider: "openai".to_string(),
            llm_model: crate::DEFAULT_LLM_MODEL.to_string(),
            llm_api_key: None,
            llm_base_url: None,
            llm_temperature: 0.2,
            generation_timeout_secs: 60,

            llm_fallback_enabled: false,
            llm_fallback_url: crate::DEFAULT_OLLAMA_URL.to_string(),
            llm_fallback_model: "llama3.1:8b".to_string(),

            search_mode: SearchMode::default(),
            document_top_k: None,
            complaint_top_k: None,
            min_hit_score: 0.6,
            max_context_chars: None,
            content_excerpt_chars: 600,
            use_hyde: false,

            link_top_k: crate::DEFAULT_LINK_TOP_K,
            link_min_score: None,
        }
    }
}

impl PolicyGraphConfig {

    /// `policygraph.{toml,yaml,json}` in the working directory (optional), then
    /// `POLICYGRAPH_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }


    pub fn load_from(path: Option<&str>) -> Result<Self> {
        let file = config::File::with_name(path.unwrap_or(CONFIG_FILE_STEM)).required(path.is_some());

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;

        debug!(
            "Config loaded: helix={}, embedding={}/{}, llm={}/{}, mode={}",
            config.helix_base_url(),
            config.embedding_provider,
            config.embedding_model,
            config.llm_provider,
            config.llm_model,
            config.search_mode
        );

        Ok(config)
    }


    pub fn validate(&self) -> Result<()> {
        for (name, raw) in [
            ("embedding_url", Some(self.embedding_url.as_str())),
            ("embedding_fallback_url", Some(self.embedding_fallback_url.as_str())),
            ("llm_fallback_url", Some(self.llm_fallback_url.as_str())),
            ("llm_base_url", self.llm_base_url.as_deref()),
        ] {
            if let Some(raw) = raw {
                url::Url::parse(raw)
                    .map_err(|e| PolicyGraphError::Config(format!("{name} is not a valid URL ({raw}): {e}")))?;
            }
        }

        match self.store_backend.as_str() {
            "helix" => {}
            "memory" if self.seed_path.is_some() => {}
            "memory" => return Err(PolicyGraphError::Config("store_backend=memory requires seed_path".into())),
            other => return Err(PolicyGraphError::Config(format!("unknown store_backend: {other}"))),
        }
        if self.helix_host.trim().is_empty() {
            return Err(PolicyGraphError::Config("helix_host must not be empty".into()));
        }
        if self.link_top_k == 0 {
            return Err(PolicyGraphError::Config("link_top_k must be at least 1".into()));
        }
        if self.document_top_k == Some(0) || self.complaint_top_k == Some(0) {
            return Err(PolicyGraphError::Config("per-index top_k must be at least 1".into()));
        }
        if self.max_context_chars == Some(0) || self.content_excerpt_chars == 0 {
            return Err(PolicyGraphError::Config("context bounds must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.min_hit_score) {
            return Err(PolicyGraphError::Config("min_hit_score must be within [0, 1]".into()));
        }
        if let Some(score) = self.link_min_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(PolicyGraphError::Config("link_min_score must be within [0, 1]".into()));
            }
        }

        Ok(())
    }


    pub fn helix_base_url(&self) -> String {
        format!("http://{}:{}", self.helix_host, self.helix_port)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}
