use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use helix_rs::{HelixDB, HelixDBClient, HelixError};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info};


const MAX_ATTEMPTS: u32 = 3;

const INITIAL_BACKOFF_MS: u64 = 100;

const MAX_BACKOFF_MS: u64 = 2_000;


#[derive(Debug, Error)]
pub enum HelixClientError {
    #[error("Query {query} failed: {message}")]
    Query { query: String, message: String },
    #[error("Helix error: {0}")]
    Helix(#[from] HelixError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Query {0} timed out")]
    Timeout(String),
    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}


/// Thin retrying wrapper over the HelixDB SDK. Every query is a named, pre-deployed
/// HelixQL query.
pub struct HelixClient {
    inner: HelixDB,
    connected: AtomicBool,
    base_url: String,
    call_timeout: Duration,
}

impl HelixClient {

    pub fn new(host: &str, port: u16, api_key: Option<&str>, call_timeout: Duration) -> Self {
        let endpoint = format!("http://{}", host);
        let base_url = format!("http://{}:{}", host, port);

        let inner = <HelixDB as HelixDBClient>::new(Some(&endpoint), Some(port), api_key);

        info!("HelixClient created for {}", base_url);

        Self {
            inner,
            connected: AtomicBool::new(false),
            base_url,
            call_timeout,
        }
    }


    pub async fn execute_query<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        let mut last_error = String::new();
        let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);

        for attempt in 1..=MAX_ATTEMPTS {
            debug!("Executing {} (attempt {})", query_name, attempt);

            match self.execute_once::<T, P>(query_name, params).await {
                Ok(result) => {
                    self.connected.store(true, Ordering::Relaxed);
                    return Ok(result);
                }
                Err(e) if is_not_found(&e) => {
                    debug!("Query {} returned not found", query_name);
                    return Err(e);
                }
                Err(e) => {
                    debug!("Query {} failed (attempt {}/{}): {}", query_name, attempt, MAX_ATTEMPTS, e);
                    last_error = e.to_string();
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(Duration::from_millis(MAX_BACKOFF_MS));
                    }
                }
            }
        }

        Err(HelixClientError::RetryExhausted(MAX_ATTEMPTS, last_error))
    }


    pub async fn execute_once<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        match tokio::time::timeout(self.call_timeout, self.inner.query::<P, T>(query_name, params)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(HelixClientError::Query {
                query: query_name.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(HelixClientError::Timeout(query_name.to_string())),
        }
    }


    pub async fn health_check(&self) -> Result<(), HelixClientError> {
        match self.execute_once::<serde_json::Value, _>("health", &serde_json::json!({})).await {
            Ok(_) => Ok(()),
            // A server without a `health` query still answered, which is all we need.
            Err(e) if is_not_found(&e) || e.to_string().contains("404") => {
                info!("Health check passed (server alive, no health query)");
                self.connected.store(true, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}


fn is_not_found(err: &HelixClientError) -> bool {
    let text = err.to_string().to_lowercase();
    text.contains("not found") || text.contains("no value") || text.contains("couldn't find")
}
