use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};


/// Embedding cache keyed by a digest of (model, text).
pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    stats: Mutex<CacheStats>,
}

struct CacheEntry {
    embedding: Vec<f32>,
    created_at: Instant,
}

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl EmbeddingCache {

    pub fn new(max_size: usize, ttl_secs: u64) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::from_secs(ttl_secs),
            stats: Mutex::new(CacheStats::default()),
        }
    }


    pub fn key(model: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }


    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let mut entries = self.entries.lock();
        let mut stats = self.stats.lock();

        let fresh = match entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => Some(entry.embedding.clone()),
            Some(_) => None,
            None => {
                stats.misses += 1;
                return None;
            }
        };

        match fresh {
            Some(embedding) => {
                stats.hits += 1;
                Some(embedding)
            }
            None => {
                entries.pop(key);
                stats.expired += 1;
                stats.misses += 1;
                None
            }
        }
    }


    pub fn set(&self, key: String, embedding: Vec<f32>) {
        self.entries.lock().put(
            key,
            CacheEntry {
                embedding,
                created_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }
}
