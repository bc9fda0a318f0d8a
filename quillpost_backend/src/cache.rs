//! Whole-response cache for the landing page.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Cache key for the unpaginated global feed render. Keyed by the feed
/// identity only, never by viewer or page number.
pub const INDEX_CACHE_KEY: &str = "index_page";

struct CacheEntry {
    body: String,
    stored_at: Instant,
}

/// Short-TTL map of rendered response bodies. Writes are
/// last-writer-wins; entries are idempotent renders, so nothing beyond
/// the mutex is needed.
#[derive(Clone)]
pub struct PageCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Returns the stored body if it is still within the TTL window.
    /// Expired entries are dropped on the way out.
    pub fn get(&self, key: &str) -> Option<String> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: &str, body: String) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.insert(
            key.to_string(),
            CacheEntry {
                body,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops every entry; the next request recomputes.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
