//! TTL cache for aggregate results.
//!
//! One mutex guards the whole map and stays held across a compute on
//! miss. Aggregate recomputation takes seconds; serving a dogpile of
//! identical recomputations in parallel would be strictly worse than
//! serializing them, so concurrent readers of a cold key wait for the
//! first one to fill it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::Value;

struct CacheEntry {
    value: Value,
    created: Instant,
}

pub struct AggregateCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl AggregateCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Return the cached value for `key`, computing and storing it when
    /// absent or expired. A failed compute leaves the cache untouched, so
    /// a stale-but-expired entry is replaced only by a successful one.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> Result<Value>
    where
        F: FnOnce() -> Result<Value>,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(key) {
            if entry.created.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }
        let value = compute()?;
        log::debug!("[serve::cache] filled entry '{key}'");
        entries.insert(key.to_string(), CacheEntry { value: value.clone(), created: Instant::now() });
        Ok(value)
    }

    /// Drop one entry so the next read recomputes.
    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }
}
