use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::protocol::SeriesResponse;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub entity: String,
    pub variable: String,
}

impl CacheKey {
    pub fn new(entity: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            variable: variable.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity, self.variable)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: Arc<SeriesResponse>,
    inserted_at: Instant,
}

/// Process-wide series cache keyed by `entity:variable`.
///
/// Without a TTL entries live for the lifetime of the process; writes for the
/// same key are idempotent so concurrent fills are harmless. `invalidate` and
/// `clear` are the explicit cache-bust hooks.
#[derive(Debug, Default)]
pub struct SeriesCache {
    ttl: Option<Duration>,
    entries: RwLock<BTreeMap<CacheKey, CacheEntry>>,
}

impl SeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<SeriesResponse>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if let Some(ttl) = self.ttl {
            if entry.inserted_at.elapsed() >= ttl {
                return None;
            }
        }
        Some(entry.response.clone())
    }

    pub fn insert(&self, key: CacheKey, response: SeriesResponse) -> Arc<SeriesResponse> {
        let response = Arc::new(response);
        self.entries.write().insert(
            key,
            CacheEntry {
                response: response.clone(),
                inserted_at: Instant::now(),
            },
        );
        response
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
