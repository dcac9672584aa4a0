// src/cache/mod.rs

use chrono::Utc;
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tracing::debug;

use crate::record::RawRecord;

/// Entries older than this are evicted on read.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Millisecond wall clock, swappable in tests.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

/// Raw (pre-normalization) rows per dataset and locale.
pub trait RowCache: Send + Sync {
    fn get(&self, dataset_id: &str, locale: &str) -> Option<Vec<RawRecord>>;
    fn set(&self, dataset_id: &str, locale: &str, rows: Vec<RawRecord>);
    /// Drop one locale, or every locale of the dataset when `locale` is `None`.
    fn clear(&self, dataset_id: &str, locale: Option<&str>);
    fn clear_all(&self);
}

pub fn cache_key(dataset_id: &str, locale: &str) -> String {
    format!("{}:{}", dataset_id, locale)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    rows: Vec<RawRecord>,
    stored_at: i64,
    locale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStats {
    pub key: String,
    pub age_ms: i64,
    pub locale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub entries: Vec<EntryStats>,
}

/// In-process TTL cache behind a mutex. Concurrent misses on the same key may
/// both fetch; the last `set` wins.
pub struct MemoryCache<C: Clock = SystemClock> {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl_ms: i64,
    clock: C,
}

impl Default for MemoryCache<SystemClock> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl MemoryCache<SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> MemoryCache<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: ttl.as_millis() as i64,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // Entries stay consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now_millis();
        let map = self.lock();
        let mut entries: Vec<EntryStats> = map
            .iter()
            .map(|(key, e)| EntryStats {
                key: key.clone(),
                age_ms: now - e.stored_at,
                locale: e.locale.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        CacheStats {
            size: map.len(),
            entries,
        }
    }
}

impl<C: Clock> RowCache for MemoryCache<C> {
    fn get(&self, dataset_id: &str, locale: &str) -> Option<Vec<RawRecord>> {
        let key = cache_key(dataset_id, locale);
        let now = self.clock.now_millis();
        let mut map = self.lock();

        let Some(stored_at) = map.get(&key).map(|e| e.stored_at) else {
            debug!(%key, "cache miss");
            return None;
        };
        if now - stored_at <= self.ttl_ms {
            debug!(%key, "cache hit");
            return map.get(&key).map(|e| e.rows.clone());
        }
        map.remove(&key);
        debug!(%key, age_ms = now - stored_at, "cache entry expired");
        None
    }

    fn set(&self, dataset_id: &str, locale: &str, rows: Vec<RawRecord>) {
        let key = cache_key(dataset_id, locale);
        debug!(%key, rows = rows.len(), "cache store");
        let entry = CacheEntry {
            rows,
            stored_at: self.clock.now_millis(),
            locale: locale.to_string(),
        };
        self.lock().insert(key, entry);
    }

    fn clear(&self, dataset_id: &str, locale: Option<&str>) {
        let mut map = self.lock();
        match locale {
            Some(l) => {
                map.remove(&cache_key(dataset_id, l));
            }
            None => {
                let prefix = format!("{}:", dataset_id);
                map.retain(|k, _| !k.starts_with(&prefix));
            }
        }
    }

    fn clear_all(&self) {
        self.lock().clear();
    }
}
