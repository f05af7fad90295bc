//! Fingerprint-keyed read-through cache.
//!
//! The cache is a best-effort accelerator: every operation is infallible
//! from the caller's point of view, and the application must function
//! (slower) with the cache absent. Values are stored as JSON strings so the
//! same entry shape works for any serialisable result set.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default entry TTL when the caller does not pass one (1 hour).
pub const DEFAULT_TTL_SECS: u64 = 3_600;

/// Maximum number of live entries before insertion evicts.
const DEFAULT_MAX_SIZE: usize = 10_000;

/// Derive a cache key from a prefix and a canonical JSON of the request
/// parameters: sorted-key serialisation, hashed, truncated to 12 hex chars.
pub fn fingerprint_key<T: serde::Serialize>(prefix: &str, params: &T) -> String {
    // serde_json::Value with a BTreeMap backing sorts object keys.
    let canonical = serde_json::to_value(params)
        .ok()
        .and_then(|v| serde_json::to_string(&sort_value(v)).ok())
        .unwrap_or_default();
    let digest = blake3::hash(canonical.as_bytes());
    let hex = digest.to_hex();
    format!("{}:{}", prefix, &hex.as_str()[..12])
}

fn sort_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, serde_json::Value> = map
                .into_iter()
                .map(|(k, v)| (k, sort_value(v)))
                .collect();
            serde_json::to_value(sorted).unwrap_or(serde_json::Value::Null)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_value).collect())
        }
        other => other,
    }
}

/// Best-effort cache abstraction. Implementations must never fail a request:
/// a miss, an eviction, or a broken backend all just return `None` / no-op.
pub trait Cache: Send + Sync {
    /// Get a raw JSON value. `None` on miss, expiry, or backend error.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value with a TTL in seconds.
    fn set(&self, key: &str, value: String, ttl_secs: u64);

    fn delete(&self, key: &str);

    /// Remove all keys starting with `prefix`. Returns the count removed.
    fn clear_prefix(&self, prefix: &str) -> usize;

    /// Whether the backend is live. A disabled cache misses everything.
    fn enabled(&self) -> bool {
        true
    }
}

/// Typed convenience wrappers over the raw string interface.
pub fn get_json<T: serde::de::DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    cache
        .get(key)
        .and_then(|raw| serde_json::from_str(&raw).ok())
}

pub fn set_json<T: serde::Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl_secs: u64) {
    if let Ok(raw) = serde_json::to_string(value) {
        cache.set(key, raw, ttl_secs);
    }
}

// ── In-process implementation ─────────────────────────────────────────────────

struct Entry {
    value: String,
    inserted_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// TTL map with max-size eviction. Expired entries are dropped lazily on read
/// and swept when insertion hits the size cap.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    max_size: usize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if !entry.expired() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: String, ttl_secs: u64) {
        let mut entries = self.lock();
        if entries.len() >= self.max_size {
            entries.retain(|_, e| !e.expired());
        }
        if entries.len() >= self.max_size {
            // Still full of live entries: drop the oldest.
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: Instant::now(),
                ttl: Duration::from_secs(ttl_secs),
            },
        );
    }

    fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    fn clear_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        before - entries.len()
    }
}

/// A cache that caches nothing. Used when no backend is configured; the
/// application degrades to computing every result.
pub struct DisabledCache;

impl Cache for DisabledCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }
    fn set(&self, _key: &str, _value: String, _ttl_secs: u64) {}
    fn delete(&self, _key: &str) {}
    fn clear_prefix(&self, _prefix: &str) -> usize {
        0
    }
    fn enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let cache = MemoryCache::new();
        cache.set("search:abc", "[1,2]".into(), 60);
        assert_eq!(cache.get("search:abc").as_deref(), Some("[1,2]"));
        assert_eq!(cache.get("search:missing"), None);
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn clear_prefix_removes_only_matching_keys() {
        let cache = MemoryCache::new();
        cache.set("search:a", "1".into(), 60);
        cache.set("search:b", "2".into(), 60);
        cache.set("skill_recommend:a", "3".into(), 60);
        cache.set("msg_notify:u:c", "1".into(), 60);

        assert_eq!(cache.clear_prefix("search:"), 2);
        assert_eq!(cache.get("search:a"), None);
        assert!(cache.get("skill_recommend:a").is_some());
        assert!(cache.get("msg_notify:u:c").is_some());
    }

    #[test]
    fn max_size_evicts_oldest() {
        let cache = MemoryCache::with_max_size(3);
        cache.set("a", "1".into(), 60);
        cache.set("b", "2".into(), 60);
        cache.set("c", "3".into(), 60);
        cache.set("d", "4".into(), 60);
        assert!(cache.get("d").is_some());
        let live = ["a", "b", "c", "d"]
            .iter()
            .filter(|k| cache.get(k).is_some())
            .count();
        assert_eq!(live, 3);
    }

    #[test]
    fn fingerprint_is_order_insensitive() {
        let a = serde_json::json!({"query": "guitar", "limit": 10, "mode": "offers"});
        let b = serde_json::json!({"mode": "offers", "limit": 10, "query": "guitar"});
        assert_eq!(fingerprint_key("search", &a), fingerprint_key("search", &b));

        let c = serde_json::json!({"query": "piano", "limit": 10, "mode": "offers"});
        assert_ne!(fingerprint_key("search", &a), fingerprint_key("search", &c));
    }

    #[test]
    fn fingerprint_has_short_suffix() {
        let key = fingerprint_key("search", &serde_json::json!({"q": 1}));
        let (prefix, hash) = key.split_once(':').unwrap();
        assert_eq!(prefix, "search");
        assert_eq!(hash.len(), 12);
    }

    #[test]
    fn disabled_cache_misses_everything() {
        let cache = DisabledCache;
        cache.set("k", "v".into(), 60);
        assert_eq!(cache.get("k"), None);
        assert!(!cache.enabled());
    }
}
