//! Bounded, time-expiring cache of processed image bytes.
//!
//! Entries are keyed by source path plus transform tag (see [`cache_key`]).
//! Expired entries are dropped lazily on lookup and swept on every insert;
//! when the cache is still full after the sweep, the least recently
//! accessed entries are evicted.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::params::EnhanceSettings;
use crate::pipeline::TransformKind;

/// Default number of entries.
pub const DEFAULT_CAPACITY: usize = 50;

/// Default time-to-live, in seconds.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Longest time-to-live accepted from configuration: one week.
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Cache tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries.
    pub capacity: usize,
    /// Seconds an entry stays fresh after it was written.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Key for one variant of one source image.
///
/// Distinct paths always give distinct keys, including paths that are not
/// valid UTF-8 (see [`path_key`]).
pub fn cache_key(path: &Path, kind: &TransformKind, settings: &EnhanceSettings) -> String {
    format!("{}::{}", path_key(path), kind.cache_tag(settings))
}

/// Lossless text form of a path.
///
/// Backslashes are doubled and bytes that aren't valid UTF-8 are written
/// as `\xNN`, so the mapping stays injective.
fn path_key(path: &Path) -> Cow<'_, str> {
    match path.to_str() {
        Some(text) if !text.contains('\\') => Cow::Borrowed(text),
        _ => {
            let mut key = String::new();
            for chunk in path.as_os_str().as_encoded_bytes().utf8_chunks() {
                key.push_str(&chunk.valid().replace('\\', "\\\\"));
                for byte in chunk.invalid() {
                    let _ = write!(key, "\\x{:02x}", byte);
                }
            }
            Cow::Owned(key)
        }
    }
}

struct CacheEntry {
    data: Arc<[u8]>,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
    last_accessed_at: Instant,
    /// Tie breaker for entries touched at the same instant.
    access_seq: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

impl CacheState {
    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                tracing::debug!(key = %key, "Cache entry expired");
            }
            keep
        });
        before - self.entries.len()
    }

    fn evict_lru(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.last_accessed_at, entry.access_seq))
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                self.entries.remove(&key);
                tracing::debug!(key = %key, "Cache entry evicted");
                true
            }
            None => false,
        }
    }
}

/// Thread-safe processed-result cache.
///
/// Values are shared `Arc<[u8]>` buffers, so a reader always sees a whole
/// entry and a hit never copies image bytes. Lookups never fail: a missing
/// or expired key is simply `None`.
pub struct ProcessedImageCache {
    capacity: usize,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl ProcessedImageCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            ttl: config.ttl(),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // Every operation leaves the map consistent before it can panic, so a
    // poisoned lock still guards valid state.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a key, refreshing its access time on a hit.
    pub fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        self.get_at(key, Instant::now())
    }

    /// [`get`](Self::get) with an explicit clock.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<Arc<[u8]>> {
        let mut state = self.lock();

        let expired = match state.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                tracing::debug!(key, "Cache miss");
                return None;
            }
        };
        if expired {
            state.entries.remove(key);
            tracing::debug!(key, "Cache miss (expired)");
            return None;
        }

        let seq = state.bump_seq();
        let entry = state.entries.get_mut(key)?;
        entry.last_accessed_at = now;
        entry.access_seq = seq;
        tracing::debug!(key, "Cache hit");
        Some(Arc::clone(&entry.data))
    }

    /// Insert or replace an entry.
    pub fn set(&self, key: impl Into<String>, data: impl Into<Arc<[u8]>>) {
        self.set_at(key, data, Instant::now());
    }

    /// [`set`](Self::set) with an explicit clock.
    ///
    /// Expired entries are swept first. Replacing an existing key never
    /// evicts another entry; a new key evicts least recently accessed
    /// entries until one slot is free.
    pub fn set_at(&self, key: impl Into<String>, data: impl Into<Arc<[u8]>>, now: Instant) {
        let key = key.into();
        let mut state = self.lock();

        state.purge_expired(now);

        if !state.entries.contains_key(&key) {
            while state.entries.len() >= self.capacity {
                if !state.evict_lru() {
                    break;
                }
            }
        }

        let seq = state.bump_seq();
        tracing::debug!(key = %key, "Cache store");
        state.entries.insert(
            key,
            CacheEntry {
                data: data.into(),
                expires_at: now.checked_add(self.ttl),
                last_accessed_at: now,
                access_seq: seq,
            },
        );
    }

    /// Whether a fresh entry exists, without touching its access time.
    pub fn contains(&self, key: &str) -> bool {
        self.contains_at(key, Instant::now())
    }

    pub fn contains_at(&self, key: &str, now: Instant) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.lock().purge_expired(Instant::now())
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }
}

impl Default for ProcessedImageCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn small_cache() -> ProcessedImageCache {
        ProcessedImageCache::new(CacheConfig {
            capacity: 2,
            ttl_secs: 1,
        })
    }

    fn bytes(value: u8) -> Vec<u8> {
        vec![value; 4]
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 50);
        assert_eq!(config.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_get_after_set() {
        let cache = ProcessedImageCache::default();
        cache.set("a", bytes(1));
        assert_eq!(cache.get("a").as_deref(), Some(&bytes(1)[..]));
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_third_insert_evicts_least_recently_inserted() {
        let cache = small_cache();
        let t0 = Instant::now();

        cache.set_at("A", bytes(1), t0);
        cache.set_at("B", bytes(2), t0 + Duration::from_millis(10));
        cache.set_at("C", bytes(3), t0 + Duration::from_millis(20));

        let now = t0 + Duration::from_millis(30);
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains_at("A", now));
        assert!(cache.contains_at("B", now));
        assert!(cache.contains_at("C", now));
    }

    #[test]
    fn test_access_protects_entry_from_eviction() {
        let cache = small_cache();
        let t0 = Instant::now();

        cache.set_at("A", bytes(1), t0);
        cache.set_at("B", bytes(2), t0 + Duration::from_millis(10));
        assert!(cache.get_at("A", t0 + Duration::from_millis(15)).is_some());
        cache.set_at("C", bytes(3), t0 + Duration::from_millis(20));

        let now = t0 + Duration::from_millis(30);
        assert!(cache.contains_at("A", now));
        assert!(!cache.contains_at("B", now));
        assert!(cache.contains_at("C", now));
    }

    #[test]
    fn test_same_instant_uses_insertion_order() {
        let cache = small_cache();
        let t0 = Instant::now();

        cache.set_at("A", bytes(1), t0);
        cache.set_at("B", bytes(2), t0);
        cache.set_at("C", bytes(3), t0);

        assert!(!cache.contains_at("A", t0));
        assert!(cache.contains_at("B", t0));
    }

    #[test]
    fn test_everything_expires_after_ttl() {
        let cache = small_cache();
        let t0 = Instant::now();

        cache.set_at("A", bytes(1), t0);
        cache.set_at("B", bytes(2), t0);

        let later = t0 + Duration::from_secs(1);
        assert!(cache.get_at("A", later).is_none());
        assert!(cache.get_at("B", later).is_none());
        // Expired lookups remove the entry
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_sweeps_expired_before_evicting() {
        let cache = small_cache();
        let t0 = Instant::now();

        cache.set_at("A", bytes(1), t0);
        cache.set_at("B", bytes(2), t0 + Duration::from_millis(900));
        // A has expired by now; B is still fresh and must survive
        cache.set_at("C", bytes(3), t0 + Duration::from_millis(1100));

        let now = t0 + Duration::from_millis(1100);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains_at("B", now));
        assert!(cache.contains_at("C", now));
    }

    #[test]
    fn test_replacing_key_does_not_evict() {
        let cache = small_cache();
        let t0 = Instant::now();

        cache.set_at("A", bytes(1), t0);
        cache.set_at("B", bytes(2), t0);
        cache.set_at("A", bytes(9), t0 + Duration::from_millis(5));

        let now = t0 + Duration::from_millis(10);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains_at("B", now));
        assert_eq!(cache.get_at("A", now).as_deref(), Some(&bytes(9)[..]));
    }

    #[test]
    fn test_contains_does_not_refresh_access() {
        let cache = small_cache();
        let t0 = Instant::now();

        cache.set_at("A", bytes(1), t0);
        cache.set_at("B", bytes(2), t0 + Duration::from_millis(10));
        assert!(cache.contains_at("A", t0 + Duration::from_millis(15)));
        cache.set_at("C", bytes(3), t0 + Duration::from_millis(20));

        assert!(!cache.contains_at("A", t0 + Duration::from_millis(30)));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let cache = ProcessedImageCache::new(CacheConfig {
            capacity: 0,
            ttl_secs: 60,
        });
        cache.set("a", bytes(1));
        cache.set("b", bytes(2));
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn test_clear() {
        let cache = ProcessedImageCache::default();
        cache.set("a", bytes(1));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_key_combines_path_and_tag() {
        let settings = EnhanceSettings::default();
        let path = PathBuf::from("/photos/a.jpg");
        let value = cache_key(&path, &TransformKind::WhiteBalanceValue, &settings);
        let rgb = cache_key(&path, &TransformKind::WhiteBalanceRgb, &settings);

        assert!(value.starts_with("/photos/a.jpg::"));
        assert_ne!(value, rgb);
    }

    #[test]
    fn test_backslash_paths_keep_distinct_keys() {
        let settings = EnhanceSettings::default();
        let kind = TransformKind::WhiteBalanceRgb;
        let escaped = cache_key(Path::new("/photos/a\\xff.jpg"), &kind, &settings);
        let single = cache_key(Path::new("/photos/a\\\\xff.jpg"), &kind, &settings);
        assert_ne!(escaped, single);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_keep_distinct_keys() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let settings = EnhanceSettings::default();
        let kind = TransformKind::WhiteBalanceValue;
        let ff = Path::new(OsStr::from_bytes(b"/photos/a\xff.jpg"));
        let fe = Path::new(OsStr::from_bytes(b"/photos/a\xfe.jpg"));
        // Literal text that looks like the escaped form of `ff`
        let lookalike = Path::new("/photos/a\\xff.jpg");

        let keys = [
            cache_key(ff, &kind, &settings),
            cache_key(fe, &kind, &settings),
            cache_key(lookalike, &kind, &settings),
        ];
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
        assert_ne!(keys[1], keys[2]);
        assert!(keys[0].starts_with("/photos/a\\xff.jpg::"), "{}", keys[0]);
    }

    #[test]
    fn test_ttl_beyond_clock_range_never_expires() {
        let cache = ProcessedImageCache::new(CacheConfig {
            capacity: 4,
            ttl_secs: i64::MAX as u64,
        });
        cache.set("k", vec![1, 2, 3]);
        assert_eq!(cache.get("k").as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(cache.contains("k"));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_concurrent_writers() {
        let cache = Arc::new(ProcessedImageCache::new(CacheConfig {
            capacity: 8,
            ttl_secs: 60,
        }));

        let handles: Vec<_> = (0..4u8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50u8 {
                        let key = format!("{}-{}", worker, i % 5);
                        cache.set(key.clone(), vec![worker; 16]);
                        if let Some(data) = cache.get(&key) {
                            // Never a torn entry
                            assert!(data.iter().all(|&b| b == data[0]));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 8);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: The cache never holds more entries than its capacity.
        #[test]
        fn prop_never_exceeds_capacity(
            capacity in 1usize..8,
            ops in prop::collection::vec((0u8..16, any::<bool>()), 1..100),
        ) {
            let cache = ProcessedImageCache::new(CacheConfig { capacity, ttl_secs: 60 });
            let t0 = Instant::now();
            for (step, (key, is_get)) in ops.into_iter().enumerate() {
                let now = t0 + Duration::from_millis(step as u64);
                let key = key.to_string();
                if is_get {
                    cache.get_at(&key, now);
                } else {
                    cache.set_at(key, vec![0u8], now);
                }
                prop_assert!(cache.len() <= capacity);
            }
        }

        /// Property: The most recent write to a key is always readable.
        #[test]
        fn prop_last_write_visible(keys in prop::collection::vec(0u8..6, 1..40)) {
            let cache = ProcessedImageCache::new(CacheConfig { capacity: 3, ttl_secs: 60 });
            let t0 = Instant::now();
            for (step, key) in keys.into_iter().enumerate() {
                let now = t0 + Duration::from_millis(step as u64);
                cache.set_at(key.to_string(), vec![step as u8], now);
                let got = cache.get_at(&key.to_string(), now);
                prop_assert_eq!(got.as_deref(), Some(&[step as u8][..]));
            }
        }
    }
}
