//! Cache Store Module
//!
//! TTL-backed key-value mapping, independent of the persisted document.

use std::collections::{BTreeMap, HashMap};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::CacheEntry;
use crate::value::Value;

// == Cache Store ==
/// In-memory cache with per-entry expiration and an enable/disable switch.
///
/// Expired entries are never returned by reads, even before a sweep has
/// removed them.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Whether generic reads are redirected to the cache
    enabled: bool,
    /// TTL in seconds used by `set`
    default_ttl: u64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty, disabled cache.
    ///
    /// # Arguments
    /// * `default_ttl` - TTL in seconds for entries set without an explicit TTL
    pub fn new(default_ttl: u64) -> Self {
        Self {
            entries: HashMap::new(),
            enabled: false,
            default_ttl,
        }
    }

    // == Set ==
    /// Stores `value` under `key`, expiring `ttl_seconds` from now.
    ///
    /// Overwrites any existing entry and its expiration.
    pub fn set_with_ttl(&mut self, key: String, value: Value, ttl_seconds: u64) {
        self.entries.insert(key, CacheEntry::with_ttl(value, ttl_seconds));
    }

    /// Stores `value` with the default TTL.
    pub fn set(&mut self, key: String, value: Value) {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    // == Get ==
    /// Returns the unwrapped value if present and not expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = current_timestamp_ms();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
    }

    /// Returns the raw entry, expired or not.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Delete ==
    /// Removes an entry. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Sweep ==
    /// Removes every entry whose expiration lies before `now_ms`.
    ///
    /// Returns the removed keys.
    pub fn sweep_expired(&mut self, now_ms: i64) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now_ms))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
        }

        expired
    }

    // == Snapshot ==
    /// Live entries as `{value, expireAt}` wrapper objects.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let now = current_timestamp_ms();
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.to_wrapper()))
            .collect()
    }

    /// All entries, including expired ones not yet swept.
    pub fn entries(&self) -> &HashMap<String, CacheEntry> {
        &self.entries
    }

    /// Replaces every entry, keeping the serialized expirations as-is.
    pub fn replace_entries(&mut self, entries: HashMap<String, CacheEntry>) {
        self.entries = entries;
    }

    // == Toggle ==
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disables the cache and drops all entries.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.entries.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    // == Length ==
    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(60)
    }
}
