//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use serde::{Deserialize, Serialize};

use crate::value::Value;

// == Cache Entry ==
/// A cached value plus its absolute expiration time.
///
/// Serialized as `{"value": ..., "expireAt": <unix ms>}`, which is also the
/// shape returned by redirected `fetch` reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The stored value
    #[serde(default)]
    pub value: Value,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<i64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry expiring `ttl_seconds` from now.
    pub fn with_ttl(value: Value, ttl_seconds: u64) -> Self {
        let ttl_ms = i64::try_from(ttl_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        Self {
            value,
            expire_at: Some(current_timestamp_ms().saturating_add(ttl_ms)),
        }
    }

    /// Creates an entry that never expires.
    pub fn persistent(value: Value) -> Self {
        Self {
            value,
            expire_at: None,
        }
    }

    // == Is Expired ==
    /// Checks if the entry's expiration lies strictly before `now_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        match self.expire_at {
            Some(expire_at) => now_ms > expire_at,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expire_at.map(|expire_at| {
            let now = current_timestamp_ms();
            u64::try_from(expire_at.saturating_sub(now)).unwrap_or(0)
        })
    }

    /// The `{value, expireAt}` wrapper as a plain value.
    pub fn to_wrapper(&self) -> Value {
        let mut wrapper = std::collections::BTreeMap::new();
        wrapper.insert("value".to_string(), self.value.clone());
        if let Some(expire_at) = self.expire_at {
            wrapper.insert("expireAt".to_string(), Value::from(expire_at));
        }
        Value::Object(wrapper)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
