//! Cache Module
//!
//! In-memory key-value cache with per-entry TTL expiration, decoupled from
//! the persisted store document.

use std::sync::{Arc, RwLock};

mod entry;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use store::CacheStore;

/// Cache handle shared between a database and its sweep task
pub type SharedCache = Arc<RwLock<CacheStore>>;
