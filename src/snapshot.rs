//! Snapshot Module
//!
//! Plain JSON exports: document backups and cache dumps.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::cache::CacheEntry;
use crate::error::Result;
use crate::value::Document;

/// Writes `doc` as pretty JSON to `path`. Never encrypted.
pub fn write_document(path: &Path, doc: &Document) -> Result<()> {
    let text = serde_json::to_string_pretty(doc)?;
    fs::write(path, text)?;
    debug!("Document snapshot written to {}", path.display());
    Ok(())
}

/// Writes the raw cache mapping as `{key: {value, expireAt}}`.
pub fn write_cache(path: &Path, entries: &HashMap<String, CacheEntry>) -> Result<()> {
    let text = serde_json::to_string_pretty(entries)?;
    fs::write(path, text)?;
    debug!("{} cache entries written to {}", entries.len(), path.display());
    Ok(())
}

/// Reads a cache dump. Expirations are kept exactly as serialized.
pub fn read_cache(path: &Path) -> Result<HashMap<String, CacheEntry>> {
    let text = fs::read_to_string(path)?;
    let entries: HashMap<String, CacheEntry> = serde_json::from_str(&text)?;
    debug!("{} cache entries read from {}", entries.len(), path.display());
    Ok(entries)
}
