//! Database Module
//!
//! Write-through key-value store with an optional TTL cache in front of reads.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheStore, SharedCache};
use crate::config::StoreConfig;
use crate::crypto::{Cipher, CipherMaterial};
use crate::error::Result;
use crate::logger::{FileLogger, Logger, TracingLogger, DEFAULT_CHANNEL};
use crate::snapshot;
use crate::store::{BackingFile, MathOp, Outcome};
use crate::tasks::{spawn_sweep_task, sweep_once};
use crate::value::{Document, Value};

// == Database ==
/// An in-process key-value store persisted to a single file.
///
/// Every mutation rewrites the whole backing file before returning. Mutations
/// take `&mut self`, so wrap the database in a mutex to share it between
/// threads. The cache lives behind its own lock, shared with the sweep task.
pub struct Database {
    /// Canonical document
    data: Document,
    /// Backing file and cipher
    file: BackingFile,
    /// TTL cache, shared with the sweep task
    cache: SharedCache,
    /// Diagnostic sink
    logger: Arc<dyn Logger>,
    /// Running sweep task, if a tokio runtime was available
    sweeper: Option<JoinHandle<()>>,
    /// Seconds between sweeps
    sweep_interval: u64,
    /// Why the most recent load failed, cleared by a successful load
    load_error: Option<String>,
}

impl Database {
    // == Constructor ==
    /// Opens the store described by `config`.
    ///
    /// Fails only on unusable configuration (bad key/iv length, log file that
    /// cannot be opened). A backing file that cannot be read or decrypted is
    /// logged and leaves the document empty; check
    /// [`Database::last_load_error`] before writing to such a store, since the
    /// next mutation overwrites the file.
    ///
    /// When called inside a tokio runtime, the cache sweep task is started and
    /// runs until [`Database::shutdown`] or drop.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let logger: Arc<dyn Logger> = if config.logs_enabled {
            Arc::new(FileLogger::open(&config.log_filename)?)
        } else {
            Arc::new(TracingLogger)
        };
        Self::with_logger(config, logger)
    }

    /// Opens the store with a caller-supplied diagnostic sink.
    ///
    /// `logs_enabled` and `log_filename` are ignored.
    pub fn with_logger(config: StoreConfig, logger: Arc<dyn Logger>) -> Result<Self> {
        let generated = CipherMaterial::generate(config.algorithm);
        let key = config
            .key
            .clone()
            .unwrap_or_else(|| generated.key().to_vec());
        let iv = config.iv.clone().unwrap_or_else(|| generated.iv().to_vec());
        let material = CipherMaterial::new(key, iv, config.algorithm)?;

        let mut db = Self {
            data: Document::new(),
            file: BackingFile::new(&config.filename, config.encrypt, Cipher::new(material)),
            cache: Arc::new(RwLock::new(CacheStore::new(config.cache_ttl))),
            logger,
            sweeper: None,
            sweep_interval: config.sweep_interval,
            load_error: None,
        };

        // Load failures are logged and kept in `load_error`; the store stays usable.
        let _ = db.load();
        db.start_sweeper();

        Ok(db)
    }

    // == Persistence ==
    /// Reloads the document from the backing file.
    ///
    /// On failure the in-memory document is left as it was.
    pub fn load(&mut self) -> Result<()> {
        match self.file.load() {
            Ok(doc) => {
                self.data = doc;
                self.load_error = None;
                Ok(())
            }
            Err(err) => {
                self.logger
                    .error(&format!("Error loading data: {}", err), DEFAULT_CHANNEL);
                self.load_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Reason the most recent load (including the one in `open`) failed.
    ///
    /// `None` once a load succeeds. A store opened over a file it could not
    /// read starts empty; writing to it replaces that file.
    pub fn last_load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Writes the full document to the backing file.
    pub fn save(&self) -> Result<()> {
        self.file.save(&self.data).map_err(|err| {
            self.logger
                .error(&format!("Error saving data: {}", err), DEFAULT_CHANNEL);
            err
        })
    }

    // == Reads ==
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The persisted document, regardless of cache mode.
    pub fn document(&self) -> &Document {
        &self.data
    }

    // == Primitive Mutations ==
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.data.insert(key.into(), value.into());
        self.save()
    }

    /// Removes `key` if present and persists. Absent keys are not an error.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.data.remove(key);
        self.save()
    }

    /// Clears the whole document and persists the empty document.
    pub fn reset(&mut self) -> Result<()> {
        self.data.clear();
        self.save()
    }

    // == Arithmetic ==
    pub fn add(&mut self, key: &str, n: f64) -> Result<Outcome> {
        self.math(key, MathOp::Add, n)
    }

    pub fn subtract(&mut self, key: &str, n: f64) -> Result<Outcome> {
        self.math(key, MathOp::Subtract, n)
    }

    /// Applies `op` to the number stored at `key`.
    ///
    /// Skipped without a write unless the current value is a number.
    pub fn math(&mut self, key: &str, op: MathOp, n: f64) -> Result<Outcome> {
        match self.data.get_mut(key) {
            Some(Value::Number(current)) => {
                *current = op.apply(*current, n);
                debug!("{} {} {} applied", key, op, n);
            }
            other => {
                let outcome = Outcome::type_mismatch("number", other.map(|v| &*v));
                debug!("{} {} {} skipped", key, op, n);
                return Ok(outcome);
            }
        }
        self.save()?;
        Ok(Outcome::Applied)
    }

    // == Arrays ==
    /// Appends `item` to the array at `key`.
    ///
    /// A missing key starts a new array. Any other non-array value is
    /// discarded and replaced by a new array (`Outcome::Coerced`).
    pub fn push(&mut self, key: impl Into<String>, item: impl Into<Value>) -> Result<Outcome> {
        self.push_array(key, vec![item.into()])
    }

    /// Appends every item, with the same coercion as [`Database::push`].
    pub fn push_array<I, T>(&mut self, key: impl Into<String>, items: I) -> Result<Outcome>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let slot = self
            .data
            .entry(key.into())
            .or_insert_with(|| Value::Array(Vec::new()));

        let mut outcome = Outcome::Applied;
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
            outcome = Outcome::Coerced;
        }
        if let Value::Array(list) = slot {
            list.extend(items.into_iter().map(Into::into));
        }

        self.save()?;
        Ok(outcome)
    }

    /// Removes every element equal to one of `items` from the array at `key`.
    pub fn remove_from_array<I, T>(&mut self, key: &str, items: I) -> Result<Outcome>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let unwanted: Vec<Value> = items.into_iter().map(Into::into).collect();
        match self.data.get_mut(key) {
            Some(Value::Array(list)) => list.retain(|item| !unwanted.contains(item)),
            other => return Ok(Outcome::type_mismatch("array", other.map(|v| &*v))),
        }
        self.save()?;
        Ok(Outcome::Applied)
    }

    // == Encryption ==
    /// Turns encryption on and reloads. The file on disk is not converted.
    pub fn enable_encryption(&mut self) -> Result<()> {
        self.file.set_encrypted(true);
        self.logger.log("Encryption enabled.", DEFAULT_CHANNEL);
        self.load()
    }

    /// Turns encryption off and reloads. The file on disk is not converted.
    pub fn disable_encryption(&mut self) -> Result<()> {
        self.file.set_encrypted(false);
        self.logger.log("Encryption disabled.", DEFAULT_CHANNEL);
        self.load()
    }

    pub fn is_encrypted(&self) -> bool {
        self.file.is_encrypted()
    }

    /// Replaces the key and iv, then reloads.
    ///
    /// Nothing is re-encrypted: a file written under the previous key fails
    /// to load until it is rewritten with [`Database::save`] or the old key
    /// is restored.
    pub fn rotate_key(&mut self, key: Vec<u8>, iv: Vec<u8>) -> Result<()> {
        self.file.cipher_mut().rotate(key, iv)?;
        self.logger.log("Cipher key rotated.", DEFAULT_CHANNEL);
        self.load()
    }

    /// Active key material, e.g. to keep a randomly generated key.
    pub fn material(&self) -> &CipherMaterial {
        self.file.cipher().material()
    }

    pub fn filename(&self) -> &Path {
        self.file.path()
    }

    // == Backup ==
    /// Writes the current document to `path` as plain JSON, never encrypted.
    pub fn backup(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        snapshot::write_document(path, &self.data)?;
        self.logger
            .log(&format!("Backup created as {}", path.display()), DEFAULT_CHANNEL);
        Ok(())
    }

    // == Cache ==
    pub fn enable_cache(&self) {
        self.cache_write().enable();
        self.logger.log("Cache enabled.", DEFAULT_CHANNEL);
    }

    /// Disables the cache and drops every entry.
    pub fn disable_cache(&self) {
        self.cache_write().disable();
        self.logger.log("Cache disabled.", DEFAULT_CHANNEL);
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache_read().is_enabled()
    }

    pub fn set_cache_with_ttl(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ttl_seconds: u64,
    ) {
        let key = key.into();
        self.logger.log(
            &format!(
                "Data with key {} stored in cache with TTL {} seconds",
                key, ttl_seconds
            ),
            DEFAULT_CHANNEL,
        );
        self.cache_write().set_with_ttl(key, value.into(), ttl_seconds);
    }

    /// Caches `value` with the configured default TTL.
    pub fn set_cache(&self, key: impl Into<String>, value: impl Into<Value>) {
        let ttl = self.cache_read().default_ttl();
        self.set_cache_with_ttl(key, value, ttl);
    }

    /// Unwrapped cached value; expired entries are never returned.
    pub fn get_cache(&self, key: &str) -> Option<Value> {
        self.cache_read().get(key)
    }

    pub fn delete_cache(&self, key: &str) -> bool {
        self.cache_write().delete(key)
    }

    pub fn clear_cache(&self) {
        self.cache_write().clear();
    }

    /// Runs one sweep immediately. Returns the number of evicted entries.
    pub fn sweep_cache(&self) -> usize {
        sweep_once(&self.cache, self.logger.as_ref(), current_timestamp_ms())
    }

    /// Generic read: the cache's `{value, expireAt}` wrappers while the cache
    /// is enabled, the persisted document otherwise.
    pub fn fetch(&self) -> Document {
        let cache = self.cache_read();
        if cache.is_enabled() {
            cache.snapshot()
        } else {
            self.data.clone()
        }
    }

    /// Same as [`Database::fetch`].
    pub fn all(&self) -> Document {
        self.fetch()
    }

    /// Dumps the raw cache mapping to `path`.
    pub fn save_cache(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        snapshot::write_cache(path, self.cache_read().entries())?;
        self.logger
            .log(&format!("Cache saved to {}", path.display()), DEFAULT_CHANNEL);
        Ok(())
    }

    /// Replaces the cache with a dump read from `path`.
    ///
    /// Expirations are kept as written; entries already past them are evicted
    /// by the next sweep and hidden from reads until then.
    pub fn load_cache(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let entries = snapshot::read_cache(path)?;
        self.cache_write().replace_entries(entries);
        self.logger
            .log(&format!("Cache loaded from {}", path.display()), DEFAULT_CHANNEL);
        Ok(())
    }

    // == Logging ==
    pub fn log(&self, message: &str, channel: &str) {
        self.logger.log(message, channel);
    }

    pub fn create_log_channel(&self, name: &str) -> Result<()> {
        self.logger.create_channel(name)
    }

    /// Sends diagnostics to append-only files starting at `path`.
    pub fn enable_logs(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let logger = FileLogger::open(path.as_ref())?;
        self.replace_logger(Arc::new(logger));
        Ok(())
    }

    /// Closes every log file and falls back to `tracing` output.
    pub fn disable_logs(&mut self) {
        self.replace_logger(Arc::new(TracingLogger));
    }

    fn replace_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger.close();
        self.logger = logger;
        // The sweep task holds its own logger handle
        if self.sweeper.is_some() {
            self.stop_sweeper();
            self.start_sweeper();
        }
    }

    // == Lifecycle ==
    /// Stops the sweep task and closes log sinks.
    pub fn shutdown(&mut self) {
        self.stop_sweeper();
        self.logger.close();
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn start_sweeper(&mut self) {
        if tokio::runtime::Handle::try_current().is_err() {
            debug!("No tokio runtime available; cache sweep task not started");
            return;
        }
        self.sweeper = Some(spawn_sweep_task(
            self.cache.clone(),
            self.sweep_interval,
            self.logger.clone(),
        ));
    }

    fn stop_sweeper(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
            debug!("Cache sweep task aborted");
        }
    }

    fn cache_read(&self) -> RwLockReadGuard<'_, CacheStore> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_write(&self) -> RwLockWriteGuard<'_, CacheStore> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Skip;
    use std::fs;
    use std::sync::Mutex;

    /// Keeps every line with its severity.
    #[derive(Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<(&'static str, String)>>,
    }

    impl RecordingLogger {
        fn errors(&self) -> Vec<String> {
            self.lines
                .lock()
                .unwrap()
                .iter()
                .filter(|(level, _)| *level == "error")
                .map(|(_, line)| line.clone())
                .collect()
        }
    }

    impl Logger for RecordingLogger {
        fn log(&self, message: &str, _channel: &str) {
            self.lines.lock().unwrap().push(("info", message.to_string()));
        }

        fn error(&self, message: &str, _channel: &str) {
            self.lines.lock().unwrap().push(("error", message.to_string()));
        }
    }

    fn plain_config(dir: &tempfile::TempDir) -> StoreConfig {
        StoreConfig {
            filename: dir.path().join("Trix.json"),
            encrypt: false,
            ..StoreConfig::default()
        }
    }

    #[test]
    fn test_open_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(plain_config(&dir)).unwrap();

        assert!(db.is_empty());
        assert_eq!(fs::read_to_string(dir.path().join("Trix.json")).unwrap(), "{}");
        assert!(!db.is_sweeping());
    }

    #[test]
    fn test_open_rejects_bad_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            key: Some(vec![1u8; 10]),
            ..plain_config(&dir)
        };
        assert!(Database::open(config).is_err());
    }

    #[test]
    fn test_unreadable_file_is_reported_as_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Trix.json"), "not json").unwrap();
        let logger = Arc::new(RecordingLogger::default());

        let mut db = Database::with_logger(plain_config(&dir), logger.clone()).unwrap();

        assert!(db.is_empty());
        assert!(db.last_load_error().is_some());
        let errors = logger.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error loading data:"));

        // A successful reload clears the recorded failure
        fs::write(dir.path().join("Trix.json"), r#"{"a":1}"#).unwrap();
        db.load().unwrap();
        assert!(db.last_load_error().is_none());
        assert_eq!(db.get("a"), Some(&Value::from(1)));
    }

    #[test]
    fn test_save_failure_is_reported_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            filename: dir.path().join("missing").join("Trix.json"),
            ..plain_config(&dir)
        };
        let logger = Arc::new(RecordingLogger::default());
        let mut db = Database::with_logger(config, logger.clone()).unwrap();
        let before = logger.errors().len();

        assert!(db.set("k", 1).is_err());

        let errors = logger.errors();
        assert_eq!(errors.len(), before + 1);
        assert!(errors[before].starts_with("Error saving data:"));
    }

    #[test]
    fn test_set_get_has_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();

        db.set("name", "trix").unwrap();
        assert_eq!(db.get("name"), Some(&Value::from("trix")));
        assert!(db.has("name"));

        db.delete("name").unwrap();
        assert!(!db.has("name"));
        // Deleting again is a no-op, not an error
        db.delete("name").unwrap();
    }

    #[test]
    fn test_add_on_string_is_skipped_without_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();
        db.set("k", "x").unwrap();

        let path = dir.path().join("Trix.json");
        // Replace the file behind the store's back; a write would overwrite it
        fs::write(&path, "sentinel").unwrap();

        let outcome = db.add("k", 5.0).unwrap();

        assert_eq!(
            outcome,
            Outcome::Skipped(Skip::TypeMismatch {
                expected: "number",
                found: "string"
            })
        );
        assert_eq!(db.get("k"), Some(&Value::from("x")));
        assert_eq!(fs::read_to_string(&path).unwrap(), "sentinel");
    }

    #[test]
    fn test_arithmetic() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();
        db.set("n", 10).unwrap();

        db.add("n", 5.0).unwrap();
        db.subtract("n", 3.0).unwrap();
        db.math("n", MathOp::Multiply, 2.0).unwrap();
        db.math("n", MathOp::Divide, 4.0).unwrap();

        assert_eq!(db.get("n"), Some(&Value::from(6)));
    }

    #[test]
    fn test_math_on_missing_key_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();

        let outcome = db.math("missing", MathOp::Add, 1.0).unwrap();
        assert!(!outcome.is_applied());
        assert!(!db.has("missing"));
    }

    #[test]
    fn test_division_by_zero_is_not_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();
        db.set("n", 1).unwrap();

        assert_eq!(db.math("n", MathOp::Divide, 0.0).unwrap(), Outcome::Applied);
        assert_eq!(db.get("n"), Some(&Value::Number(f64::INFINITY)));
        // Written as null on disk
        let raw = fs::read_to_string(dir.path().join("Trix.json")).unwrap();
        assert_eq!(raw, "{\n  \"n\": null\n}");
    }

    #[test]
    fn test_push_coerces_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();
        db.set("k", "not an array").unwrap();

        assert_eq!(db.push("k", 1).unwrap(), Outcome::Coerced);
        assert_eq!(db.get("k"), Some(&Value::from(vec![1])));

        assert_eq!(db.push("k", 2).unwrap(), Outcome::Applied);
        assert_eq!(db.get("k"), Some(&Value::from(vec![1, 2])));
    }

    #[test]
    fn test_push_array_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();

        db.push_array("list", vec![1, 2, 3, 2]).unwrap();
        db.remove_from_array("list", vec![2]).unwrap();

        assert_eq!(db.get("list"), Some(&Value::from(vec![1, 3])));
    }

    #[test]
    fn test_remove_from_non_array_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();
        db.set("k", 1).unwrap();

        let outcome = db.remove_from_array("k", vec![1]).unwrap();
        assert!(!outcome.is_applied());
        assert_eq!(db.get("k"), Some(&Value::from(1)));
    }

    #[test]
    fn test_reset_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();
        db.set("a", 1).unwrap();

        db.reset().unwrap();
        assert!(db.is_empty());
        db.reset().unwrap();
        assert!(db.is_empty());
        assert!(!db.has("a"));
    }

    #[test]
    fn test_corrupt_file_keeps_prior_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();
        db.set("kept", true).unwrap();

        fs::write(dir.path().join("Trix.json"), "{ not json").unwrap();

        assert!(db.load().is_err());
        assert_eq!(db.get("kept"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_fetch_redirects_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();
        db.set("a", "stored").unwrap();

        assert_eq!(db.fetch().get("a"), Some(&Value::from("stored")));

        db.enable_cache();
        db.set_cache_with_ttl("a", 42, 10);

        let fetched = db.fetch();
        let wrapper = fetched.get("a").unwrap().as_object().unwrap();
        assert_eq!(wrapper.get("value"), Some(&Value::from(42)));
        assert!(wrapper.contains_key("expireAt"));
        assert_eq!(db.get("a"), Some(&Value::from("stored")));
        assert_eq!(db.get_cache("a"), Some(Value::from(42)));

        db.disable_cache();
        assert!(db.get_cache("a").is_none());
        assert_eq!(db.all().get("a"), Some(&Value::from("stored")));
    }

    #[test]
    fn test_manual_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(plain_config(&dir)).unwrap();
        db.set_cache_with_ttl("short", 1, 0);
        db.set_cache_with_ttl("long", 1, 600);

        std::thread::sleep(std::time::Duration::from_millis(20));

        assert_eq!(db.sweep_cache(), 1);
        assert!(db.get_cache("long").is_some());
    }

    #[tokio::test]
    async fn test_sweeper_runs_inside_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(plain_config(&dir)).unwrap();
        assert!(db.is_sweeping());

        db.shutdown();
        assert!(!db.is_sweeping());
    }
}
