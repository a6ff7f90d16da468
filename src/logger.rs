//! Logger Module
//!
//! Best-effort diagnostic sinks. The store only needs something implementing
//! [`Logger`]; write failures are reported through `tracing` and otherwise
//! ignored.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{error, info, warn};

use crate::error::{Result, StoreError};

/// Channel used when the caller does not name one.
pub const DEFAULT_CHANNEL: &str = "default";

// == Logger Trait ==
/// Append-only, named diagnostic sinks.
pub trait Logger: Send + Sync {
    /// Appends `message` to `channel`.
    fn log(&self, message: &str, channel: &str);

    /// Appends a failure report. Sinks without severities treat it as `log`.
    fn error(&self, message: &str, channel: &str) {
        self.log(message, channel);
    }

    /// Opens an additional channel.
    fn create_channel(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    /// Closes every channel. Later `log` calls are dropped.
    fn close(&self) {}
}

// == Tracing Logger ==
/// Forwards every line to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str, channel: &str) {
        info!(channel, "{}", message);
    }

    fn error(&self, message: &str, channel: &str) {
        error!(channel, "{}", message);
    }
}

// == File Logger ==
/// One append-only file per channel, each line prefixed with an RFC 3339 timestamp.
///
/// The default channel writes to the configured path, other channels to
/// `<stem>-<channel>.log` beside it.
#[derive(Debug)]
pub struct FileLogger {
    base: PathBuf,
    channels: Mutex<HashMap<String, File>>,
}

impl FileLogger {
    /// Opens (or creates) the default channel at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let base = path.into();
        let file = open_append(&base)?;

        let mut channels = HashMap::new();
        channels.insert(DEFAULT_CHANNEL.to_string(), file);

        Ok(Self {
            base,
            channels: Mutex::new(channels),
        })
    }

    /// File backing `channel`.
    pub fn channel_path(&self, channel: &str) -> PathBuf {
        if channel == DEFAULT_CHANNEL {
            return self.base.clone();
        }
        let stem = self
            .base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log".to_string());
        self.base.with_file_name(format!("{}-{}.log", stem, channel))
    }

    pub fn channel_names(&self) -> Vec<String> {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = channels.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Logger for FileLogger {
    fn log(&self, message: &str, channel: &str) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let target = if channels.contains_key(channel) {
            channel
        } else {
            DEFAULT_CHANNEL
        };

        let Some(file) = channels.get_mut(target) else {
            return;
        };

        let line = format!("[{}] {}\n", chrono::Utc::now().to_rfc3339(), message);
        if let Err(err) = file.write_all(line.as_bytes()) {
            warn!(channel = target, "Failed to write log line: {}", err);
        }
    }

    fn error(&self, message: &str, channel: &str) {
        error!(channel, "{}", message);
        self.log(&format!("ERROR {}", message), channel);
    }

    fn create_channel(&self, name: &str) -> Result<()> {
        validate_channel_name(name)?;
        let path = self.channel_path(name);
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if !channels.contains_key(name) {
            channels.insert(name.to_string(), open_append(&path)?);
        }
        Ok(())
    }

    fn close(&self) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        for file in channels.values_mut() {
            let _ = file.flush();
        }
        channels.clear();
    }
}

/// Channel names become part of a file name, so they must stay a plain name.
fn validate_channel_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidConfig(format!(
            "invalid log channel name: {:?}",
            name
        )))
    }
}

fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_file_logger_appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::open(dir.path().join("Trix.log")).unwrap();

        logger.log("first", DEFAULT_CHANNEL);
        logger.log("second", DEFAULT_CHANNEL);

        let text = fs::read_to_string(dir.path().join("Trix.log")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] second"));
    }

    #[test]
    fn test_named_channel_gets_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::open(dir.path().join("Trix.log")).unwrap();

        logger.create_channel("audit").unwrap();
        logger.log("audited", "audit");

        let audit = fs::read_to_string(dir.path().join("Trix-audit.log")).unwrap();
        assert!(audit.contains("audited"));
        assert_eq!(logger.channel_names(), vec!["audit", "default"]);
    }

    #[test]
    fn test_unknown_channel_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::open(dir.path().join("Trix.log")).unwrap();

        logger.log("stray", "missing");

        let text = fs::read_to_string(dir.path().join("Trix.log")).unwrap();
        assert!(text.contains("stray"));
    }

    #[test]
    fn test_channel_names_cannot_escape_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::open(dir.path().join("Trix.log")).unwrap();

        for name in ["../x", "a/b", "a\\b", "..", ""] {
            assert!(
                matches!(logger.create_channel(name), Err(StoreError::InvalidConfig(_))),
                "{:?} should be rejected",
                name
            );
        }
        assert_eq!(logger.channel_names(), vec!["default"]);
        assert!(!dir.path().join("Trix-..").exists());
    }

    #[test]
    fn test_error_lines_are_marked() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::open(dir.path().join("Trix.log")).unwrap();

        logger.error("disk full", DEFAULT_CHANNEL);

        let text = fs::read_to_string(dir.path().join("Trix.log")).unwrap();
        assert!(text.trim_end().ends_with("] ERROR disk full"));
    }

    #[test]
    fn test_close_clears_channels() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::open(dir.path().join("Trix.log")).unwrap();
        logger.log("before", DEFAULT_CHANNEL);

        logger.close();
        logger.log("after", DEFAULT_CHANNEL);

        assert!(logger.channel_names().is_empty());
        let text = fs::read_to_string(dir.path().join("Trix.log")).unwrap();
        assert!(text.contains("before"));
        assert!(!text.contains("after"));
    }
}
