//! Trixdb - An embedded key-value store
//!
//! Keeps a schema-free document in a single JSON file, optionally encrypted
//! at rest, and layers an in-memory TTL cache with a background sweep on top.

pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logger;
pub mod snapshot;
pub mod store;
pub mod tasks;
pub mod value;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use store::{Database, MathOp, Outcome, Skip};
pub use value::{Document, Value};
