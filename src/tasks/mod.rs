//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a database is open.
//!
//! # Tasks
//! - Cache sweep: evicts expired cache entries at configured intervals

mod sweep;

pub use sweep::{spawn_sweep_task, sweep_once};
