//! Store Module
//!
//! The persisted key-value document, its backing file, and the database
//! facade tying the document, the TTL cache and the sweep task together.

mod backing;
mod database;
mod outcome;


pub use backing::BackingFile;
pub use database::Database;
pub use outcome::{MathOp, Outcome, Skip};
