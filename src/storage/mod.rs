//! Storage collaborators
//!
//! - `record_file.rs` - Line-delimited record files (read / full rewrite)
//! - `engine.rs` - Relational engine trait and the SQLite implementation
//! - `source.rs` - Per-table source descriptions

pub mod engine;
pub mod record_file;
pub mod source;

pub use engine::{RelationalEngine, SqliteEngine};
pub use record_file::{JsonLinesFile, RecordFile};
pub use source::TableSource;
