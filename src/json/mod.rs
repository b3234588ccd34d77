//! JSON ↔ relational plumbing
//!
//! This module turns record files into relational tables: it infers table
//! shapes from sample records and renders parameterized SQL for them.
//!
//! # Architecture
//!
//! - `schema_inference.rs` - Strategy pattern for schema detection
//! - `converter.rs` - Builders for parameterized SQL statements
//! - `identifiers.rs` - Table/column name rules and quoting

pub mod converter;
pub mod identifiers;
pub mod schema_inference;

pub use converter::{Direction, Statement};
pub use schema_inference::{
    AllRowsStrategy, SampledStrategy, SchemaInferenceEngine, SchemaInferenceStrategy, infer,
};
