//! Validation pipeline
//!
//! - `schema.rs` - Validator contract and the bidirectional schema struct
//! - `pipeline.rs` - Single-row and aggregate validation runs
//! - `shape.rs` - Bundled declarative validator

pub mod pipeline;
pub mod schema;
pub mod shape;

pub use pipeline::{ValidationPipeline, merge_patch};
pub use schema::{
    BackwardTransform, RecordValidator, SchemaSource, ValidationOutcome, ValidationSchema,
};
pub use shape::{FieldKind, RecordShape};
