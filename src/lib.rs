// ============================================================================
// LineStore Library
// ============================================================================
//
// Line-delimited JSON files served as relational tables. Each file is
// loaded into an in-memory SQLite database; mutations are validated,
// applied to the database and written back to the file.

pub mod core;
pub mod facade;
pub mod json;
pub mod prelude;
pub mod query;
pub mod storage;
pub mod validation;

// Re-export main types for convenience
pub use core::{
    Column, ForeignKey, IndexDef, LogicalType, PathSegment, Record, ReferentialAction,
    RowValidationFailure, StorageType, StoreError, StoreResult, Table, ValidationError,
    ValidationIssue,
};
pub use facade::{
    FindOptions, LineStore, LoadWarning, StoreConfig, StoreLogger, TracingLogger, UpdateOptions,
};
pub use json::Direction;
pub use query::{FieldPredicate, WhereCondition};
pub use storage::{JsonLinesFile, RecordFile, RelationalEngine, SqliteEngine, TableSource};
pub use validation::{
    FieldKind, RecordShape, RecordValidator, SchemaSource, ValidationOutcome, ValidationSchema,
};
