//! Everything an application needs to open a store and work with it.
//!
//! ```
//! use linestore::prelude::*;
//! ```

pub use crate::{
    Column, Direction, FieldKind, FindOptions, ForeignKey, IndexDef, LineStore, LogicalType,
    Record, RecordShape, SchemaSource, StorageType, StoreConfig, StoreError, StoreResult, Table,
    TableSource, UpdateOptions, ValidationIssue, ValidationOutcome, ValidationSchema,
    WhereCondition,
};
