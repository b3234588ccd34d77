pub mod error;
pub mod types;
pub mod value;

pub use error::{
    PathSegment, RowValidationFailure, StoreError, StoreResult, ValidationError, ValidationIssue,
};
pub use types::{
    Column, ForeignKey, IndexDef, LogicalType, ReferentialAction, StorageType, Table,
};
pub use value::{Record, SqlRow, SqlValue};
