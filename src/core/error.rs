//! Store error types
//!
//! Every failure the engine raises carries enough context (table, row index,
//! column path, message) for a caller to render diagnostics without
//! re-deriving anything.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The table's validation schema could not be resolved. Soft: the table
    /// still loads, just without validation.
    #[error("Failed to load validation schema for table '{table}': {reason}")]
    SchemaLoad { table: String, reason: String },

    /// No schema could be inferred (zero sample rows, inference disabled).
    #[error("Cannot infer schema for table '{table}': {reason}")]
    Inference { table: String, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Primary key / unique / foreign key / not-null failure, surfaced
    /// verbatim from the relational engine.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Missing primary key: {0}")]
    MissingPrimaryKey(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    /// Row-level validation failures, if this is a validation error.
    pub fn validation_errors(&self) -> Option<&[RowValidationFailure]> {
        match self {
            Self::Validation(err) => Some(&err.failures),
            _ => None,
        }
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedOperation(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(message.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Io(format!("background task failed: {}", err))
    }
}

// ============================================================================
// Validation diagnostics
// ============================================================================

/// One step in the path to an offending value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{}", key),
            Self::Index(idx) => write!(f, "[{}]", idx),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(idx: usize) -> Self {
        Self::Index(idx)
    }
}

/// A single problem reported by a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub message: String,
    pub path: Vec<PathSegment>,
}

impl ValidationIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
        }
    }

    pub fn at<P: Into<PathSegment>>(mut self, segment: P) -> Self {
        self.path.push(segment.into());
        self
    }

    /// Dotted rendering of the path, e.g. `tags[2].name`.
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(_) => out.push_str(&segment.to_string()),
            }
        }
        out
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path_string(), self.message)
        }
    }
}

/// All issues for one row of a (possibly multi-row) operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowValidationFailure {
    pub row_index: usize,
    pub row_data: JsonValue,
    pub issues: Vec<ValidationIssue>,
}

/// Aggregate validation error, raised once after every row was checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub table: String,
    pub failures: Vec<RowValidationFailure>,
}

impl ValidationError {
    pub fn new(table: impl Into<String>, failures: Vec<RowValidationFailure>) -> Self {
        Self {
            table: table.into(),
            failures,
        }
    }

    pub fn issue_count(&self) -> usize {
        self.failures.iter().map(|f| f.issues.len()).sum()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validation failed for {} row(s) in table '{}'",
            self.failures.len(),
            self.table
        )?;
        for failure in &self.failures {
            for issue in &failure.issues {
                write!(f, "\n  row {}: {}", failure.row_index, issue)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
