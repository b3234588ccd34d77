//! Table sources
//!
//! What the directory scan hands the store for each table: where the rows
//! live and how the table's shape is decided.

use crate::core::Table;
use crate::validation::SchemaSource;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TableSource {
    pub source_path: PathBuf,
    pub explicit_schema: Option<Table>,
    pub auto_infer: bool,
    pub validation: Option<SchemaSource>,
}

impl TableSource {
    pub fn new(source_path: impl AsRef<Path>) -> Self {
        Self {
            source_path: source_path.as_ref().to_path_buf(),
            explicit_schema: None,
            auto_infer: true,
            validation: None,
        }
    }

    /// Use this table definition instead of inferring one.
    pub fn explicit_schema(mut self, table: Table) -> Self {
        self.explicit_schema = Some(table);
        self
    }

    pub fn auto_infer(mut self, enabled: bool) -> Self {
        self.auto_infer = enabled;
        self
    }

    pub fn validation(mut self, schema: impl Into<SchemaSource>) -> Self {
        self.validation = Some(schema.into());
        self
    }

    /// Record that resolving the validation schema failed.
    pub fn validation_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.validation = Some(SchemaSource::Unavailable {
            reason: reason.into(),
        });
        self
    }
}
