use super::{StoreError, StoreResult};
use serde::Serialize;
use std::fmt;

/// How a column's values are stored in the relational engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StorageType {
    Text,
    Integer,
    Real,
    Blob,
    /// Declared without a type; holds any JSON value as JSON text.
    Null,
    /// Any JSON value, stored as JSON text.
    Json,
}

impl StorageType {
    /// Declared SQL type used in CREATE TABLE (empty for `Null`). Real
    /// columns use NUMERIC affinity so integers stay integers.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text | Self::Json => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "NUMERIC",
            Self::Blob => "BLOB",
            Self::Null => "",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Real => write!(f, "real"),
            Self::Blob => write!(f, "blob"),
            Self::Null => write!(f, "null"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Meaning layered over the storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogicalType {
    /// Stored as INTEGER 0/1, read back as `true`/`false`.
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub storage_type: StorageType,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub logical_type: Option<LogicalType>,
}

impl Column {
    pub fn new(name: impl Into<String>, storage_type: StorageType) -> Self {
        Self {
            name: name.into(),
            storage_type,
            primary_key: false,
            not_null: false,
            unique: false,
            logical_type: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn logical(mut self, logical_type: LogicalType) -> Self {
        self.logical_type = Some(logical_type);
        self
    }

    pub fn is_boolean(&self) -> bool {
        self.logical_type == Some(LogicalType::Boolean)
    }

    /// Values are stored as JSON text.
    pub fn is_json(&self) -> bool {
        matches!(self.storage_type, StorageType::Json | StorageType::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub references_table: String,
    pub references_columns: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
}

impl ForeignKey {
    pub fn new(
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        Self {
            columns: vec![column.into()],
            references_table: references_table.into(),
            references_columns: vec![references_column.into()],
            on_delete: None,
        }
    }

    pub fn composite(
        columns: Vec<String>,
        references_table: impl Into<String>,
        references_columns: Vec<String>,
    ) -> Self {
        Self {
            columns,
            references_table: references_table.into(),
            references_columns,
            on_delete: None,
        }
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDef {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Explicit name, or `idx_<table>_<col1>_<col2>`.
    pub fn resolved_name(&self, table: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("idx_{}_{}", table, self.columns.join("_")),
        }
    }
}

/// Relational shape of one record file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexDef>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let primary_key = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        Self {
            name: name.into(),
            columns,
            primary_key,
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn require_column(&self, name: &str) -> StoreResult<&Column> {
        self.column(name)
            .ok_or_else(|| StoreError::ColumnNotFound(name.to_string(), self.name.clone()))
    }

    /// Applies primary key, foreign keys and indexes declared outside the
    /// inferred column list. Every referenced column must exist.
    pub fn with_constraints(
        mut self,
        primary_key: &[String],
        foreign_keys: &[ForeignKey],
        indexes: &[IndexDef],
    ) -> StoreResult<Self> {
        if !primary_key.is_empty() {
            for name in primary_key {
                self.require_column(name)?;
            }
            for column in &mut self.columns {
                column.primary_key = primary_key.contains(&column.name);
            }
            self.primary_key = primary_key.to_vec();
        }

        for fk in foreign_keys {
            for name in &fk.columns {
                self.require_column(name)?;
            }
            if fk.columns.len() != fk.references_columns.len() {
                return Err(StoreError::InvalidIdentifier(format!(
                    "foreign key on '{}' references {} column(s) but declares {}",
                    self.name,
                    fk.references_columns.len(),
                    fk.columns.len()
                )));
            }
            self.foreign_keys.push(fk.clone());
        }

        for index in indexes {
            for name in &index.columns {
                self.require_column(name)?;
            }
            self.indexes.push(index.clone());
        }

        Ok(self)
    }
}
