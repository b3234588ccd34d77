//! Schema Inference Module
//!
//! Implements Strategy pattern for deriving a relational table from sample
//! records when no explicit schema exists.
//! - AllRowsStrategy: Thorough, classifies every sample row (default)
//! - SampledStrategy: Evenly spaced sample for very large files
//!
//! Columns keep first-seen order. A `null` defers to a later non-null
//! observation; a key that is only ever `null` becomes a JSON column, so
//! whatever is stored there later reads back unchanged.

use super::identifiers::{validate_column_name, validate_table_name};
use crate::core::{Column, LogicalType, StorageType, StoreError, StoreResult, Table};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// Trait for schema inference strategies (Strategy Pattern)
pub trait SchemaInferenceStrategy: Send + Sync {
    /// Infer a table from sample records
    fn infer_schema(&self, table_name: &str, rows: &[JsonValue]) -> StoreResult<Table>;
}

/// Classifies every sample row.
#[derive(Debug, Clone, Default)]
pub struct AllRowsStrategy;

impl SchemaInferenceStrategy for AllRowsStrategy {
    fn infer_schema(&self, table_name: &str, rows: &[JsonValue]) -> StoreResult<Table> {
        validate_table_name(table_name)?;

        if rows.is_empty() {
            return Err(StoreError::Inference {
                table: table_name.to_string(),
                reason: "no sample rows".to_string(),
            });
        }

        let mut order: Vec<String> = Vec::new();
        let mut observed: HashMap<String, Observed> = HashMap::new();

        for (idx, row) in rows.iter().enumerate() {
            let obj = row.as_object().ok_or_else(|| {
                StoreError::InvalidRecord(format!(
                    "Sample row {} of table '{}' is not a JSON object",
                    idx, table_name
                ))
            })?;

            for (key, value) in obj {
                if !observed.contains_key(key) {
                    validate_column_name(key)?;
                    order.push(key.clone());
                }
                let slot = observed.entry(key.clone()).or_insert(Observed::Nothing);
                *slot = slot.merge(Observed::of(value));
            }
        }

        let columns = order
            .into_iter()
            .map(|name| {
                let kind = observed.get(&name).copied().unwrap_or(Observed::Nothing);
                kind.into_column(name)
            })
            .collect();

        Ok(Table::new(table_name, columns))
    }
}

/// Infers from an evenly spaced sample (good balance for large files)
#[derive(Debug, Clone)]
pub struct SampledStrategy {
    sample_size: usize,
}

impl SampledStrategy {
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size: sample_size.max(1),
        }
    }
}

impl Default for SampledStrategy {
    fn default() -> Self {
        Self::new(100) // Sample up to 100 rows
    }
}

impl SchemaInferenceStrategy for SampledStrategy {
    fn infer_schema(&self, table_name: &str, rows: &[JsonValue]) -> StoreResult<Table> {
        if rows.len() <= self.sample_size {
            return AllRowsStrategy.infer_schema(table_name, rows);
        }

        let step = rows.len() / self.sample_size;
        let sampled: Vec<JsonValue> = (0..self.sample_size)
            .map(|i| rows[i * step].clone())
            .collect();
        let typed = AllRowsStrategy.infer_schema(table_name, &sampled)?;

        // Types come from the sample, column names from every row. A key
        // never sampled has no known type and is kept as JSON text.
        let mut seen: HashSet<&str> = HashSet::new();
        let mut columns = Vec::with_capacity(typed.columns().len());
        for (idx, row) in rows.iter().enumerate() {
            let obj = row.as_object().ok_or_else(|| {
                StoreError::InvalidRecord(format!(
                    "Sample row {} of table '{}' is not a JSON object",
                    idx, table_name
                ))
            })?;
            for key in obj.keys() {
                if !seen.insert(key.as_str()) {
                    continue;
                }
                let column = match typed.column(key) {
                    Some(column) => column.clone(),
                    None => {
                        validate_column_name(key)?;
                        Column::new(key.clone(), StorageType::Json)
                    }
                };
                columns.push(column);
            }
        }

        Ok(Table::new(table_name, columns))
    }
}

/// What has been seen for one key so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observed {
    Nothing,
    Boolean,
    Integer,
    Real,
    Text,
    Json,
    Mixed,
}

impl Observed {
    fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Nothing,
            JsonValue::Bool(_) => Self::Boolean,
            JsonValue::Number(n) if n.is_i64() => Self::Integer,
            JsonValue::Number(_) => Self::Real,
            JsonValue::String(_) => Self::Text,
            JsonValue::Array(_) | JsonValue::Object(_) => Self::Json,
        }
    }

    /// Type hierarchy: Integer < Real; any other disagreement is Mixed.
    fn merge(self, next: Self) -> Self {
        match (self, next) {
            (current, Self::Nothing) => current,
            (Self::Nothing, next) => next,
            (a, b) if a == b => a,
            (Self::Integer, Self::Real) | (Self::Real, Self::Integer) => Self::Real,
            _ => Self::Mixed,
        }
    }

    fn into_column(self, name: String) -> Column {
        match self {
                        Self::Boolean => Column::new(name, StorageType::Integer).logical(LogicalType::Boolean),
            Self::Integer => Column::new(name, StorageType::Integer),
            Self::Real => Column::new(name, StorageType::Real),
            Self::Text => Column::new(name, StorageType::Text),
            // Mixed kinds are kept as JSON text so every value reads back unchanged
            Self::Nothing | Self::Json | Self::Mixed => Column::new(name, StorageType::Json),
        }
    }
}

/// Default schema inference engine with configurable strategy
pub struct SchemaInferenceEngine {
    strategy: Box<dyn SchemaInferenceStrategy>,
}

impl SchemaInferenceEngine {
    /// Create engine with a specific strategy
    pub fn with_strategy(strategy: Box<dyn SchemaInferenceStrategy>) -> Self {
        Self { strategy }
    }

    /// Create engine with the default strategy (AllRowsStrategy)
    pub fn new() -> Self {
        Self::with_strategy(Box::new(AllRowsStrategy))
    }

    pub fn infer_schema(&self, table_name: &str, rows: &[JsonValue]) -> StoreResult<Table> {
        self.strategy.infer_schema(table_name, rows)
    }
}

impl Default for SchemaInferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Infer a table from sample rows with the default strategy.
pub fn infer(table_name: &str, sample_rows: &[JsonValue]) -> StoreResult<Table> {
    AllRowsStrategy.infer_schema(table_name, sample_rows)
}
