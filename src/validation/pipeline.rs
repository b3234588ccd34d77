//! Validation pipeline
//!
//! Runs a table's validator synchronously over one or many rows. Multi-row
//! checks always scan every row and raise a single aggregate
//! [`ValidationError`] afterwards.

use super::schema::{ValidationOutcome, ValidationSchema};
use crate::core::value::json_kind;
use crate::core::{
    Record, RowValidationFailure, StoreError, StoreResult, Table, ValidationError, ValidationIssue,
};
use serde_json::Value as JsonValue;

pub struct ValidationPipeline<'a> {
    table: &'a str,
    schema: Option<&'a ValidationSchema>,
}

impl<'a> ValidationPipeline<'a> {
    pub fn new(table: &'a str, schema: Option<&'a ValidationSchema>) -> Self {
        Self { table, schema }
    }

    pub fn is_active(&self) -> bool {
        self.schema.is_some()
    }

    /// Validate a single row (insert path).
    pub fn validate_data(&self, row: &JsonValue) -> StoreResult<Record> {
        match self.check(row)? {
            Ok(record) => Ok(record),
            Err(issues) => Err(ValidationError::new(
                self.table,
                vec![RowValidationFailure {
                    row_index: 0,
                    row_data: row.clone(),
                    issues,
                }],
            )
            .into()),
        }
    }

    /// Validate every row, then fail once with all failing rows.
    pub fn validate_all(&self, rows: &[JsonValue]) -> StoreResult<Vec<Record>> {
        let mut accepted = Vec::with_capacity(rows.len());
        let mut failures = Vec::new();

        for (row_index, row) in rows.iter().enumerate() {
            match self.check(row)? {
                Ok(record) => accepted.push(record),
                Err(issues) => failures.push(RowValidationFailure {
                    row_index,
                    row_data: row.clone(),
                    issues,
                }),
            }
        }

        if failures.is_empty() {
            Ok(accepted)
        } else {
            Err(ValidationError::new(self.table, failures).into())
        }
    }

    /// Validate update candidates: each is an existing stored row with the
    /// patch merged over it. Stored rows are output-shaped, so the backward
    /// transform runs before the validator sees them.
    pub fn check_merged(&self, candidates: &[(usize, Record)]) -> StoreResult<()> {
        let Some(schema) = self.schema else {
            return Ok(());
        };

        let mut failures = Vec::new();
        for (row_index, merged) in candidates {
            let merged = JsonValue::Object(merged.clone());
            let input = schema.backward(&merged);
            if let Err(issues) = self.check(&input)? {
                failures.push(RowValidationFailure {
                    row_index: *row_index,
                    row_data: merged,
                    issues,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.table, failures).into())
        }
    }

    /// `Ok(Ok(record))` when accepted, `Ok(Err(issues))` when rejected.
    fn check(&self, row: &JsonValue) -> StoreResult<Result<Record, Vec<ValidationIssue>>> {
        let output = match self.schema {
            None => row.clone(),
            Some(schema) => match schema.validate(row) {
                ValidationOutcome::Valid(value) => value,
                ValidationOutcome::Invalid(issues) if issues.is_empty() => {
                    return Ok(Err(vec![ValidationIssue::new("rejected by validator")]));
                }
                ValidationOutcome::Invalid(issues) => return Ok(Err(issues)),
                ValidationOutcome::Pending => {
                    return Err(StoreError::UnsupportedOperation(format!(
                        "validator for table '{}' did not complete synchronously; asynchronous validation is not supported",
                        self.table
                    )));
                }
            },
        };

        Ok(match output {
            JsonValue::Object(record) => Ok(record),
            other => Err(vec![ValidationIssue::new(format!(
                "record must be a JSON object, got {}",
                json_kind(&other)
            ))]),
        })
    }
}

/// Merge `patch` over `existing`; patch keys win.
pub fn merge_patch(existing: &Record, patch: &Record) -> Record {
    let mut merged = existing.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Apply a schema's primary key, foreign keys and indexes to a table.
pub fn enhance_table(table: Table, schema: &ValidationSchema) -> StoreResult<Table> {
    table.with_constraints(
        schema.primary_key_columns(),
        schema.foreign_keys(),
        schema.indexes(),
    )
}

/// True when the validator's output has a different key set than its input.
pub fn changes_shape(input: &JsonValue, output: &Record) -> bool {
    match input.as_object() {
        Some(input) => {
            input.len() != output.len() || input.keys().any(|k| !output.contains_key(k))
        }
        None => true,
    }
}
