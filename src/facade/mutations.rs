//! Insert, update and delete
//!
//! Every mutation validates first, writes to the database second and
//! schedules a file sync last. Multi-row mutations run inside a savepoint
//! so a constraint failure part-way through leaves no rows behind.

use super::logging::StoreLogger;
use super::store::{LineStore, StoreState};
use crate::core::value::{as_record, decode_table_row, json_to_sql, sql_values_equal};
use crate::core::{Record, SqlRow, SqlValue, StoreError, StoreResult, Table};
use crate::json::converter::{
    DeleteStatementBuilder, InsertStatementBuilder, SelectStatementBuilder, Statement,
    UpdateStatementBuilder, quote_list, record_values,
};
use crate::json::identifiers::quote_ident;
use crate::query::{PredicateCompiler, WhereCondition};
use crate::storage::RelationalEngine;
use crate::validation::{ValidationPipeline, merge_patch};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Validate each affected row with the patch merged in.
    pub validate: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

impl LineStore {
    /// Validate and insert one row.
    pub fn insert(&mut self, table: &str, row: JsonValue) -> StoreResult<()> {
        self.ensure_open()?;
        let stmt = {
            let entry = self.entry(table)?;
            let record =
                ValidationPipeline::new(table, entry.validation.as_ref()).validate_data(&row)?;
            insert_statement(&entry.table, &record)?
        };

        self.engine.run(&stmt.sql, &stmt.params)?;
        self.after_mutation(table);
        Ok(())
    }

    /// Validate every row, then insert them all or none.
    pub fn batch_insert(&mut self, table: &str, rows: Vec<JsonValue>) -> StoreResult<usize> {
        self.ensure_open()?;
        let stmts = {
            let entry = self.entry(table)?;
            ValidationPipeline::new(table, entry.validation.as_ref())
                .validate_all(&rows)?
                .iter()
                .map(|record| insert_statement(&entry.table, record))
                .collect::<StoreResult<Vec<_>>>()?
        };

        let inserted = run_all(
            self.engine.as_mut(),
            self.config.logger.as_ref(),
            table,
            "batch_insert",
            &stmts,
        )?;
        self.after_mutation(table);
        Ok(inserted)
    }

    /// Apply `patch` to every row matching `condition`.
    ///
    /// Predicate leaves are rejected: the UPDATE runs in SQL and cannot
    /// consult an in-memory filter.
    pub fn update(
        &mut self,
        table: &str,
        patch: JsonValue,
        condition: &WhereCondition,
        options: UpdateOptions,
    ) -> StoreResult<usize> {
        self.ensure_open()?;
        let stmt = {
            let entry = self.entry(table)?;
            let compiled =
                PredicateCompiler::new(&entry.table).compile_for_mutation(condition, "update")?;
            let patch = as_record(patch, "update patch")?;
            if patch.is_empty() {
                return Ok(0);
            }

            let pipeline = ValidationPipeline::new(table, entry.validation.as_ref());
            if options.validate && pipeline.is_active() {
                let select = SelectStatementBuilder::new(table)
                    .where_clause(compiled.sql.clone(), compiled.params.clone())
                    .build();
                let candidates = self
                    .engine
                    .all(&select.sql, &select.params)?
                    .into_iter()
                    .enumerate()
                    .map(|(idx, row)| {
                        let existing = decode_table_row(row, &entry.table)?;
                        Ok((idx, merge_patch(&existing, &patch)))
                    })
                    .collect::<StoreResult<Vec<_>>>()?;
                pipeline.check_merged(&candidates)?;
            }

            UpdateStatementBuilder::new(table)
                .set_multiple(record_values(&entry.table, &patch)?)
                .where_clause(compiled.sql, compiled.params)
                .build()
        };

        let changed = self.engine.run(&stmt.sql, &stmt.params)?;
        if changed > 0 {
            self.after_mutation(table);
        }
        Ok(changed)
    }

    /// Update many rows, each record addressed by its primary key.
    ///
    /// Every record is merged with its current row and validated before
    /// anything is written; one failure means zero updates. Records whose
    /// row does not exist are skipped.
    pub fn batch_update(
        &mut self,
        table: &str,
        records: Vec<JsonValue>,
        options: UpdateOptions,
    ) -> StoreResult<usize> {
        self.ensure_open()?;
        if records.is_empty() {
            return Ok(0);
        }

        let stmts = {
            let entry = self.entry(table)?;
            let records = records
                .into_iter()
                .enumerate()
                .map(|(idx, record)| as_record(record, &format!("batch update record {}", idx)))
                .collect::<StoreResult<Vec<_>>>()?;
            let keys = records
                .iter()
                .enumerate()
                .map(|(idx, record)| primary_key_of(&entry.table, idx, record))
                .collect::<StoreResult<Vec<_>>>()?;

            let pipeline = ValidationPipeline::new(table, entry.validation.as_ref());
            if options.validate && pipeline.is_active() {
                let existing = self.rows_by_key(&entry.table, &keys)?;
                let candidates: Vec<(usize, Record)> = records
                    .iter()
                    .zip(&keys)
                    .enumerate()
                    .filter_map(|(idx, (record, key))| {
                        existing
                            .iter()
                            .find(|(stored, _)| same_key(stored, &key.bound))
                            .map(|(_, row)| (idx, merge_patch(row, record)))
                    })
                    .collect();
                pipeline.check_merged(&candidates)?;
            }

            let mut stmts = Vec::with_capacity(records.len());
            for (record, key) in records.iter().zip(&keys) {
                let patch: Record = record
                    .iter()
                    .filter(|(column, _)| !entry.table.primary_key.contains(column))
                    .map(|(column, value)| (column.clone(), value.clone()))
                    .collect();
                let values = record_values(&entry.table, &patch)?;
                if values.is_empty() {
                    continue;
                }
                let (sql, params) = key_clause(&entry.table, &key.bound);
                stmts.push(
                    UpdateStatementBuilder::new(table)
                        .set_multiple(values)
                        .where_clause(sql, params)
                        .build(),
                );
            }
            stmts
        };

        let changed = run_all(
            self.engine.as_mut(),
            self.config.logger.as_ref(),
            table,
            "batch_update",
            &stmts,
        )?;
        if changed > 0 {
            self.after_mutation(table);
        }
        Ok(changed)
    }

    /// Delete every row matching `condition`. Predicate leaves are rejected.
    pub fn delete(&mut self, table: &str, condition: &WhereCondition) -> StoreResult<usize> {
        self.ensure_open()?;
        let stmt = {
            let entry = self.entry(table)?;
            let compiled =
                PredicateCompiler::new(&entry.table).compile_for_mutation(condition, "delete")?;
            DeleteStatementBuilder::new(table)
                .where_clause(compiled.sql, compiled.params)
                .build()
        };

        let changed = self.engine.run(&stmt.sql, &stmt.params)?;
        if changed > 0 {
            self.after_mutation(table);
        }
        Ok(changed)
    }

    /// Delete rows by primary key in a single statement.
    pub fn batch_delete(&mut self, table: &str, records: Vec<JsonValue>) -> StoreResult<usize> {
        self.ensure_open()?;
        if records.is_empty() {
            return Ok(0);
        }

        let stmt = {
            let entry = self.entry(table)?;
            let mut params = Vec::new();
            let mut tuples = Vec::with_capacity(records.len());
            for (idx, record) in records.into_iter().enumerate() {
                let record = as_record(record, &format!("batch delete record {}", idx))?;
                let key = primary_key_of(&entry.table, idx, &record)?;
                tuples.push(format!("({})", vec!["?"; key.bound.len()].join(", ")));
                params.extend(key.bound);
            }

            let pk = &entry.table.primary_key;
            let condition = if pk.len() == 1 {
                format!(
                    "{} IN ({})",
                    quote_ident(&pk[0]),
                    vec!["?"; tuples.len()].join(", ")
                )
            } else {
                format!("({}) IN (VALUES {})", quote_list(pk), tuples.join(", "))
            };
            DeleteStatementBuilder::new(table)
                .where_clause(condition, params)
                .build()
        };

        let changed = self.engine.run(&stmt.sql, &stmt.params)?;
        if changed > 0 {
            self.after_mutation(table);
        }
        Ok(changed)
    }

    /// Schedule a sync of `table` unless a transaction is open or auto-sync
    /// is off.
    pub(crate) fn after_mutation(&mut self, table: &str) {
        if self.state == StoreState::InTransaction || !self.config.auto_sync {
            return;
        }
        self.schedule_sync(table);
    }

    pub(crate) fn after_mutation_all(&mut self) {
        if self.state == StoreState::InTransaction || !self.config.auto_sync {
            return;
        }
        for table in self.get_table_names() {
            self.schedule_sync(&table);
        }
    }

    /// Current rows for the given keys, fetched with one OR query, each
    /// paired with its stored key.
    fn rows_by_key(
        &self,
        table: &Table,
        keys: &[PrimaryKey],
    ) -> StoreResult<Vec<(Vec<SqlValue>, Record)>> {
        let condition = WhereCondition::any(keys.iter().map(|key| {
            table
                .primary_key
                .iter()
                .zip(&key.literal)
                .fold(WhereCondition::all(), |cond, (column, value)| {
                    cond.eq(column.clone(), value.clone())
                })
        }));
        let compiled = PredicateCompiler::new(table).compile(&condition)?;
        let select = SelectStatementBuilder::new(&table.name)
            .where_clause(compiled.sql, compiled.params)
            .build();

        self.engine
            .all(&select.sql, &select.params)?
            .into_iter()
            .map(|row| {
                let stored = key_columns(table, &row);
                Ok((stored, decode_table_row(row, table)?))
            })
            .collect()
    }
}

pub(crate) fn insert_statement(table: &Table, record: &Record) -> StoreResult<Statement> {
    Ok(InsertStatementBuilder::new(&table.name)
        .values(record_values(table, record)?)
        .build())
}

/// Run `f` inside a savepoint; roll the savepoint back if it fails.
pub(crate) fn with_savepoint<T, F>(
    engine: &mut dyn RelationalEngine,
    logger: &dyn StoreLogger,
    table: &str,
    name: &str,
    f: F,
) -> StoreResult<T>
where
    F: FnOnce(&mut dyn RelationalEngine) -> StoreResult<T>,
{
    engine.exec(&format!("SAVEPOINT {}", name))?;
    match f(&mut *engine) {
        Ok(value) => {
            engine.exec(&format!("RELEASE SAVEPOINT {}", name))?;
            Ok(value)
        }
        Err(err) => {
            // The caller gets the original error; a failed rollback is logged
            if let Err(rollback) = engine.exec(&format!(
                "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"
            )) {
                logger.error(
                    table,
                    &format!("rollback to savepoint {} failed: {}", name, rollback),
                );
            }
            Err(err)
        }
    }
}

fn run_all(
    engine: &mut dyn RelationalEngine,
    logger: &dyn StoreLogger,
    table: &str,
    savepoint: &str,
    stmts: &[Statement],
) -> StoreResult<usize> {
    with_savepoint(engine, logger, table, savepoint, |engine| {
        let mut changed = 0;
        for stmt in stmts {
            changed += engine.run(&stmt.sql, &stmt.params)?;
        }
        Ok(changed)
    })
}

/// A record's primary key, as given and as bound.
struct PrimaryKey {
    literal: Vec<JsonValue>,
    bound: Vec<SqlValue>,
}

fn primary_key_of(table: &Table, idx: usize, record: &Record) -> StoreResult<PrimaryKey> {
    if !table.has_primary_key() {
        return Err(StoreError::MissingPrimaryKey(format!(
            "table '{}' has no primary key",
            table.name
        )));
    }

    let mut key = PrimaryKey {
        literal: Vec::with_capacity(table.primary_key.len()),
        bound: Vec::with_capacity(table.primary_key.len()),
    };
    for column in &table.primary_key {
        let value = record
            .get(column)
            .filter(|value| !value.is_null())
            .ok_or_else(|| {
                StoreError::MissingPrimaryKey(format!(
                    "record {} for table '{}' lacks primary key column '{}'",
                    idx, table.name, column
                ))
            })?;
        key.bound.push(json_to_sql(value, table.column(column))?);
        key.literal.push(value.clone());
    }
    Ok(key)
}

fn key_columns(table: &Table, row: &SqlRow) -> Vec<SqlValue> {
    table
        .primary_key
        .iter()
        .map(|column| {
            row.iter()
                .find(|(name, _)| name == column)
                .map(|(_, value)| value.clone())
                .unwrap_or(SqlValue::Null)
        })
        .collect()
}

/// Whether a stored key and a bound key address the same row, compared the
/// way the engine's `=` compares them.
fn same_key(stored: &[SqlValue], bound: &[SqlValue]) -> bool {
    stored.len() == bound.len()
        && stored
            .iter()
            .zip(bound)
            .all(|(stored, bound)| sql_values_equal(stored, bound))
}

fn key_clause(table: &Table, key: &[SqlValue]) -> (String, Vec<SqlValue>) {
    let sql = table
        .primary_key
        .iter()
        .map(|column| format!("{} = ?", quote_ident(column)))
        .collect::<Vec<_>>()
        .join(" AND ");
    (sql, key.to_vec())
}
