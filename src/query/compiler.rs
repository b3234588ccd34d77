//! Predicate compiler
//!
//! Turns a [`WhereCondition`] into a SQL boolean expression with positional
//! parameters plus whatever must still be checked in memory.
//!
//! - AND nodes push literal leaves into SQL and keep predicate leaves as a
//!   residual filter applied to the SQL candidates.
//! - OR nodes without predicates compile to parenthesized SQL.
//! - OR nodes with a predicate anywhere below them cannot be split: the
//!   whole call selects every row and evaluates the full tree in memory.

use super::condition::{FieldMatch, FieldPredicate, WhereCondition};
use crate::core::value::column_value;
use crate::core::{Record, SqlValue, StoreError, StoreResult, Table};
use crate::json::identifiers::quote_ident;
use serde_json::Value as JsonValue;

const MATCH_ALL: &str = "1 = 1";
const MATCH_NONE: &str = "1 = 0";

/// What remains to be checked in memory after the SQL scan.
#[derive(Debug, Clone)]
pub enum ResidualFilter {
    None,
    /// Predicate leaves of a top-level AND; all must hold.
    Predicates(Vec<(String, FieldPredicate)>),
    /// The full condition tree (an OR containing predicates), evaluated
    /// against rows of the table it was compiled for.
    Condition(WhereCondition, Table),
}

#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub residual: ResidualFilter,
}

impl CompiledCondition {
    pub fn has_residual(&self) -> bool {
        !matches!(self.residual, ResidualFilter::None)
    }

    /// Apply the residual filter to a candidate row.
    pub fn accepts(&self, record: &Record) -> bool {
        match &self.residual {
            ResidualFilter::None => true,
            ResidualFilter::Predicates(predicates) => predicates.iter().all(|(column, predicate)| {
                predicate.test(record.get(column).unwrap_or(&JsonValue::Null))
            }),
            ResidualFilter::Condition(condition, table) => condition.matches(record, table),
        }
    }
}

pub struct PredicateCompiler<'a> {
    table: &'a Table,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    pub fn compile(&self, condition: &WhereCondition) -> StoreResult<CompiledCondition> {
        for column in condition.columns() {
            self.table.require_column(column)?;
        }

        match condition {
            WhereCondition::Any(_) if condition.has_predicate() => Ok(CompiledCondition {
                sql: MATCH_ALL.to_string(),
                params: Vec::new(),
                residual: ResidualFilter::Condition(condition.clone(), self.table.clone()),
            }),
            WhereCondition::Any(_) => {
                let mut params = Vec::new();
                let sql = self.compile_pure(condition, &mut params)?;
                Ok(CompiledCondition {
                    sql,
                    params,
                    residual: ResidualFilter::None,
                })
            }
            WhereCondition::All(entries) => {
                let mut params = Vec::new();
                let mut parts = Vec::new();
                let mut predicates = Vec::new();

                for (column, leaf) in entries {
                    match leaf {
                        FieldMatch::Equals(value) => {
                            parts.push(self.equality(column, value, &mut params)?);
                        }
                        FieldMatch::Test(predicate) => {
                            predicates.push((column.clone(), predicate.clone()));
                        }
                    }
                }

                Ok(CompiledCondition {
                    sql: if parts.is_empty() {
                        MATCH_ALL.to_string()
                    } else {
                        parts.join(" AND ")
                    },
                    params,
                    residual: if predicates.is_empty() {
                        ResidualFilter::None
                    } else {
                        ResidualFilter::Predicates(predicates)
                    },
                })
            }
        }
    }

    /// Compile a condition for UPDATE/DELETE, which cannot apply a residual
    /// filter before mutating.
    pub fn compile_for_mutation(
        &self,
        condition: &WhereCondition,
        operation: &str,
    ) -> StoreResult<CompiledCondition> {
        if condition.has_predicate() {
            return Err(StoreError::UnsupportedOperation(format!(
                "{} on table '{}' cannot use predicate functions in its where-condition",
                operation, self.table.name
            )));
        }
        self.compile(condition)
    }

    fn compile_pure(
        &self,
        condition: &WhereCondition,
        params: &mut Vec<SqlValue>,
    ) -> StoreResult<String> {
        match condition {
            WhereCondition::Any(children) if children.is_empty() => Ok(MATCH_NONE.to_string()),
            WhereCondition::Any(children) => {
                let parts = children
                    .iter()
                    .map(|child| Ok(format!("({})", self.compile_pure(child, params)?)))
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(parts.join(" OR "))
            }
            WhereCondition::All(entries) if entries.is_empty() => Ok(MATCH_ALL.to_string()),
            WhereCondition::All(entries) => {
                let parts = entries
                    .iter()
                    .map(|(column, leaf)| match leaf {
                        FieldMatch::Equals(value) => self.equality(column, value, params),
                        FieldMatch::Test(_) => Err(StoreError::UnsupportedOperation(
                            "predicate leaf cannot be compiled to SQL".to_string(),
                        )),
                    })
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(parts.join(" AND "))
            }
        }
    }

    fn equality(
        &self,
        column: &str,
        value: &JsonValue,
        params: &mut Vec<SqlValue>,
    ) -> StoreResult<String> {
        if value.is_null() {
            return Ok(format!("{} IS NULL", quote_ident(column)));
        }
        let meta = self.table.require_column(column)?;
        match column_value(value, meta)? {
            Some(stored) => {
                params.push(stored);
                Ok(format!("{} = ?", quote_ident(column)))
            }
            // The column cannot hold a value of this kind
            None => Ok(MATCH_NONE.to_string()),
        }
    }
}
