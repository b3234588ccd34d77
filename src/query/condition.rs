//! Where-conditions
//!
//! A condition is a tree: `All` is an object node (every leaf must hold),
//! `Any` is an array node (at least one child must hold). Leaves compare a
//! column against a literal or run a caller-supplied predicate.

use crate::core::value::{column_values_equal, json_kind};
use crate::core::{Column, Record, StoreError, StoreResult, Table};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// A caller-supplied test on one column value. Absent columns are passed
/// as `null`.
#[derive(Clone)]
pub struct FieldPredicate(Arc<dyn Fn(&JsonValue) -> bool + Send + Sync>);

impl FieldPredicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&JsonValue) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn test(&self, value: &JsonValue) -> bool {
        (self.0)(value)
    }
}

impl fmt::Debug for FieldPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldPredicate(..)")
    }
}

#[derive(Debug, Clone)]
pub enum FieldMatch {
    Equals(JsonValue),
    Test(FieldPredicate),
}

impl FieldMatch {
    fn matches(&self, value: &JsonValue, column: Option<&Column>) -> bool {
        match self {
            Self::Equals(expected) => column_values_equal(value, expected, column),
            Self::Test(predicate) => predicate.test(value),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WhereCondition {
    /// OR over children. Empty matches nothing.
    Any(Vec<WhereCondition>),
    /// AND over leaves. Empty matches everything.
    All(Vec<(String, FieldMatch)>),
}

impl Default for WhereCondition {
    fn default() -> Self {
        Self::all()
    }
}

impl WhereCondition {
    /// Empty object node; matches every row.
    pub fn all() -> Self {
        Self::All(Vec::new())
    }

    pub fn any<I>(children: I) -> Self
    where
        I: IntoIterator<Item = WhereCondition>,
    {
        Self::Any(children.into_iter().collect())
    }

    /// AND a literal equality leaf. On an `Any` node the leaf is
    /// distributed into every branch.
    pub fn eq(self, column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.and_leaf(column.into(), FieldMatch::Equals(value.into()))
    }

    /// AND a predicate leaf. On an `Any` node the leaf is distributed into
    /// every branch.
    pub fn test<F>(self, column: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&JsonValue) -> bool + Send + Sync + 'static,
    {
        self.and_leaf(column.into(), FieldMatch::Test(FieldPredicate::new(predicate)))
    }

    fn and_leaf(self, column: String, leaf: FieldMatch) -> Self {
        match self {
            Self::All(mut entries) => {
                entries.push((column, leaf));
                Self::All(entries)
            }
            Self::Any(children) => Self::Any(
                children
                    .into_iter()
                    .map(|child| child.and_leaf(column.clone(), leaf.clone()))
                    .collect(),
            ),
        }
    }

    /// True if any leaf in the tree is a predicate.
    pub fn has_predicate(&self) -> bool {
        match self {
            Self::Any(children) => children.iter().any(WhereCondition::has_predicate),
            Self::All(entries) => entries
                .iter()
                .any(|(_, leaf)| matches!(leaf, FieldMatch::Test(_))),
        }
    }

    /// Every column referenced anywhere in the tree.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Any(children) => children.iter().for_each(|c| c.collect_columns(out)),
            Self::All(entries) => out.extend(entries.iter().map(|(col, _)| col.as_str())),
        }
    }

    /// Evaluate the whole tree in memory against a row of `table`.
    /// Literals compare the way the engine compares them for that table's
    /// columns.
    pub fn matches(&self, record: &Record, table: &Table) -> bool {
        match self {
            Self::Any(children) => children.iter().any(|child| child.matches(record, table)),
            Self::All(entries) => entries.iter().all(|(column, leaf)| {
                leaf.matches(
                    record.get(column).unwrap_or(&JsonValue::Null),
                    table.column(column),
                )
            }),
        }
    }
}

/// Literal-only conditions from JSON: objects become `All`, arrays `Any`.
impl TryFrom<JsonValue> for WhereCondition {
    type Error = StoreError;

    fn try_from(value: JsonValue) -> StoreResult<Self> {
        match value {
            JsonValue::Object(map) => Ok(Self::All(
                map.into_iter()
                    .map(|(column, literal)| (column, FieldMatch::Equals(literal)))
                    .collect(),
            )),
            JsonValue::Array(items) => Ok(Self::Any(
                items
                    .into_iter()
                    .map(WhereCondition::try_from)
                    .collect::<StoreResult<Vec<_>>>()?,
            )),
            other => Err(StoreError::InvalidRecord(format!(
                "where-condition must be an object or array, got {}",
                json_kind(&other)
            ))),
        }
    }
}
