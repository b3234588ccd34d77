//! Conversions between JSON values and relational values.

use super::{Column, StorageType, StoreError, StoreResult, Table};
use serde_json::{Number, Value as JsonValue};

/// One line of a record file: an ordered JSON object.
pub type Record = serde_json::Map<String, JsonValue>;

/// Value as bound to / read from the relational engine.
pub type SqlValue = rusqlite::types::Value;

/// A decoded engine row, column names in select order.
pub type SqlRow = Vec<(String, SqlValue)>;

/// Convert a JSON value into the value stored for `column`.
///
/// Without column metadata the value is stored by its own JSON kind. A
/// value whose kind the column cannot hold is an `InvalidRecord` error.
pub fn json_to_sql(value: &JsonValue, column: Option<&Column>) -> StoreResult<SqlValue> {
    let Some(column) = column else {
        return by_kind(value);
    };
    column_value(value, column)?.ok_or_else(|| {
        StoreError::InvalidRecord(format!(
            "column '{}' of type {} cannot hold a {}",
            column.name,
            column_kind(column),
            json_kind(value)
        ))
    })
}

/// Stored form of `value` in `column`, or `None` if the column cannot hold
/// a value of that kind without changing it on the way back.
pub fn column_value(value: &JsonValue, column: &Column) -> StoreResult<Option<SqlValue>> {
    if value.is_null() {
        return Ok(Some(SqlValue::Null));
    }
    if column.is_json() {
        return Ok(Some(SqlValue::Text(serde_json::to_string(value)?)));
    }

    Ok(match (column.storage_type, value) {
        (StorageType::Integer, JsonValue::Bool(b)) if column.is_boolean() => {
            Some(SqlValue::Integer(i64::from(*b)))
        }
        (StorageType::Integer, JsonValue::Number(n)) if !column.is_boolean() => {
            Some(number_to_sql(n)?)
        }
        (StorageType::Real, JsonValue::Number(n)) => Some(number_to_sql(n)?),
        (StorageType::Text, JsonValue::String(s)) => Some(SqlValue::Text(s.clone())),
        (StorageType::Blob, JsonValue::Array(items)) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(SqlValue::Blob),
        _ => None,
    })
}

fn by_kind(value: &JsonValue) -> StoreResult<SqlValue> {
    Ok(match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        JsonValue::Number(n) => number_to_sql(n)?,
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => SqlValue::Text(serde_json::to_string(value)?),
    })
}

fn column_kind(column: &Column) -> String {
    if column.is_boolean() {
        "boolean".to_string()
    } else {
        column.storage_type.to_string()
    }
}

fn number_to_sql(n: &Number) -> StoreResult<SqlValue> {
    if let Some(i) = n.as_i64() {
        return Ok(SqlValue::Integer(i));
    }
    n.as_f64()
        .map(SqlValue::Real)
        .ok_or_else(|| StoreError::InvalidRecord(format!("Cannot store number {}", n)))
}

/// `a = b` as the engine evaluates it: integers and reals compare by value,
/// NULL equals nothing, other storage classes never equal each other.
pub fn sql_values_equal(a: &SqlValue, b: &SqlValue) -> bool {
    match (a, b) {
        (SqlValue::Integer(x), SqlValue::Integer(y)) => x == y,
        (SqlValue::Real(x), SqlValue::Real(y)) => x == y,
        (SqlValue::Integer(x), SqlValue::Real(y)) | (SqlValue::Real(y), SqlValue::Integer(x)) => {
            *x as f64 == *y
        }
        (SqlValue::Text(x), SqlValue::Text(y)) => x == y,
        (SqlValue::Blob(x), SqlValue::Blob(y)) => x == y,
        _ => false,
    }
}

/// Equality of a row value and a where-condition literal, evaluated on
/// their stored forms so it agrees with `"column" = ?` in SQL. A `null`
/// literal matches an absent or null value.
pub fn column_values_equal(
    actual: &JsonValue,
    expected: &JsonValue,
    column: Option<&Column>,
) -> bool {
    if expected.is_null() {
        return actual.is_null();
    }
    let stored = |value: &JsonValue| match column {
        Some(column) => column_value(value, column).ok().flatten(),
        None => by_kind(value).ok(),
    };
    match (stored(actual), stored(expected)) {
        (Some(a), Some(b)) => sql_values_equal(&a, &b),
        _ => false,
    }
}

/// Convert an engine value back into JSON, honoring the column's storage
/// and logical type when known.
pub fn sql_to_json(value: SqlValue, column: Option<&Column>) -> StoreResult<JsonValue> {
    if let Some(column) = column {
        if column.is_json() {
            if let SqlValue::Text(text) = &value {
                return Ok(serde_json::from_str(text).map_err(|e| {
                    StoreError::Json(format!("column '{}': {}", column.name, e))
                })?);
            }
        }
        if column.is_boolean() {
            if let SqlValue::Integer(i) = value {
                return Ok(JsonValue::Bool(i != 0));
            }
        }
    }

    Ok(match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Integer(i) => JsonValue::Number(i.into()),
        SqlValue::Real(f) => Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        SqlValue::Text(s) => JsonValue::String(s),
        SqlValue::Blob(bytes) => {
            JsonValue::Array(bytes.into_iter().map(JsonValue::from).collect())
        }
    })
}

/// Decode a row that belongs to `table`. NULL columns are left out so that
/// an absent key and a null column read the same.
pub fn decode_table_row(row: SqlRow, table: &Table) -> StoreResult<Record> {
    let mut record = Record::new();
    for (name, value) in row {
        if matches!(value, SqlValue::Null) {
            continue;
        }
        let json = sql_to_json(value, table.column(&name))?;
        record.insert(name, json);
    }
    Ok(record)
}

/// Decode a row of an arbitrary query by runtime value types.
pub fn decode_raw_row(row: SqlRow) -> StoreResult<Record> {
    let mut record = Record::new();
    for (name, value) in row {
        record.insert(name, sql_to_json(value, None)?);
    }
    Ok(record)
}

/// Require a JSON object, as every stored record must be.
pub fn as_record(value: JsonValue, context: &str) -> StoreResult<Record> {
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::InvalidRecord(format!(
            "{} must be a JSON object, got {}",
            context,
            json_kind(&other)
        ))),
    }
}

pub fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl StorageType {
    /// Storage type a single JSON value would be classified as.
    pub fn of_json(value: &JsonValue) -> StorageType {
        match value {
            JsonValue::Null => StorageType::Null,
            JsonValue::Bool(_) => StorageType::Integer,
            JsonValue::Number(n) if n.is_i64() => StorageType::Integer,
            JsonValue::Number(_) => StorageType::Real,
            JsonValue::String(_) => StorageType::Text,
            JsonValue::Array(_) | JsonValue::Object(_) => StorageType::Json,
        }
    }
}
