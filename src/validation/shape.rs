//! Declarative record validator
//!
//! [`RecordShape`] checks field presence and JSON kinds. It never
//! transforms, so it needs no backward transform.

use super::schema::{RecordValidator, ValidationOutcome};
use crate::core::value::json_kind;
use crate::core::{StorageType, Table, ValidationIssue};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldKind {
    fn accepts(&self, value: &JsonValue) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }
}

#[derive(Debug, Clone)]
struct FieldRule {
    name: String,
    kind: FieldKind,
    required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordShape {
    fields: Vec<FieldRule>,
    deny_unknown: bool,
}

impl RecordShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// A field that must be present and non-null.
    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldRule {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    /// A field that may be absent or null.
    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldRule {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    /// Reject keys that have no rule.
    pub fn deny_unknown(mut self) -> Self {
        self.deny_unknown = true;
        self
    }

    /// Shape matching an explicit table: NOT NULL and primary key columns
    /// are required, column types map to JSON kinds.
    pub fn from_table(table: &Table) -> Self {
        let mut shape = Self::new();
        for column in table.columns() {
            let kind = if column.is_boolean() {
                FieldKind::Boolean
            } else {
                match column.storage_type {
                    StorageType::Text => FieldKind::String,
                    StorageType::Integer => FieldKind::Integer,
                    StorageType::Real => FieldKind::Number,
                    StorageType::Blob | StorageType::Null | StorageType::Json => FieldKind::Any,
                }
            };
            shape = if column.not_null || column.primary_key {
                shape.required(column.name.clone(), kind)
            } else {
                shape.optional(column.name.clone(), kind)
            };
        }
        shape
    }
}

impl RecordValidator for RecordShape {
    fn validate(&self, input: &JsonValue) -> ValidationOutcome {
        let Some(obj) = input.as_object() else {
            return ValidationOutcome::invalid(ValidationIssue::new(format!(
                "expected object, got {}",
                json_kind(input)
            )));
        };

        let mut issues = Vec::new();

        for rule in &self.fields {
            match obj.get(&rule.name) {
                None | Some(JsonValue::Null) => {
                    if rule.required {
                        issues.push(ValidationIssue::new("required field is missing").at(rule.name.as_str()));
                    }
                }
                Some(value) if !rule.kind.accepts(value) => {
                    issues.push(
                        ValidationIssue::new(format!(
                            "expected {}, got {}",
                            rule.kind.name(),
                            json_kind(value)
                        ))
                        .at(rule.name.as_str()),
                    );
                }
                Some(_) => {}
            }
        }

        if self.deny_unknown {
            for key in obj.keys() {
                if !self.fields.iter().any(|rule| &rule.name == key) {
                    issues.push(ValidationIssue::new("unknown field").at(key.as_str()));
                }
            }
        }

        if issues.is_empty() {
            ValidationOutcome::Valid(input.clone())
        } else {
            ValidationOutcome::Invalid(issues)
        }
    }
}
