//! Bidirectional validation schemas
//!
//! A [`ValidationSchema`] is an explicit composition of a validator, an
//! optional backward transform and the relational metadata (primary key,
//! foreign keys, indexes) a table should carry.

use crate::core::{ForeignKey, IndexDef, ValidationIssue};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Result of running a validator over one input.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Accepted; carries the (possibly transformed) output value.
    Valid(JsonValue),
    /// Rejected with at least one issue.
    Invalid(Vec<ValidationIssue>),
    /// The validator could not finish synchronously.
    Pending,
}

impl ValidationOutcome {
    pub fn invalid(issue: ValidationIssue) -> Self {
        Self::Invalid(vec![issue])
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// The one capability every validator must provide.
pub trait RecordValidator: Send + Sync {
    fn validate(&self, input: &JsonValue) -> ValidationOutcome;
}

impl<F> RecordValidator for F
where
    F: Fn(&JsonValue) -> ValidationOutcome + Send + Sync,
{
    fn validate(&self, input: &JsonValue) -> ValidationOutcome {
        self(input)
    }
}

/// Maps a validator's output shape back to its input shape.
pub type BackwardTransform = Arc<dyn Fn(&JsonValue) -> JsonValue + Send + Sync>;

#[derive(Clone)]
pub struct ValidationSchema {
    validator: Arc<dyn RecordValidator>,
    backward: Option<BackwardTransform>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
    indexes: Vec<IndexDef>,
}

impl ValidationSchema {
    pub fn new<V>(validator: V) -> Self
    where
        V: RecordValidator + 'static,
    {
        Self::from_arc(Arc::new(validator))
    }

    pub fn from_arc(validator: Arc<dyn RecordValidator>) -> Self {
        Self {
            validator,
            backward: None,
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Required whenever the validator's output shape differs from its
    /// input shape; sync uses it to persist input-shaped lines.
    pub fn with_backward<F>(mut self, backward: F) -> Self
    where
        F: Fn(&JsonValue) -> JsonValue + Send + Sync + 'static,
    {
        self.backward = Some(Arc::new(backward));
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn validate(&self, input: &JsonValue) -> ValidationOutcome {
        self.validator.validate(input)
    }

    pub fn has_backward(&self) -> bool {
        self.backward.is_some()
    }

    /// Output shape → input shape. Identity without a backward transform.
    pub fn backward(&self, output: &JsonValue) -> JsonValue {
        match &self.backward {
            Some(backward) => backward(output),
            None => output.clone(),
        }
    }

    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }
}

impl fmt::Debug for ValidationSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationSchema")
            .field("backward", &self.backward.is_some())
            .field("primary_key", &self.primary_key)
            .field("foreign_keys", &self.foreign_keys)
            .field("indexes", &self.indexes)
            .finish()
    }
}

/// How the directory scan resolved a table's validation schema.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    Resolved(ValidationSchema),
    /// Resolution failed; the table loads without validation.
    Unavailable { reason: String },
}

impl From<ValidationSchema> for SchemaSource {
    fn from(schema: ValidationSchema) -> Self {
        Self::Resolved(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closure_validator() {
        let schema = ValidationSchema::new(|input: &JsonValue| {
            if input.get("name").is_some() {
                ValidationOutcome::Valid(input.clone())
            } else {
                ValidationOutcome::invalid(ValidationIssue::new("required").at("name"))
            }
        });

        assert!(schema.validate(&json!({"name": "a"})).is_valid());
        assert!(!schema.validate(&json!({})).is_valid());
    }

    #[test]
    fn test_backward_defaults_to_identity() {
        let schema = ValidationSchema::new(|v: &JsonValue| ValidationOutcome::Valid(v.clone()));
        assert!(!schema.has_backward());
        assert_eq!(schema.backward(&json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn test_builder_collects_metadata() {
        let schema = ValidationSchema::new(|v: &JsonValue| ValidationOutcome::Valid(v.clone()))
            .primary_key(["id"])
            .foreign_key(ForeignKey::new("team_id", "teams", "id"))
            .index(IndexDef::new(vec!["name".to_string()]));

        assert_eq!(schema.primary_key_columns(), ["id".to_string()]);
        assert_eq!(schema.foreign_keys().len(), 1);
        assert_eq!(schema.indexes().len(), 1);
    }
}
