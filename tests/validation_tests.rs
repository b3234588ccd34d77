mod common;

use common::{CollectingLogger, Level, read_file, write_file};
use linestore::{
    FieldKind, LineStore, RecordShape, StoreConfig, StoreError, StoreResult, TableSource,
    UpdateOptions, ValidationIssue, ValidationOutcome, ValidationSchema, WhereCondition,
};
use serde_json::{Value as JsonValue, json};
use tempfile::TempDir;

/// Requires a non-negative numeric `age`; passes the record through
/// unchanged.
fn age_schema() -> ValidationSchema {
    ValidationSchema::new(|input: &JsonValue| match input.get("age") {
        Some(age) if age.as_f64().is_some_and(|age| age >= 0.0) => {
            ValidationOutcome::Valid(input.clone())
        }
        _ => ValidationOutcome::invalid(
            ValidationIssue::new("expected non-negative number").at("age"),
        ),
    })
    .primary_key(["id"])
}

/// `{city, celsius}` in files, `{city, kelvin}` in the store.
fn kelvin_schema() -> ValidationSchema {
    ValidationSchema::new(|input: &JsonValue| {
        match (input.get("city"), input.get("celsius").and_then(JsonValue::as_i64)) {
            (Some(city), Some(celsius)) => {
                ValidationOutcome::Valid(json!({"city": city, "kelvin": celsius + 273}))
            }
            _ => ValidationOutcome::invalid(ValidationIssue::new("expected integer").at("celsius")),
        }
    })
    .with_backward(|output: &JsonValue| {
        json!({
            "city": output["city"],
            "celsius": output["kelvin"].as_i64().map(|kelvin| kelvin - 273),
        })
    })
}

async fn open_with(
    dir: &TempDir,
    name: &str,
    contents: &str,
    schema: ValidationSchema,
) -> StoreResult<(LineStore, std::path::PathBuf)> {
    let path = write_file(dir, &format!("{}.jsonl", name), contents);
    let store = LineStore::open(
        [(name, TableSource::new(&path).validation(schema))],
        StoreConfig::default(),
    )
    .await?;
    Ok((store, path))
}

#[tokio::test]
async fn test_batch_insert_reports_every_failing_row() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, _) = open_with(&dir, "people", "{\"id\":1,\"age\":30}\n", age_schema()).await?;

    let err = store
        .batch_insert(
            "people",
            vec![
                json!({"id": 2, "age": "old"}),
                json!({"id": 3, "age": 40}),
                json!({"id": 4}),
            ],
        )
        .unwrap_err();

    let failures = err.validation_errors().expect("validation error");
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].row_index, 0);
    assert_eq!(failures[1].row_index, 2);
    assert_eq!(failures[1].row_data, json!({"id": 4}));
    assert_eq!(failures[0].issues[0].path_string(), "age");

    // nothing was written, not even the valid row
    assert_eq!(store.find("people", &WhereCondition::all())?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_insert_validation_failure() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, _) = open_with(&dir, "people", "{\"id\":1,\"age\":30}\n", age_schema()).await?;

    let err = store.insert("people", json!({"id": 2})).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(err.validation_errors().unwrap()[0].row_index, 0);
    Ok(())
}

#[tokio::test]
async fn test_invalid_rows_at_load_drop_the_table() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (store, _) = open_with(
        &dir,
        "people",
        "{\"id\":1,\"age\":30}\n{\"id\":2,\"age\":\"x\"}\n",
        age_schema(),
    )
    .await?;

    assert!(store.get_table_names().is_empty());
    assert!(store.load_warnings()[0].message.contains("row 1"));
    Ok(())
}

#[tokio::test]
async fn test_update_validates_merged_rows() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, _) = open_with(
        &dir,
        "people",
        "{\"id\":1,\"age\":30,\"name\":\"a\"}\n",
        age_schema(),
    )
    .await?;
    let by_id = WhereCondition::all().eq("id", 1);

    // merged with the stored age, the partial patch is valid
    store.update("people", json!({"name": "b"}), &by_id, UpdateOptions::default())?;

    let err = store
        .update("people", json!({"age": "old"}), &by_id, UpdateOptions::default())
        .unwrap_err();
    assert!(err.validation_errors().is_some());

    // skipping validation writes the patch as given
    let changed = store.update(
        "people",
        json!({"age": -1}),
        &by_id,
        UpdateOptions::new().validate(false),
    )?;
    assert_eq!(changed, 1);
    Ok(())
}

#[tokio::test]
async fn test_batch_update_applies_nothing_when_one_record_fails() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, _) = open_with(
        &dir,
        "people",
        "{\"id\":1,\"age\":30}\n{\"id\":2,\"age\":40}\n",
        age_schema(),
    )
    .await?;

    let err = store
        .batch_update(
            "people",
            vec![json!({"id": 1, "age": 31}), json!({"id": 2, "age": "old"})],
            UpdateOptions::default(),
        )
        .unwrap_err();
    let failures = err.validation_errors().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].row_index, 1);

    let first = store
        .find_one("people", &WhereCondition::all().eq("id", 1))?
        .unwrap();
    assert_eq!(first["age"], json!(30));
    Ok(())
}

#[tokio::test]
async fn test_batch_update_validates_rows_addressed_by_float_key() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, path) =
        open_with(&dir, "people", "{\"id\":1,\"age\":30}\n", age_schema()).await?;

    // 1.0 addresses the row stored with id 1, so it is merged and validated
    let err = store
        .batch_update("people", vec![json!({"id": 1.0, "age": -5})], UpdateOptions::default())
        .unwrap_err();
    let failures = err.validation_errors().expect("validation error");
    assert_eq!(failures[0].row_index, 0);

    let row = store.find_one("people", &WhereCondition::all().eq("id", 1))?.unwrap();
    assert_eq!(row["age"], json!(30));

    let changed = store.batch_update(
        "people",
        vec![json!({"id": 1.0, "age": 31})],
        UpdateOptions::default(),
    )?;
    assert_eq!(changed, 1);
    store.flush().await;
    assert_eq!(read_file(&path), "{\"id\":1,\"age\":31}\n");
    Ok(())
}

#[tokio::test]
async fn test_backward_transform_on_sync() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, path) =
        open_with(&dir, "weather", "{\"city\":\"Oslo\",\"celsius\":5}\n", kelvin_schema()).await?;

    // the store holds output shape
    let oslo = store.find_one("weather", &WhereCondition::all())?.unwrap();
    assert_eq!(JsonValue::Object(oslo), json!({"city": "Oslo", "kelvin": 278}));

    store.insert("weather", json!({"city": "Rome", "celsius": 20}))?;
    store.flush().await;

    // files hold input shape
    assert_eq!(
        read_file(&path),
        "{\"city\":\"Oslo\",\"celsius\":5}\n{\"city\":\"Rome\",\"celsius\":20}\n"
    );
    Ok(())
}

#[tokio::test]
async fn test_update_runs_backward_before_validating() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, _) =
        open_with(&dir, "weather", "{\"city\":\"Oslo\",\"celsius\":5}\n", kelvin_schema()).await?;

    let changed = store.update(
        "weather",
        json!({"kelvin": 280}),
        &WhereCondition::all().eq("city", "Oslo"),
        UpdateOptions::default(),
    )?;
    assert_eq!(changed, 1);

    let err = store
        .update(
            "weather",
            json!({"kelvin": "hot"}),
            &WhereCondition::all().eq("city", "Oslo"),
            UpdateOptions::default(),
        )
        .unwrap_err();
    assert!(err.validation_errors().is_some());
    Ok(())
}

#[tokio::test]
async fn test_shape_change_without_backward_warns() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "t.jsonl", "{\"a\":1}\n{\"a\":2}\n");
    let logger = CollectingLogger::new();
    let schema = ValidationSchema::new(|input: &JsonValue| {
        ValidationOutcome::Valid(json!({"a": input["a"], "added": true}))
    });

    LineStore::open(
        [("t", TableSource::new(&path).validation(schema))],
        StoreConfig::new().logger(logger.clone()),
    )
    .await?;

    let warnings: Vec<_> = logger
        .messages(Level::Warn)
        .into_iter()
        .filter(|(_, message)| message.contains("backward"))
        .collect();
    assert_eq!(warnings.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unavailable_schema_loads_without_validation() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "people.jsonl", "{\"id\":1,\"age\":30}\n");

    let mut store = LineStore::open(
        [(
            "people",
            TableSource::new(&path).validation_unavailable("module not found"),
        )],
        StoreConfig::default(),
    )
    .await?;

    assert_eq!(store.get_table_names(), vec!["people".to_string()]);
    assert!(store.load_warnings()[0].message.contains("module not found"));
    // would fail the age rule
    store.insert("people", json!({"id": 2, "age": -1}))?;

    let strict = LineStore::open(
        [("people", TableSource::new(&path).validation_unavailable("gone"))],
        StoreConfig::new().strict_load(true),
    )
    .await;
    assert!(matches!(strict, Err(StoreError::SchemaLoad { .. })));
    Ok(())
}

#[tokio::test]
async fn test_async_validator_is_unsupported() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "t.jsonl", "{\"a\":1}\n");
    let schema = ValidationSchema::new(|_: &JsonValue| ValidationOutcome::Pending);

    let result = LineStore::open(
        [("t", TableSource::new(&path).validation(schema))],
        StoreConfig::new().strict_load(true),
    )
    .await;
    assert!(matches!(result, Err(StoreError::UnsupportedOperation(_))));
    Ok(())
}

#[tokio::test]
async fn test_record_shape_validator() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let shape = RecordShape::new()
        .required("id", FieldKind::Integer)
        .optional("name", FieldKind::String)
        .deny_unknown();
    let (mut store, _) = open_with(
        &dir,
        "users",
        "{\"id\":1,\"name\":\"a\"}\n",
        ValidationSchema::new(shape).primary_key(["id"]),
    )
    .await?;

    store.insert("users", json!({"id": 2}))?;
    let err = store
        .insert("users", json!({"id": "x", "nick": "y"}))
        .unwrap_err();
    assert_eq!(err.validation_errors().unwrap()[0].issues.len(), 2);
    Ok(())
}
