mod common;

use common::{CollectingLogger, Level, names, open_people, read_file, write_file};
use linestore::core::{SqlRow, SqlValue};
use linestore::{
    Column, ForeignKey, LineStore, RelationalEngine, SqliteEngine, StorageType, StoreConfig,
    StoreError, StoreResult, Table, TableSource, UpdateOptions, ValidationOutcome,
    ValidationSchema, WhereCondition,
};
use serde_json::{Value as JsonValue, json};
use tempfile::TempDir;

fn accept_all() -> ValidationSchema {
    ValidationSchema::new(|input: &JsonValue| ValidationOutcome::Valid(input.clone()))
}

#[tokio::test]
async fn test_insert_syncs_file() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, path) = open_people(&dir).await?;

    store.insert("people", json!({"n": "D", "a": 41}))?;
    assert_eq!(names(&store.find("people", &WhereCondition::all())?).len(), 4);

    store.flush().await;
    assert!(read_file(&path).ends_with("{\"n\":\"D\",\"a\":41}\n"));
    Ok(())
}

#[tokio::test]
async fn test_auto_sync_disabled() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "people.jsonl", common::PEOPLE);
    let mut store = LineStore::open(
        [("people", TableSource::new(&path))],
        StoreConfig::new().auto_sync(false),
    )
    .await?;

    store.insert("people", json!({"n": "D", "a": 41}))?;
    store.flush().await;
    assert_eq!(read_file(&path), common::PEOPLE);

    store.sync_table("people").await?;
    assert!(read_file(&path).contains("\"D\""));
    Ok(())
}

#[tokio::test]
async fn test_consecutive_auto_syncs_land_in_order() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, path) = open_people(&dir).await?;

    for age in 50..60 {
        store.insert("people", json!({"n": "X", "a": age}))?;
    }
    store.flush().await;

    let text = read_file(&path);
    assert_eq!(text.lines().count(), 13);
    assert!(text.ends_with("{\"n\":\"X\",\"a\":59}\n"));
    Ok(())
}

#[tokio::test]
async fn test_insert_unknown_column_rejected() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, _) = open_people(&dir).await?;

    let err = store
        .insert("people", json!({"n": "D", "zzz": 1}))
        .unwrap_err();
    assert!(matches!(err, StoreError::ColumnNotFound(..)));
    Ok(())
}

#[tokio::test]
async fn test_update_and_delete() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, path) = open_people(&dir).await?;

    let changed = store.update(
        "people",
        json!({"a": 26}),
        &WhereCondition::all().eq("n", "B"),
        UpdateOptions::default(),
    )?;
    assert_eq!(changed, 1);

    let deleted = store.delete(
        "people",
        &WhereCondition::any(vec![
            WhereCondition::all().eq("n", "A"),
            WhereCondition::all().eq("n", "C"),
        ]),
    )?;
    assert_eq!(deleted, 2);

    store.flush().await;
    assert_eq!(read_file(&path), "{\"n\":\"B\",\"a\":26}\n");
    Ok(())
}

#[tokio::test]
async fn test_predicates_rejected_in_update_and_delete() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, _) = open_people(&dir).await?;
    let condition = WhereCondition::all().test("a", |v| v.as_i64().is_some_and(|a| a > 26));

    let err = store
        .update("people", json!({"a": 0}), &condition, UpdateOptions::default())
        .unwrap_err();
    assert!(err.is_unsupported());

    let err = store.delete("people", &condition).unwrap_err();
    assert!(err.is_unsupported());

    assert_eq!(store.find("people", &WhereCondition::all())?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_primary_key_and_not_null_constraints() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "items.jsonl", "{\"id\":1,\"name\":\"a\"}\n");
    let mut store = LineStore::open(
        [(
            "items",
            TableSource::new(&path).validation(accept_all().primary_key(["id"])),
        )],
        StoreConfig::default(),
    )
    .await?;

    let err = store
        .insert("items", json!({"id": 1, "name": "dup"}))
        .unwrap_err();
    match err {
        StoreError::Constraint(message) => assert!(message.contains("UNIQUE"), "{}", message),
        other => panic!("expected constraint error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_foreign_keys_enforced_after_load() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let teams = write_file(&dir, "teams.jsonl", "{\"id\":1,\"name\":\"core\"}\n");
    // loads even though team 9 does not exist
    let people = write_file(
        &dir,
        "people.jsonl",
        "{\"id\":1,\"team_id\":1}\n{\"id\":2,\"team_id\":9}\n",
    );
    let teams_table = Table::new(
        "teams",
        vec![
            Column::new("id", StorageType::Integer).primary_key(),
            Column::new("name", StorageType::Text),
        ],
    );

    let mut store = LineStore::open(
        [
            ("people", TableSource::new(&people).validation(
                accept_all()
                    .primary_key(["id"])
                    .foreign_key(ForeignKey::new("team_id", "teams", "id")),
            )),
            ("teams", TableSource::new(&teams).explicit_schema(teams_table)),
        ],
        StoreConfig::default(),
    )
    .await?;
    assert_eq!(store.find("people", &WhereCondition::all())?.len(), 2);

    let err = store
        .insert("people", json!({"id": 3, "team_id": 42}))
        .unwrap_err();
    assert!(err.is_constraint(), "{:?}", err);

    store.insert("people", json!({"id": 3, "team_id": 1}))?;
    Ok(())
}

#[tokio::test]
async fn test_foreign_keys_can_be_disabled() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let teams = write_file(&dir, "teams.jsonl", "{\"id\":1}\n");
    let people = write_file(&dir, "people.jsonl", "{\"id\":1,\"team_id\":1}\n");

    let mut store = LineStore::open(
        [
            ("teams", TableSource::new(&teams).validation(accept_all().primary_key(["id"]))),
            ("people", TableSource::new(&people).validation(
                accept_all()
                    .primary_key(["id"])
                    .foreign_key(ForeignKey::new("team_id", "teams", "id")),
            )),
        ],
        StoreConfig::new().foreign_keys(false),
    )
    .await?;

    store.insert("people", json!({"id": 2, "team_id": 42}))?;
    Ok(())
}

#[tokio::test]
async fn test_batch_insert_is_all_or_nothing() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "items.jsonl", "{\"id\":1}\n");
    let mut store = LineStore::open(
        [("items", TableSource::new(&path).validation(accept_all().primary_key(["id"])))],
        StoreConfig::default(),
    )
    .await?;

    let err = store
        .batch_insert("items", vec![json!({"id": 2}), json!({"id": 1}), json!({"id": 3})])
        .unwrap_err();
    assert!(err.is_constraint());
    assert_eq!(store.find("items", &WhereCondition::all())?.len(), 1);

    let inserted = store.batch_insert("items", vec![json!({"id": 2}), json!({"id": 3})])?;
    assert_eq!(inserted, 2);
    Ok(())
}

#[tokio::test]
async fn test_batch_update_by_primary_key() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "items.jsonl",
        "{\"id\":1,\"qty\":1}\n{\"id\":2,\"qty\":2}\n",
    );
    let mut store = LineStore::open(
        [("items", TableSource::new(&path).validation(accept_all().primary_key(["id"])))],
        StoreConfig::default(),
    )
    .await?;

    let changed = store.batch_update(
        "items",
        vec![
            json!({"id": 1, "qty": 10}),
            json!({"id": 2, "qty": 20}),
            json!({"id": 99, "qty": 0}),
        ],
        UpdateOptions::default(),
    )?;
    assert_eq!(changed, 2);

    let err = store
        .batch_update("items", vec![json!({"qty": 5})], UpdateOptions::default())
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingPrimaryKey(_)));

    store.flush().await;
    assert_eq!(
        read_file(&path),
        "{\"id\":1,\"qty\":10}\n{\"id\":2,\"qty\":20}\n"
    );
    Ok(())
}

#[tokio::test]
async fn test_batch_operations_require_primary_key() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let (mut store, _) = open_people(&dir).await?;

    let err = store
        .batch_delete("people", vec![json!({"n": "A"})])
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingPrimaryKey(_)));
    Ok(())
}

#[tokio::test]
async fn test_batch_delete_single_and_composite_keys() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let single = write_file(&dir, "single.jsonl", "{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n");
    let pairs = write_file(
        &dir,
        "pairs.jsonl",
        "{\"a\":1,\"b\":\"x\"}\n{\"a\":1,\"b\":\"y\"}\n{\"a\":2,\"b\":\"x\"}\n",
    );
    let mut store = LineStore::open(
        [
            ("single", TableSource::new(&single).validation(accept_all().primary_key(["id"]))),
            ("pairs", TableSource::new(&pairs).validation(accept_all().primary_key(["a", "b"]))),
        ],
        StoreConfig::default(),
    )
    .await?;

    let deleted = store.batch_delete("single", vec![json!({"id": 1}), json!({"id": 3})])?;
    assert_eq!(deleted, 2);

    let deleted = store.batch_delete(
        "pairs",
        vec![json!({"a": 1, "b": "y"}), json!({"a": 2, "b": "x"})],
    )?;
    assert_eq!(deleted, 2);

    store.flush().await;
    assert_eq!(read_file(&single), "{\"id\":2}\n");
    assert_eq!(read_file(&pairs), "{\"a\":1,\"b\":\"x\"}\n");
    Ok(())
}

#[tokio::test]
async fn test_failed_auto_sync_is_logged_not_returned() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "people.jsonl", common::PEOPLE);
    let logger = CollectingLogger::new();
    let mut store = LineStore::open(
        [("people", TableSource::new(&path))],
        StoreConfig::new().logger(logger.clone()),
    )
    .await?;

    // a directory where the file should be makes the rename fail
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();

    store.insert("people", json!({"n": "D", "a": 1}))?;
    store.flush().await;

    assert!(logger
        .messages(Level::Error)
        .iter()
        .any(|(table, message)| table == "people" && message.contains("auto-sync failed")));
    Ok(())
}

/// SQLite engine that refuses to roll back to a savepoint.
struct StuckSavepoints(SqliteEngine);

impl RelationalEngine for StuckSavepoints {
    fn exec(&mut self, sql: &str) -> StoreResult<()> {
        if sql.starts_with("ROLLBACK TO SAVEPOINT") {
            return Err(StoreError::Database("rollback refused".into()));
        }
        self.0.exec(sql)
    }

    fn run(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<usize> {
        self.0.run(sql, params)
    }

    fn all(&self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<SqlRow>> {
        self.0.all(sql, params)
    }

    fn is_read_only(&self, sql: &str) -> StoreResult<bool> {
        self.0.is_read_only(sql)
    }

    fn set_foreign_keys(&mut self, enabled: bool) -> StoreResult<()> {
        self.0.set_foreign_keys(enabled)
    }

    fn close(&mut self) -> StoreResult<()> {
        self.0.close()
    }

    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

#[tokio::test]
async fn test_failed_savepoint_rollback_is_logged() -> StoreResult<()> {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "items.jsonl", "{\"id\":1}\n");
    let logger = CollectingLogger::new();
    let mut store = LineStore::open_with_engine(
        Box::new(StuckSavepoints(SqliteEngine::open_in_memory()?)),
        [("items", TableSource::new(&path).validation(accept_all().primary_key(["id"])))],
        StoreConfig::new().logger(logger.clone()),
    )
    .await?;

    // the constraint error is still what the caller sees
    let err = store
        .batch_insert("items", vec![json!({"id": 2}), json!({"id": 1})])
        .unwrap_err();
    assert!(err.is_constraint(), "{:?}", err);

    assert!(logger
        .messages(Level::Error)
        .iter()
        .any(|(table, message)| table == "items"
            && message.contains("rollback to savepoint batch_insert failed")));
    Ok(())
}
