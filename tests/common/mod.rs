#![allow(dead_code)]

use linestore::{LineStore, StoreConfig, StoreLogger, StoreResult, TableSource};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const PEOPLE: &str = "{\"n\":\"A\",\"a\":30}\n{\"n\":\"B\",\"a\":25}\n{\"n\":\"C\",\"a\":35}\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Level {
    Debug,
    Warn,
    Error,
}

/// Logger that keeps every message for assertions.
#[derive(Default)]
pub struct CollectingLogger {
    entries: Mutex<Vec<(Level, String, String)>>,
}

impl CollectingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self, level: Level) -> Vec<(String, String)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _, _)| *l == level)
            .map(|(_, table, message)| (table.clone(), message.clone()))
            .collect()
    }

    fn push(&self, level: Level, table: &str, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, table.to_string(), message.to_string()));
    }
}

impl StoreLogger for CollectingLogger {
    fn debug(&self, table: &str, message: &str) {
        self.push(Level::Debug, table, message);
    }

    fn warn(&self, table: &str, message: &str) {
        self.push(Level::Warn, table, message);
    }

    fn error(&self, table: &str, message: &str) {
        self.push(Level::Error, table, message);
    }
}

pub fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// One `people` table loaded from [`PEOPLE`].
pub async fn open_people(dir: &TempDir) -> StoreResult<(LineStore, PathBuf)> {
    let path = write_file(dir, "people.jsonl", PEOPLE);
    let store = LineStore::open(
        [("people", TableSource::new(&path))],
        StoreConfig::default(),
    )
    .await?;
    Ok((store, path))
}

pub fn names(rows: &[linestore::Record]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get("n").and_then(|v| v.as_str()).map(String::from))
        .collect()
}
