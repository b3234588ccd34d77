//! Line-delimited record files
//!
//! One JSON object per line, full-file semantics: `read` returns every
//! record, `write` replaces the whole file.

use crate::core::value::as_record;
use crate::core::{Record, StoreError, StoreResult};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, BufReader};

#[async_trait]
pub trait RecordFile: Send + Sync {
    /// Read every record. A missing file holds zero records.
    async fn read(&self, path: &Path) -> StoreResult<Vec<Record>>;

    /// Overwrite the file with `records`, one per line.
    async fn write(&self, path: &Path, records: Vec<Record>) -> StoreResult<()>;
}

/// JSON Lines on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesFile;

impl JsonLinesFile {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RecordFile for JsonLinesFile {
    async fn read(&self, path: &Path) -> StoreResult<Vec<Record>> {
        let file = match OpenOptions::new().read(true).open(path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(StoreError::Io(format!(
                    "Failed to open '{}': {}",
                    path.display(),
                    err
                )));
            }
        };

        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::new();
        let mut line_no = 0usize;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|err| StoreError::Io(format!("Failed to read '{}': {}", path.display(), err)))?
        {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let value = serde_json::from_str(&line).map_err(|err| {
                StoreError::Json(format!("{}:{}: {}", path.display(), line_no, err))
            })?;
            records.push(as_record(value, &format!("{}:{}", path.display(), line_no))?);
        }

        Ok(records)
    }

    async fn write(&self, path: &Path, records: Vec<Record>) -> StoreResult<()> {
        let mut bytes = Vec::new();
        for record in &records {
            serde_json::to_writer(&mut bytes, record)?;
            bytes.push(b'\n');
        }
        atomic_write(path.to_path_buf(), bytes).await
    }
}

/// Write to a temp file in the target's directory, then rename over it.
async fn atomic_write(path: PathBuf, bytes: Vec<u8>) -> StoreResult<()> {
    tokio::task::spawn_blocking(move || -> StoreResult<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|err| {
            StoreError::Io(format!(
                "Failed to create parent directory '{}': {}",
                parent.display(),
                err
            ))
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(|err| {
            StoreError::Io(format!(
                "Failed to create temp file in '{}': {}",
                parent.display(),
                err
            ))
        })?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|err| {
            StoreError::Io(format!(
                "Failed to rename temp file -> '{}': {}",
                path.display(),
                err.error
            ))
        })?;
        Ok(())
    })
    .await?
}
