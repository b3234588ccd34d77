//! File sync
//!
//! A sync rewrites a table's whole file from the database's current rows,
//! mapped back to input shape through the table's backward transform.
//! Auto-syncs are fire-and-forget tasks chained per table, so the file
//! always ends with the most recent snapshot.

use super::store::LineStore;
use crate::core::value::{as_record, decode_table_row};
use crate::core::{Record, StoreError, StoreResult};
use crate::json::converter::SelectStatementBuilder;
use futures::future::join_all;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::Arc;

impl LineStore {
    /// Rewrite `table`'s file and wait for the write.
    pub async fn sync_table(&mut self, table: &str) -> StoreResult<()> {
        self.ensure_open()?;
        // An older scheduled write must not land after this one
        self.wait_pending(table).await;

        let (path, records) = self.snapshot(table)?;
        let count = records.len();
        self.config.record_file.write(&path, records).await?;
        self.config
            .logger
            .debug(table, &format!("synced {} rows to {}", count, path.display()));
        Ok(())
    }

    /// Rewrite every table's file. All tables are attempted; the first
    /// failure is returned.
    pub async fn sync(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        let mut first_error: Option<StoreError> = None;
        for table in self.get_table_names() {
            if let Err(err) = self.sync_table(&table).await {
                self.config
                    .logger
                    .error(&table, &format!("sync failed: {}", err));
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Wait for every scheduled auto-sync to finish.
    pub async fn flush(&mut self) {
        let (tables, handles): (Vec<String>, Vec<_>) = self.pending_syncs.drain().unzip();
        for (table, result) in tables.iter().zip(join_all(handles).await) {
            if let Err(err) = result {
                self.config
                    .logger
                    .error(table, &format!("sync task failed: {}", err));
            }
        }
    }

    async fn wait_pending(&mut self, table: &str) {
        if let Some(handle) = self.pending_syncs.remove(table) {
            if let Err(err) = handle.await {
                self.config
                    .logger
                    .error(table, &format!("sync task failed: {}", err));
            }
        }
    }

    /// Snapshot `table` now and write it in the background. Failures are
    /// logged, never returned.
    pub(crate) fn schedule_sync(&mut self, table: &str) {
        let (path, records) = match self.snapshot(table) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.config
                    .logger
                    .error(table, &format!("auto-sync failed: {}", err));
                return;
            }
        };

        let previous = self.pending_syncs.remove(table);
        let record_file = Arc::clone(&self.config.record_file);
        let logger = Arc::clone(&self.config.logger);
        let name = table.to_string();

        let handle = self.runtime.spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            let count = records.len();
            match record_file.write(&path, records).await {
                Ok(()) => logger.debug(&name, &format!("synced {} rows", count)),
                Err(err) => logger.error(&name, &format!("auto-sync failed: {}", err)),
            }
        });
        self.pending_syncs.insert(table.to_string(), handle);
    }

    /// Current rows of `table` in input shape, plus the file they go to.
    fn snapshot(&self, table: &str) -> StoreResult<(PathBuf, Vec<Record>)> {
        let entry = self.entry(table)?;
        let stmt = SelectStatementBuilder::new(table).build();

        let mut records = Vec::new();
        for row in self.engine.all(&stmt.sql, &stmt.params)? {
            let record = decode_table_row(row, &entry.table)?;
            let record = match &entry.validation {
                Some(schema) if schema.has_backward() => as_record(
                    schema.backward(&JsonValue::Object(record)),
                    "backward transform output",
                )?,
                _ => record,
            };
            records.push(record);
        }
        Ok((entry.source_path.clone(), records))
    }
}
