//! Transactions
//!
//! One transaction at a time. While it is open, mutations skip their
//! auto-sync; a successful commit syncs every table, a rollback syncs
//! nothing.

use super::store::{LineStore, StoreState};
use crate::core::{StoreError, StoreResult};
use std::panic::{self, AssertUnwindSafe};

impl LineStore {
    pub fn in_transaction(&self) -> bool {
        self.state == StoreState::InTransaction
    }

    /// Issue BEGIN. Nested transactions are rejected.
    pub fn begin(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        if self.state == StoreState::InTransaction {
            return Err(StoreError::UnsupportedOperation(
                "Transaction already active; nested transactions are not supported".into(),
            ));
        }

        self.engine.exec("BEGIN")?;
        self.state = StoreState::InTransaction;
        Ok(())
    }

    /// Issue COMMIT, then wait for earlier auto-syncs and sync every table.
    ///
    /// If COMMIT fails the transaction is rolled back and the error is
    /// returned.
    pub async fn commit(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        if self.state != StoreState::InTransaction {
            return Err(StoreError::UnsupportedOperation("No active transaction".into()));
        }

        let committed = self.engine.exec("COMMIT");
        self.state = StoreState::Active;
        if let Err(err) = committed {
            self.rollback_quietly();
            return Err(err);
        }

        self.flush().await;
        self.sync().await
    }

    /// Issue ROLLBACK. Nothing is synced.
    pub fn rollback(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        if self.state != StoreState::InTransaction {
            return Err(StoreError::UnsupportedOperation("No active transaction".into()));
        }

        self.state = StoreState::Active;
        self.engine.exec("ROLLBACK")
    }

    /// Run `f` between BEGIN and COMMIT.
    ///
    /// If `f` returns an error or panics the transaction is rolled back and
    /// the error (or panic) is passed on; no file is touched.
    ///
    /// ```no_run
    /// # use linestore::{LineStore, StoreResult};
    /// # use serde_json::json;
    /// # async fn run(store: &mut LineStore) -> StoreResult<()> {
    /// store
    ///     .transaction(|tx| {
    ///         tx.insert("teams", json!({"id": 1, "name": "core"}))?;
    ///         tx.insert("people", json!({"id": 7, "team_id": 1}))?;
    ///         Ok(())
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn transaction<F, T>(&mut self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut LineStore) -> StoreResult<T>,
    {
        self.begin()?;

        match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(Ok(value)) => {
                self.commit().await?;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.rollback_quietly();
                Err(err)
            }
            Err(payload) => {
                self.rollback_quietly();
                panic::resume_unwind(payload)
            }
        }
    }

    /// Roll back if a transaction is still open; log a failed ROLLBACK.
    fn rollback_quietly(&mut self) {
        if self.state == StoreState::Closed {
            return;
        }
        self.state = StoreState::Active;
        if let Err(err) = self.engine.exec("ROLLBACK") {
            self.config
                .logger
                .debug("", &format!("rollback failed: {}", err));
        }
    }
}
