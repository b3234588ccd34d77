use crate::core::{SqlRow, SqlValue, StoreError, StoreResult};
use rusqlite::{Connection, params_from_iter};

/// Relational engine - allows pluggable SQL backends.
///
/// Statements use positional `?` parameters. All calls are synchronous.
pub trait RelationalEngine: Send {
    /// Execute one or more statements without parameters (DDL, transaction
    /// control).
    fn exec(&mut self, sql: &str) -> StoreResult<()>;

    /// Execute a single statement and return the number of changed rows.
    fn run(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<usize>;

    /// Fetch every result row.
    fn all(&self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<SqlRow>>;

    /// Fetch the first result row.
    fn get(&self, sql: &str, params: &[SqlValue]) -> StoreResult<Option<SqlRow>> {
        Ok(self.all(sql, params)?.into_iter().next())
    }

    /// True if the statement cannot modify the database.
    fn is_read_only(&self, sql: &str) -> StoreResult<bool>;

    fn set_foreign_keys(&mut self, enabled: bool) -> StoreResult<()>;

    /// Close the connection. Closing twice is a no-op.
    fn close(&mut self) -> StoreResult<()>;

    fn is_closed(&self) -> bool;
}

/// In-memory SQLite database.
pub struct SqliteEngine {
    conn: Option<Connection>,
}

impl SqliteEngine {
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }
}

impl RelationalEngine for SqliteEngine {
    fn exec(&mut self, sql: &str) -> StoreResult<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn run(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<usize> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(sql)?;
        if stmt.column_count() == 0 {
            return Ok(stmt.execute(params_from_iter(params.iter()))?);
        }

        // Row-returning statement: drain it. `changes()` still holds the
        // count of an earlier write after a plain read, so only writes
        // (`... RETURNING`) report it.
        let writes = !stmt.readonly();
        {
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            while rows.next()?.is_some() {}
        }
        if !writes {
            return Ok(0);
        }
        Ok(usize::try_from(conn.changes()).unwrap_or(usize::MAX))
    }

    fn all(&self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<SqlRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                values.push((name.clone(), row.get::<_, SqlValue>(idx)?));
            }
            out.push(values);
        }
        Ok(out)
    }

    fn is_read_only(&self, sql: &str) -> StoreResult<bool> {
        let stmt = self.conn()?.prepare(sql)?;
        Ok(stmt.readonly())
    }

    fn set_foreign_keys(&mut self, enabled: bool) -> StoreResult<()> {
        let pragma = if enabled {
            "PRAGMA foreign_keys = ON;"
        } else {
            "PRAGMA foreign_keys = OFF;"
        };
        self.exec(pragma)
    }

    fn close(&mut self) -> StoreResult<()> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, err)| err.into()),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SqliteEngine {
        let mut engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .exec("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        engine
    }

    #[test]
    fn test_run_and_all() {
        let mut engine = engine();
        let changed = engine
            .run(
                "INSERT INTO t (id, name) VALUES (?, ?)",
                &[SqlValue::Integer(1), SqlValue::Text("a".into())],
            )
            .unwrap();
        assert_eq!(changed, 1);

        let rows = engine.all("SELECT * FROM t", &[]).unwrap();
        assert_eq!(
            rows,
            vec![vec![
                ("id".to_string(), SqlValue::Integer(1)),
                ("name".to_string(), SqlValue::Text("a".into())),
            ]]
        );
        assert!(engine.get("SELECT * FROM t WHERE id = ?", &[SqlValue::Integer(9)]).unwrap().is_none());
    }

    #[test]
    fn test_constraint_error_mapped() {
        let mut engine = engine();
        engine.run("INSERT INTO t (id) VALUES (1)", &[]).unwrap();
        let err = engine.run("INSERT INTO t (id) VALUES (1)", &[]).unwrap_err();
        assert!(err.is_constraint(), "{:?}", err);
    }

    #[test]
    fn test_returning_statement_reports_changes() {
        let mut engine = engine();
        engine.run("INSERT INTO t (id, name) VALUES (1, 'a'), (2, 'b')", &[]).unwrap();

        let deleted = engine.run("DELETE FROM t RETURNING *", &[]).unwrap();
        assert_eq!(deleted, 2);
        // a read after a write reports nothing changed
        assert_eq!(engine.run("SELECT * FROM t", &[]).unwrap(), 0);
    }

    #[test]
    fn test_read_only_detection() {
        let engine = engine();
        assert!(engine.is_read_only("SELECT * FROM t").unwrap());
        assert!(!engine.is_read_only("DELETE FROM t").unwrap());
    }

    #[test]
    fn test_close_twice_then_closed() {
        let mut engine = engine();
        engine.close().unwrap();
        engine.close().unwrap();
        assert!(engine.is_closed());
        assert!(matches!(engine.all("SELECT 1", &[]), Err(StoreError::Closed)));
    }
}
