use super::config::StoreConfig;
use super::logging::LoadWarning;
use super::mutations::{insert_statement, with_savepoint};
use crate::core::value::{decode_raw_row, decode_table_row, json_to_sql};
use crate::core::{Record, SqlValue, StoreError, StoreResult, Table};
use crate::json::converter::{CreateTableBuilder, SelectStatementBuilder, create_index_statements};
use crate::json::identifiers::validate_table_name;
use crate::json::Direction;
use crate::query::{PredicateCompiler, WhereCondition};
use crate::storage::{RelationalEngine, SqliteEngine, TableSource};
use crate::validation::pipeline::{changes_shape, enhance_table};
use crate::validation::{SchemaSource, ValidationPipeline, ValidationSchema};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoreState {
    Active,
    InTransaction,
    Closed,
}

/// A loaded table and where it syncs to.
pub(crate) struct TableEntry {
    pub table: Table,
    pub source_path: PathBuf,
    pub validation: Option<ValidationSchema>,
}

/// Ordering and paging for [`LineStore::find_with`].
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub order_by: Vec<(String, Direction)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// A set of line-delimited JSON files served as relational tables.
///
/// Every file is loaded into an in-memory SQLite database at open. Reads
/// go to the database; mutations write to the database and then rewrite
/// the table's file.
///
/// # Round trips
///
/// A synced line holds the same values as the row it came from, with two
/// exceptions:
///
/// - Keys whose value is `null` are left out. The database cannot tell a
///   null column from an absent key, so `{"id":1,"x":null}` syncs as
///   `{"id":1}`.
/// - A column holds the JSON kinds it was inferred or declared with. A
///   value of another kind is rejected with [`StoreError::InvalidRecord`]
///   rather than stored in a form that would read back differently.
///   Columns that held mixed kinds, or only nulls, at load accept
///   anything.
///
/// # Examples
///
/// ```no_run
/// use linestore::{LineStore, StoreConfig, TableSource, WhereCondition};
/// use serde_json::json;
///
/// # async fn run() -> linestore::StoreResult<()> {
/// let mut store = LineStore::open(
///     [("people", TableSource::new("data/people.jsonl"))],
///     StoreConfig::default(),
/// )
/// .await?;
///
/// store.insert("people", json!({"name": "Ada", "age": 36}))?;
/// let adults = store.find(
///     "people",
///     &WhereCondition::all().test("age", |v| v.as_i64().is_some_and(|a| a >= 18)),
/// )?;
/// store.flush().await;
/// # Ok(())
/// # }
/// ```
pub struct LineStore {
    pub(crate) engine: Box<dyn RelationalEngine>,
    pub(crate) tables: BTreeMap<String, TableEntry>,
    pub(crate) state: StoreState,
    pub(crate) config: StoreConfig,
    pub(crate) runtime: Handle,
    pub(crate) pending_syncs: HashMap<String, JoinHandle<()>>,
    load_warnings: Vec<LoadWarning>,
}

impl LineStore {
    /// Load every table into a fresh in-memory SQLite database.
    pub async fn open<I, S>(sources: I, config: StoreConfig) -> StoreResult<Self>
    where
        I: IntoIterator<Item = (S, TableSource)>,
        S: Into<String>,
    {
        let engine = SqliteEngine::open_in_memory()?;
        Self::open_with_engine(Box::new(engine), sources, config).await
    }

    /// Load every table into the given engine.
    pub async fn open_with_engine<I, S>(
        mut engine: Box<dyn RelationalEngine>,
        sources: I,
        config: StoreConfig,
    ) -> StoreResult<Self>
    where
        I: IntoIterator<Item = (S, TableSource)>,
        S: Into<String>,
    {
        let runtime = Handle::try_current().map_err(|_| {
            StoreError::UnsupportedOperation("LineStore must be opened inside a Tokio runtime".into())
        })?;

        // Rows are loaded table by table, so references may point forward
        engine.set_foreign_keys(false)?;

        let mut store = Self {
            engine,
            tables: BTreeMap::new(),
            state: StoreState::Active,
            config,
            runtime,
            pending_syncs: HashMap::new(),
            load_warnings: Vec::new(),
        };

        for (name, source) in sources {
            let name = name.into();
            if let Err(err) = store.load_table(&name, source).await {
                if store.config.strict_load {
                    return Err(err);
                }
                store.record_warning(&name, format!("table not loaded: {}", err));
            }
        }

        let foreign_keys = store.config.foreign_keys;
        store.engine.set_foreign_keys(foreign_keys)?;
        Ok(store)
    }

    async fn load_table(&mut self, name: &str, source: TableSource) -> StoreResult<()> {
        validate_table_name(name)?;
        let records = self.config.record_file.read(&source.source_path).await?;

        let validation = match source.validation {
            Some(SchemaSource::Resolved(schema)) => Some(schema),
            Some(SchemaSource::Unavailable { reason }) => {
                let err = StoreError::SchemaLoad {
                    table: name.to_string(),
                    reason,
                };
                if self.config.strict_load {
                    return Err(err);
                }
                self.record_warning(name, format!("{}; loading without validation", err));
                None
            }
            None => None,
        };

        let inputs: Vec<JsonValue> = records.into_iter().map(JsonValue::Object).collect();
        let rows = ValidationPipeline::new(name, validation.as_ref()).validate_all(&inputs)?;

        if let Some(schema) = &validation {
            if !schema.has_backward()
                && inputs.iter().zip(&rows).any(|(input, output)| changes_shape(input, output))
            {
                self.config.logger.warn(
                    name,
                    "validator changes the record shape but declares no backward transform; \
                     synced lines will be written in output shape",
                );
            }
        }

        let table = match source.explicit_schema {
            Some(mut table) => {
                table.name = name.to_string();
                table
            }
            None if source.auto_infer => {
                let sample: Vec<JsonValue> = rows.iter().cloned().map(JsonValue::Object).collect();
                self.config.inference_engine().infer_schema(name, &sample)?
            }
            None => {
                return Err(StoreError::Inference {
                    table: name.to_string(),
                    reason: "no explicit schema given and inference is disabled".into(),
                });
            }
        };

        let table = match &validation {
            Some(schema) => enhance_table(table, schema)?,
            None => table,
        };

        let mut ddl = vec![CreateTableBuilder::from_table(&table).build()];
        ddl.extend(create_index_statements(&table));
        let inserts = rows
            .iter()
            .map(|row| insert_statement(&table, row))
            .collect::<StoreResult<Vec<_>>>()?;

        with_savepoint(
            self.engine.as_mut(),
            self.config.logger.as_ref(),
            name,
            "load_table",
            |engine| {
                for sql in &ddl {
                    engine.exec(sql)?;
                }
                for stmt in &inserts {
                    engine.run(&stmt.sql, &stmt.params)?;
                }
                Ok(())
            },
        )?;

        self.config
            .logger
            .debug(name, &format!("loaded {} rows", inserts.len()));

        self.tables.insert(
            name.to_string(),
            TableEntry {
                table,
                source_path: source.source_path,
                validation,
            },
        );
        Ok(())
    }

    fn record_warning(&mut self, table: &str, message: String) {
        self.config.logger.warn(table, &message);
        self.load_warnings.push(LoadWarning {
            table: table.to_string(),
            message,
        });
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Rows of `table` matching `condition`, in insertion order.
    pub fn find(&self, table: &str, condition: &WhereCondition) -> StoreResult<Vec<Record>> {
        self.find_with(table, condition, FindOptions::default())
    }

    pub fn find_one(&self, table: &str, condition: &WhereCondition) -> StoreResult<Option<Record>> {
        let mut rows = self.find_with(table, condition, FindOptions::new().limit(1))?;
        Ok(rows.pop())
    }

    pub fn find_with(
        &self,
        table: &str,
        condition: &WhereCondition,
        options: FindOptions,
    ) -> StoreResult<Vec<Record>> {
        self.ensure_open()?;
        let entry = self.entry(table)?;
        let compiled = PredicateCompiler::new(&entry.table).compile(condition)?;
        for (column, _) in &options.order_by {
            entry.table.require_column(column)?;
        }

        let residual = compiled.has_residual();
        let mut select = SelectStatementBuilder::new(table)
            .where_clause(compiled.sql.clone(), compiled.params.clone())
            .order_by(options.order_by);
        if !residual {
            select = select.limit(options.limit).offset(options.offset);
        }
        let stmt = select.build();

        let mut matched = Vec::new();
        for row in self.engine.all(&stmt.sql, &stmt.params)? {
            let record = decode_table_row(row, &entry.table)?;
            if compiled.accepts(&record) {
                matched.push(record);
            }
        }

        if residual {
            // Paging applies to rows that passed the residual filter
            matched = matched
                .into_iter()
                .skip(options.offset.unwrap_or(0))
                .take(options.limit.unwrap_or(usize::MAX))
                .collect();
        }

        Ok(matched)
    }

    /// Run a raw SQL query. Columns decode by their runtime type.
    pub fn query(&self, sql: &str, params: &[JsonValue]) -> StoreResult<Vec<Record>> {
        self.ensure_open()?;
        let params = bind_params(params)?;
        self.engine
            .all(sql, &params)?
            .into_iter()
            .map(decode_raw_row)
            .collect()
    }

    pub fn query_one(&self, sql: &str, params: &[JsonValue]) -> StoreResult<Option<Record>> {
        self.ensure_open()?;
        let params = bind_params(params)?;
        self.engine.get(sql, &params)?.map(decode_raw_row).transpose()
    }

    /// Run a raw SQL statement and return the number of changed rows.
    ///
    /// A statement that can write triggers a sync of every table, since the
    /// store cannot tell which tables it touched.
    pub fn execute(&mut self, sql: &str, params: &[JsonValue]) -> StoreResult<usize> {
        self.ensure_open()?;
        let params = bind_params(params)?;
        let read_only = self.engine.is_read_only(sql)?;
        let changed = self.engine.run(sql, &params)?;
        if !read_only {
            self.after_mutation_all();
        }
        Ok(changed)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn get_schema(&self, table: &str) -> StoreResult<&Table> {
        self.ensure_open()?;
        Ok(&self.entry(table)?.table)
    }

    pub fn get_table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Tables that were dropped or degraded while opening.
    pub fn load_warnings(&self) -> &[LoadWarning] {
        &self.load_warnings
    }

    pub fn is_closed(&self) -> bool {
        self.state == StoreState::Closed
    }

    /// Roll back any open transaction and close the database. Pending
    /// file writes keep running; await [`LineStore::flush`] first to wait
    /// for them. Closing twice is a no-op.
    pub fn close(&mut self) -> StoreResult<()> {
        match self.state {
            StoreState::Closed => return Ok(()),
            StoreState::InTransaction => {
                if let Err(err) = self.engine.exec("ROLLBACK") {
                    self.config
                        .logger
                        .error("", &format!("rollback on close failed: {}", err));
                }
            }
            StoreState::Active => {}
        }
        self.state = StoreState::Closed;
        self.engine.close()
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    pub(crate) fn ensure_open(&self) -> StoreResult<()> {
        if self.state == StoreState::Closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    pub(crate) fn entry(&self, table: &str) -> StoreResult<&TableEntry> {
        self.tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }
}

fn bind_params(params: &[JsonValue]) -> StoreResult<Vec<SqlValue>> {
    params.iter().map(|value| json_to_sql(value, None)).collect()
}
