//! JSON to SQL Converter
//!
//! Builds parameterized SQL statements using the Builder pattern. Values are
//! never spliced into the SQL text; every builder returns the statement
//! together with its positional parameters.

use super::identifiers::quote_ident;
use crate::core::{Record, SqlValue, StoreResult, Table};
use crate::core::value::json_to_sql;

/// SQL text plus positional (`?`) parameters in binding order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Convert every key of `record` into a bound value for `table`.
/// Keys without a matching column are rejected.
pub fn record_values(table: &Table, record: &Record) -> StoreResult<Vec<(String, SqlValue)>> {
    record
        .iter()
        .map(|(key, value)| {
            let column = table.require_column(key)?;
            Ok((key.clone(), json_to_sql(value, Some(column))?))
        })
        .collect()
}

/// Builder for CREATE TABLE SQL statements
pub struct CreateTableBuilder<'a> {
    table: &'a Table,
}

impl<'a> CreateTableBuilder<'a> {
    pub fn from_table(table: &'a Table) -> Self {
        Self { table }
    }

    pub fn build(self) -> String {
        let composite_pk = self.table.primary_key.len() > 1;

        let mut defs: Vec<String> = self
            .table
            .columns()
            .iter()
            .map(|column| {
                let mut def = quote_ident(&column.name);
                let sql_type = column.storage_type.sql_type();
                if !sql_type.is_empty() {
                    def.push(' ');
                    def.push_str(sql_type);
                }
                if column.primary_key && !composite_pk {
                    def.push_str(" PRIMARY KEY");
                }
                if column.not_null {
                    def.push_str(" NOT NULL");
                }
                if column.unique && !column.primary_key {
                    def.push_str(" UNIQUE");
                }
                def
            })
            .collect();

        if composite_pk {
            defs.push(format!("PRIMARY KEY ({})", quote_list(&self.table.primary_key)));
        }

        for fk in &self.table.foreign_keys {
            let mut def = format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_list(&fk.columns),
                quote_ident(&fk.references_table),
                quote_list(&fk.references_columns)
            );
            if let Some(action) = fk.on_delete {
                def.push_str(" ON DELETE ");
                def.push_str(action.as_sql());
            }
            defs.push(def);
        }

        format!(
            "CREATE TABLE {} ({})",
            quote_ident(&self.table.name),
            defs.join(", ")
        )
    }
}

/// CREATE INDEX statements for every index declared on `table`.
pub fn create_index_statements(table: &Table) -> Vec<String> {
    table
        .indexes
        .iter()
        .map(|index| {
            format!(
                "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
                if index.unique { "UNIQUE " } else { "" },
                quote_ident(&index.resolved_name(&table.name)),
                quote_ident(&table.name),
                quote_list(&index.columns)
            )
        })
        .collect()
}

/// Builder for INSERT SQL statements
pub struct InsertStatementBuilder {
    table_name: String,
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl InsertStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: SqlValue) -> Self {
        self.columns.push(column.into());
        self.values.push(value);
        self
    }

    pub fn values(mut self, values: Vec<(String, SqlValue)>) -> Self {
        for (column, value) in values {
            self.columns.push(column);
            self.values.push(value);
        }
        self
    }

    pub fn build(self) -> Statement {
        if self.columns.is_empty() {
            return Statement::new(
                format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&self.table_name)),
                Vec::new(),
            );
        }

        let placeholders = vec!["?"; self.columns.len()].join(", ");
        Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&self.table_name),
                quote_list(&self.columns),
                placeholders
            ),
            self.values,
        )
    }
}

/// Builder for UPDATE SQL statements
pub struct UpdateStatementBuilder {
    table_name: String,
    set_clause: Vec<(String, SqlValue)>,
    where_clause: Option<(String, Vec<SqlValue>)>,
}

impl UpdateStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            set_clause: Vec::new(),
            where_clause: None,
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: SqlValue) -> Self {
        self.set_clause.push((column.into(), value));
        self
    }

    pub fn set_multiple(mut self, updates: Vec<(String, SqlValue)>) -> Self {
        self.set_clause.extend(updates);
        self
    }

    pub fn where_clause(mut self, condition: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.where_clause = Some((condition.into(), params));
        self
    }

    pub fn build(self) -> Statement {
        let mut params = Vec::with_capacity(self.set_clause.len());
        let set_parts: Vec<String> = self
            .set_clause
            .into_iter()
            .map(|(col, val)| {
                params.push(val);
                format!("{} = ?", quote_ident(&col))
            })
            .collect();

        let where_part = match self.where_clause {
            Some((sql, where_params)) => {
                params.extend(where_params);
                format!(" WHERE {}", sql)
            }
            None => String::new(),
        };

        Statement::new(
            format!(
                "UPDATE {} SET {}{}",
                quote_ident(&self.table_name),
                set_parts.join(", "),
                where_part
            ),
            params,
        )
    }
}

/// Builder for DELETE SQL statements
pub struct DeleteStatementBuilder {
    table_name: String,
    where_clause: Option<(String, Vec<SqlValue>)>,
}

impl DeleteStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            where_clause: None,
        }
    }

    pub fn where_clause(mut self, condition: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.where_clause = Some((condition.into(), params));
        self
    }

    pub fn build(self) -> Statement {
        match self.where_clause {
            Some((sql, params)) => Statement::new(
                format!("DELETE FROM {} WHERE {}", quote_ident(&self.table_name), sql),
                params,
            ),
            None => Statement::new(
                format!("DELETE FROM {}", quote_ident(&self.table_name)),
                Vec::new(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Builder for SELECT SQL statements over a single table
pub struct SelectStatementBuilder {
    table_name: String,
    where_clause: Option<(String, Vec<SqlValue>)>,
    order_by: Vec<(String, Direction)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl SelectStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn where_clause(mut self, condition: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.where_clause = Some((condition.into(), params));
        self
    }

    pub fn order_by(mut self, order_by: Vec<(String, Direction)>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<usize>) -> Self {
        self.offset = offset;
        self
    }

    pub fn build(self) -> Statement {
        let mut sql = format!("SELECT * FROM {}", quote_ident(&self.table_name));
        let mut params = Vec::new();

        if let Some((condition, where_params)) = self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
            params = where_params;
        }

        if self.order_by.is_empty() {
            sql.push_str(" ORDER BY rowid");
        } else {
            let parts: Vec<String> = self
                .order_by
                .iter()
                .map(|(col, dir)| {
                    let dir = match dir {
                        Direction::Asc => "ASC",
                        Direction::Desc => "DESC",
                    };
                    format!("{} {}", quote_ident(col), dir)
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }

        // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        Statement::new(sql, params)
    }
}

pub(crate) fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ")
}
