//! Logging sink
//!
//! The store never touches global logger state directly; every message goes
//! through an injected [`StoreLogger`].

use std::fmt;

pub trait StoreLogger: Send + Sync {
    fn debug(&self, table: &str, message: &str);
    fn warn(&self, table: &str, message: &str);
    fn error(&self, table: &str, message: &str);
}

/// Forwards to `tracing` with a structured `table` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl StoreLogger for TracingLogger {
    fn debug(&self, table: &str, message: &str) {
        tracing::debug!(table = table, "{}", message);
    }

    fn warn(&self, table: &str, message: &str) {
        tracing::warn!(table = table, "{}", message);
    }

    fn error(&self, table: &str, message: &str) {
        tracing::error!(table = table, "{}", message);
    }
}

/// A per-table load problem that did not abort opening the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub table: String,
    pub message: String,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table '{}': {}", self.table, self.message)
    }
}
