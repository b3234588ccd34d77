//! Identifier checks for table and column names
//!
//! Identifiers are always quoted when rendered into SQL, so the rules here
//! only keep out names the relational engine reserves or cannot store.

use crate::core::{StoreError, StoreResult};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TABLE_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-\.]*$").unwrap();
}

const MAX_IDENTIFIER_LEN: usize = 128;

/// Table names come from file stems: letters, digits, `_`, `-`, `.`.
pub fn validate_table_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidIdentifier(
            "Table name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(StoreError::InvalidIdentifier(format!(
            "Table name too long (max {} characters): {}",
            MAX_IDENTIFIER_LEN, name
        )));
    }

    if !TABLE_NAME.is_match(name) {
        return Err(StoreError::InvalidIdentifier(format!(
            "Table name must start with a letter or underscore and contain only letters, digits, '_', '-' or '.': {}",
            name
        )));
    }

    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(StoreError::InvalidIdentifier(format!(
            "Table name uses the reserved 'sqlite_' prefix: {}",
            name
        )));
    }

    Ok(())
}

/// Column names are JSON keys: anything non-empty without NUL bytes.
pub fn validate_column_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidIdentifier(
            "Column name cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(StoreError::InvalidIdentifier(format!(
            "Column name contains a NUL byte: {:?}",
            name
        )));
    }

    Ok(())
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    let escaped = ident.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}
