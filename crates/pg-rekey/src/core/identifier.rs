//! Identifier validation and quoting for dynamically built DDL.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! identifier spliced into DDL goes through [`quote_pg`]: it is validated
//! (non-empty, no null bytes, within PostgreSQL's length limit) and then
//! double-quoted with embedded quotes doubled. Catalog lookups never splice
//! identifiers; they bind them as parameters.

use sha2::{Digest, Sha256};

use crate::error::{MigrateError, Result};

/// PostgreSQL truncates identifiers longer than NAMEDATALEN - 1 bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Check that a table, column or constraint name can be used as-is.
///
/// Names over the server limit are rejected, never truncated.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// ```ignore
/// assert_eq!(quote_pg("users")?, "\"users\"");
/// assert_eq!(quote_pg("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a PostgreSQL table name with schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}

/// Hex digits of the name hash kept on a shortened derived name.
const DERIVED_HASH_LENGTH: usize = 8;

/// Build a derived identifier (index or constraint name) the way knex does,
/// `<table>_<column>_<suffix>`.
///
/// A name over PostgreSQL's limit keeps as much of its prefix as fits and
/// ends in `_` plus a short SHA-256 of the full name, so two long names that
/// share a prefix still come out different.
pub fn derived_name(table: &str, column: &str, suffix: &str) -> String {
    let mut name = format!("{}_{}_{}", table, column, suffix);
    if name.len() <= MAX_IDENTIFIER_LENGTH {
        return name;
    }

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    let mut cut = MAX_IDENTIFIER_LENGTH - DERIVED_HASH_LENGTH - 1;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    name.truncate(cut);
    name.push('_');
    name.push_str(&digest[..DERIVED_HASH_LENGTH]);
    name
}
