//! Configuration validation.

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::drivers::common::SslMode;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let db = &config.database;
    if db.host.is_empty() {
        return Err(MigrateError::Config("database.host is required".into()));
    }
    if db.database.is_empty() {
        return Err(MigrateError::Config("database.database is required".into()));
    }
    if db.user.is_empty() {
        return Err(MigrateError::Config("database.user is required".into()));
    }
    if db.port == 0 {
        return Err(MigrateError::Config("database.port must be non-zero".into()));
    }
    validate_identifier(&db.schema)
        .map_err(|e| MigrateError::Config(format!("database.schema: {}", e)))?;
    SslMode::parse(&db.ssl_mode)?;

    validate_identifier(&config.catalog.fields_table)
        .map_err(|e| MigrateError::Config(format!("catalog.fields_table: {}", e)))?;
    validate_identifier(&config.catalog.relations_table)
        .map_err(|e| MigrateError::Config(format!("catalog.relations_table: {}", e)))?;

    Ok(())
}
