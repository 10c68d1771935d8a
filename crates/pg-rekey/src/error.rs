//! Error types for the primary-key migration library.

use thiserror::Error;

use crate::core::schema::MigrationStep;

/// Boxed error used where the underlying cause may come from different layers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad parameters).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Target table has no primary key, or more than one column was found.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Requested key type is neither `int` nor `uuid`.
    #[error("Unsupported column type '{0}' (expected 'int' or 'uuid')")]
    UnsupportedType(String),

    /// A DDL/DML statement failed during a migration step.
    #[error("Step {step} failed: {source}\n  Statement: {sql}")]
    Constraint {
        step: MigrationStep,
        sql: String,
        #[source]
        source: BoxError,
    },

    /// Metadata catalog update failed after schema changes succeeded.
    #[error("Metadata catalog sync failed during {operation}: {source}")]
    CatalogSync {
        operation: String,
        #[source]
        source: BoxError,
    },

    /// Connection, introspection, commit or rollback error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Process exit codes, one per error family.
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_PRECONDITION_ERROR: u8 = 2;
pub const EXIT_UNSUPPORTED_TYPE: u8 = 3;
pub const EXIT_CONSTRAINT_ERROR: u8 = 4;
pub const EXIT_CATALOG_SYNC_ERROR: u8 = 5;
pub const EXIT_DATABASE_ERROR: u8 = 6;
pub const EXIT_IO_ERROR: u8 = 7;

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Wrap a failing statement with the step it belonged to.
    pub fn constraint(
        step: MigrationStep,
        sql: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        MigrateError::Constraint {
            step,
            sql: sql.into(),
            source: source.into(),
        }
    }

    /// Wrap a failing metadata catalog operation.
    pub fn catalog_sync(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        MigrateError::CatalogSync {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// The step a constraint error was raised in, if any.
    pub fn step(&self) -> Option<MigrationStep> {
        match self {
            MigrateError::Constraint { step, .. } => Some(*step),
            MigrateError::CatalogSync { .. } => Some(MigrationStep::SyncMetadata),
            _ => None,
        }
    }

    /// Exit code the CLI reports for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Precondition(_) => EXIT_PRECONDITION_ERROR,
            MigrateError::UnsupportedType(_) => EXIT_UNSUPPORTED_TYPE,
            MigrateError::Constraint { .. } => EXIT_CONSTRAINT_ERROR,
            MigrateError::CatalogSync { .. } => EXIT_CATALOG_SYNC_ERROR,
            MigrateError::Database(_) | MigrateError::Pool { .. } => EXIT_DATABASE_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
