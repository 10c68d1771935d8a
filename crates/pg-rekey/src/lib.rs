//! # pg-rekey
//!
//! Replace the primary key of a PostgreSQL table with a new `int` or `uuid`
//! column while keeping every referencing foreign key and the metadata
//! catalog (`directus_fields` / `directus_relations`) consistent.
//!
//! The whole change runs in a single transaction:
//!
//! - **Foreign keys** referencing the table are detached, moved aside and
//!   recreated against the new key
//! - **References** are relinked with one correlated update per foreign key
//! - **Metadata** field and relation records are renamed to match
//! - **Any failure** rolls everything back
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_rekey::{Config, MigrationRequest, Migrator};
//!
//! #[tokio::main]
//! async fn main() -> pg_rekey::Result<()> {
//!     let config = Config::load("pg-rekey.yaml")?;
//!     let migrator = Migrator::connect(config).await?;
//!     let request = MigrationRequest::new("orders", "uuid", "uuid")?;
//!     let report = migrator.run(request).await?;
//!     println!("Relinked {} rows", report.rows_relinked);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod metadata;
pub mod orchestrator;

// Re-exports for convenient access
pub use config::{CatalogConfig, Config, DatabaseConfig};
pub use crate::core::{KeyType, MigrationStep};
pub use error::{MigrateError, Result};
pub use metadata::SyncOutcome;
pub use orchestrator::{
    migrate_primary_key, HealthCheckResult, MigrationReport, MigrationRequest, Migrator,
};
