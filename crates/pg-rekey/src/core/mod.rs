//! Core types and traits of the migration engine.
//!
//! - [`schema`]: key constraints, key types and migration steps
//! - [`identifier`]: PostgreSQL identifier validation and quoting
//! - [`traits`]: the session seams the engine runs against

pub mod identifier;
pub mod schema;
pub mod traits;

pub use schema::{ForeignKeyConstraint, KeyType, MigrationStep, PrimaryKeyConstraint};
pub use traits::{MetadataCatalog, MigrationSession, SchemaSession};
