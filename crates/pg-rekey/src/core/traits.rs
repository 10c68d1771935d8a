//! Core traits the migration engine runs against.
//!
//! - [`SchemaSession`]: catalog introspection and statement execution
//! - [`MetadataCatalog`]: typed access to the field/relation registry
//! - [`MigrationSession`]: both of the above bound to one open transaction
//!
//! The PostgreSQL implementation lives in `drivers::postgres`; tests drive the
//! engine through an in-memory recording session.

use async_trait::async_trait;

use crate::error::Result;
use crate::metadata::{FieldRecord, FieldSortStats, NewFieldRecord, RelationColumn, RelationRecord};

use super::schema::{ForeignKeyConstraint, MigrationStep, PrimaryKeyConstraint};

/// Introspection and DDL/DML execution inside the migration transaction.
#[async_trait]
pub trait SchemaSession: Send {
    /// Primary-key columns of a table, one entry per key column.
    async fn primary_keys(&mut self, schema: &str, table: &str)
        -> Result<Vec<PrimaryKeyConstraint>>;

    /// Foreign keys in any table that reference the given table.
    ///
    /// Multi-column foreign keys are returned as a precondition error.
    async fn referencing_foreign_keys(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeyConstraint>>;

    /// Execute one statement belonging to `step`, returning the affected row count.
    ///
    /// Failures are reported as [`MigrateError::Constraint`](crate::MigrateError::Constraint).
    async fn execute(&mut self, step: MigrationStep, sql: &str) -> Result<u64>;
}

/// Read/insert/update/delete on the metadata catalog's field and relation records.
///
/// Failures are reported as [`MigrateError::CatalogSync`](crate::MigrateError::CatalogSync).
#[async_trait]
pub trait MetadataCatalog: Send {
    /// Whether the catalog tables exist in this database.
    async fn catalog_available(&mut self) -> Result<bool>;

    /// Field record keyed by `(collection, field)`.
    async fn find_field(&mut self, collection: &str, field: &str) -> Result<Option<FieldRecord>>;

    async fn delete_field(&mut self, id: i32) -> Result<()>;

    async fn insert_field(&mut self, record: &NewFieldRecord) -> Result<()>;

    /// Number of field records and their highest sort value for a collection.
    async fn field_sort_stats(&mut self, collection: &str) -> Result<FieldSortStats>;

    /// Relation records whose many side is the given collection.
    async fn relations_for(&mut self, many_collection: &str) -> Result<Vec<RelationRecord>>;

    async fn update_relation(
        &mut self,
        id: i32,
        column: RelationColumn,
        value: &str,
    ) -> Result<()>;
}

/// A schema session and metadata catalog sharing one open transaction.
#[async_trait]
pub trait MigrationSession: SchemaSession + MetadataCatalog {
    /// Make every change durable.
    async fn commit(self) -> Result<()>;

    /// Discard every change made through this session.
    async fn rollback(self) -> Result<()>;
}
