//! Migration request and the plan derived from introspection.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::identifier::validate_identifier;
use crate::core::schema::{shadow_name, ForeignKeyConstraint, KeyType, PrimaryKeyConstraint};
use crate::drivers::postgres::PostgresDialect;
use crate::error::{MigrateError, Result};

/// Parameters of one primary-key migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRequest {
    /// Table whose primary key is replaced.
    pub table_name: String,

    /// Name of the new primary-key column.
    pub new_column_name: String,

    /// Type of the new primary-key column.
    pub new_column_type: KeyType,

    /// Drop the old key column once every reference has been copied (default: true).
    pub drop_old_key_column: bool,

    /// Update the metadata catalog (default: true).
    pub sync_metadata: bool,

    /// Run every step, then roll back.
    pub dry_run: bool,
}

impl MigrationRequest {
    /// Build a request; `new_column_type` must be `int` or `uuid`.
    pub fn new(
        table_name: impl Into<String>,
        new_column_name: impl Into<String>,
        new_column_type: &str,
    ) -> Result<Self> {
        let request = Self {
            table_name: table_name.into(),
            new_column_name: new_column_name.into(),
            new_column_type: new_column_type.parse()?,
            drop_old_key_column: true,
            sync_metadata: true,
            dry_run: false,
        };
        validate_identifier(&request.table_name)
            .map_err(|e| MigrateError::Config(format!("table name: {}", e)))?;
        validate_identifier(&request.new_column_name)
            .map_err(|e| MigrateError::Config(format!("new column name: {}", e)))?;
        Ok(request)
    }

    pub fn keep_old_key_column(mut self, keep: bool) -> Self {
        self.drop_old_key_column = !keep;
        self
    }

    pub fn with_metadata_sync(mut self, enabled: bool) -> Self {
        self.sync_metadata = enabled;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// A foreign key scheduled for rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedForeignKey {
    pub constraint: ForeignKeyConstraint,
    /// Where the old identities live while the new column is filled.
    pub shadow_column: String,
    /// Replacement column.
    pub new_column: String,
    /// Replacement constraint.
    pub new_constraint: String,
}

/// Everything the steps after introspection need to know.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub schema: String,
    pub table: String,
    pub old_key: PrimaryKeyConstraint,
    /// Column holding the old identities once the new key exists.
    pub old_key_column: String,
    pub new_key: String,
    pub key_type: KeyType,
    pub drop_old_key_column: bool,
    pub sync_metadata: bool,
    pub foreign_keys: Vec<PlannedForeignKey>,
    /// Foreign keys pointing at some other column of the table; left untouched.
    pub skipped: Vec<ForeignKeyConstraint>,
}

impl MigrationPlan {
    /// Derive the plan from the introspected constraints.
    pub fn build(
        schema: &str,
        request: &MigrationRequest,
        primary_keys: Vec<PrimaryKeyConstraint>,
        foreign_keys: Vec<ForeignKeyConstraint>,
    ) -> Result<Self> {
        if primary_keys.len() > 1 {
            let columns: Vec<&str> = primary_keys.iter().map(|pk| pk.column_name.as_str()).collect();
            return Err(MigrateError::Precondition(format!(
                "table {}.{} has a composite primary key over {} columns ({}); expected exactly one",
                schema,
                request.table_name,
                primary_keys.len(),
                columns.join(", ")
            )));
        }
        let old_key = primary_keys.into_iter().next().ok_or_else(|| {
            MigrateError::Precondition(format!(
                "table {}.{} has no primary key",
                schema, request.table_name
            ))
        })?;

        let old_key_column = if old_key.column_name == request.new_column_name {
            shadow_name(&old_key.column_name)
        } else {
            old_key.column_name.clone()
        };

        let dialect = PostgresDialect::new();
        let mut planned = Vec::new();
        let mut skipped = Vec::new();
        for fk in foreign_keys {
            if !fk.references(&old_key.column_name) {
                warn!(
                    "Skipping foreign key {} on {}.{}: it references {}.{}, not the primary key",
                    fk.constraint_name,
                    fk.foreign_table,
                    fk.foreign_column,
                    fk.referenced_table,
                    fk.referenced_column
                );
                skipped.push(fk);
                continue;
            }

            let new_column = fk.new_column_name(&old_key.column_name, &request.new_column_name);
            validate_identifier(&new_column)?;
            planned.push(PlannedForeignKey {
                shadow_column: fk.shadow_column(),
                new_constraint: dialect.foreign_key_name(&fk.foreign_table, &new_column),
                new_column,
                constraint: fk,
            });
        }

        Ok(Self {
            schema: schema.to_string(),
            table: request.table_name.clone(),
            old_key,
            old_key_column,
            new_key: request.new_column_name.clone(),
            key_type: request.new_column_type,
            drop_old_key_column: request.drop_old_key_column,
            sync_metadata: request.sync_metadata,
            foreign_keys: planned,
            skipped,
        })
    }

    /// Whether the old key column has to move aside for the new one.
    pub fn renames_old_key(&self) -> bool {
        self.old_key_column != self.old_key.column_name
    }
}
