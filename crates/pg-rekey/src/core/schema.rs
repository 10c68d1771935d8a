//! Schema metadata types for the primary key being replaced and the foreign
//! keys that depend on it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// Prefix given to columns that are moved out of the way during migration.
pub const SHADOW_PREFIX: &str = "old_";

/// States of a primary-key migration, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStep {
    Introspect,
    Detach,
    DropOldPk,
    CreateNewPk,
    AttachNewFk,
    CopyData,
    DropOldColumns,
    SyncMetadata,
    Commit,
}

impl MigrationStep {
    /// All steps in the order the coordinator runs them.
    pub const ALL: [MigrationStep; 9] = [
        MigrationStep::Introspect,
        MigrationStep::Detach,
        MigrationStep::DropOldPk,
        MigrationStep::CreateNewPk,
        MigrationStep::AttachNewFk,
        MigrationStep::CopyData,
        MigrationStep::DropOldColumns,
        MigrationStep::SyncMetadata,
        MigrationStep::Commit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStep::Introspect => "INTROSPECT",
            MigrationStep::Detach => "DETACH",
            MigrationStep::DropOldPk => "DROP_OLD_PK",
            MigrationStep::CreateNewPk => "CREATE_NEW_PK",
            MigrationStep::AttachNewFk => "ATTACH_NEW_FK",
            MigrationStep::CopyData => "COPY_DATA",
            MigrationStep::DropOldColumns => "DROP_OLD_COLUMNS",
            MigrationStep::SyncMetadata => "SYNC_METADATA",
            MigrationStep::Commit => "COMMIT",
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of the new primary-key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Auto-incrementing integer.
    Int,
    /// Server-generated UUID.
    Uuid,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Int => "int",
            KeyType::Uuid => "uuid",
        }
    }

    /// PostgreSQL type used for foreign columns pointing at a key of this type.
    pub fn foreign_column_type(&self) -> &'static str {
        match self {
            KeyType::Int => "integer",
            KeyType::Uuid => "uuid",
        }
    }
}

impl FromStr for KeyType {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "int" => Ok(KeyType::Int),
            "uuid" => Ok(KeyType::Uuid),
            _ => Err(MigrateError::UnsupportedType(s.to_string())),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current primary key of the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyConstraint {
    /// Constraint name (e.g. `orders_pkey`).
    pub constraint_name: String,

    /// The single key column.
    pub column_name: String,
}

/// A single-column foreign key referencing the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    /// Constraint name.
    pub constraint_name: String,

    /// Schema of the referencing table.
    pub foreign_schema: String,

    /// Referencing (dependent) table.
    pub foreign_table: String,

    /// Referencing column.
    pub foreign_column: String,

    /// Referenced table (the migration target).
    pub referenced_table: String,

    /// Referenced column.
    pub referenced_column: String,

    /// ON DELETE action (`NO_ACTION`, `RESTRICT`, `CASCADE`, `SET_NULL`, `SET_DEFAULT`).
    pub on_delete: String,

    /// ON UPDATE action.
    pub on_update: String,

    /// Whether the referencing column accepts NULL.
    pub is_nullable: bool,
}

impl ForeignKeyConstraint {
    /// Name the referencing column is renamed to while it still holds old identities.
    pub fn shadow_column(&self) -> String {
        shadow_name(&self.foreign_column)
    }

    /// Name of the replacement column.
    ///
    /// A column named `<referenced_table>_<old_pk>` becomes
    /// `<foreign_table>_<new_pk>`; any other name is kept as is.
    pub fn new_column_name(&self, old_pk_column: &str, new_pk_column: &str) -> String {
        if self.foreign_column == format!("{}_{}", self.referenced_table, old_pk_column) {
            format!("{}_{}", self.foreign_table, new_pk_column)
        } else {
            self.foreign_column.clone()
        }
    }

    /// Whether the constraint points at the given key column.
    pub fn references(&self, column: &str) -> bool {
        self.referenced_column == column
    }
}

/// Shadow name for a column that is moved out of the way.
pub fn shadow_name(column: &str) -> String {
    format!("{}{}", SHADOW_PREFIX, column)
}
