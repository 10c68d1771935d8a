//! PostgreSQL statement builders for the key rewrite.
//!
//! Every identifier passes through [`quote_pg`]/[`qualify_pg`]; no value is
//! ever interpolated into these statements.

use crate::core::identifier::{derived_name, qualify_pg, quote_pg};
use crate::core::schema::KeyType;
use crate::error::Result;

/// PostgreSQL DDL/DML builder.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    pub fn drop_constraint(&self, schema: &str, table: &str, constraint: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            qualify_pg(schema, table)?,
            quote_pg(constraint)?
        ))
    }

    pub fn rename_column(&self, schema: &str, table: &str, from: &str, to: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            qualify_pg(schema, table)?,
            quote_pg(from)?,
            quote_pg(to)?
        ))
    }

    /// `CREATE INDEX <table>_<column>_index ON <table> (<column>)`.
    pub fn create_index(&self, schema: &str, table: &str, column: &str) -> Result<String> {
        Ok(format!(
            "CREATE INDEX {} ON {} ({})",
            quote_pg(&derived_name(table, column, "index"))?,
            qualify_pg(schema, table)?,
            quote_pg(column)?
        ))
    }

    /// Add the new primary-key column. Existing rows receive generated values.
    pub fn add_primary_key_column(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        key_type: KeyType,
    ) -> Result<String> {
        let definition = match key_type {
            KeyType::Uuid => "uuid NOT NULL DEFAULT gen_random_uuid() PRIMARY KEY",
            KeyType::Int => "integer GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY",
        };
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            qualify_pg(schema, table)?,
            quote_pg(column)?,
            definition
        ))
    }

    /// Add a nullable foreign column able to hold keys of `key_type`.
    pub fn add_foreign_column(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        key_type: KeyType,
    ) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            qualify_pg(schema, table)?,
            quote_pg(column)?,
            key_type.foreign_column_type()
        ))
    }

    /// Name given to a recreated foreign-key constraint.
    pub fn foreign_key_name(&self, table: &str, column: &str) -> String {
        derived_name(table, column, "foreign")
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_foreign_key(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        constraint: &str,
        ref_schema: &str,
        ref_table: &str,
        ref_column: &str,
        on_delete: &str,
        on_update: &str,
    ) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            qualify_pg(schema, table)?,
            quote_pg(constraint)?,
            quote_pg(column)?,
            qualify_pg(ref_schema, ref_table)?,
            quote_pg(ref_column)?,
            Self::map_referential_action(on_delete),
            Self::map_referential_action(on_update)
        ))
    }

    /// Correlated bulk update copying new keys into a dependent table.
    ///
    /// Both tables are aliased so a table referencing itself works too.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_references(
        &self,
        schema: &str,
        table: &str,
        new_column: &str,
        old_column: &str,
        ref_schema: &str,
        ref_table: &str,
        ref_new_key: &str,
        ref_old_key: &str,
    ) -> Result<String> {
        Ok(format!(
            "UPDATE {} AS dep SET {} = ref.{} FROM {} AS ref WHERE ref.{} = dep.{}",
            qualify_pg(schema, table)?,
            quote_pg(new_column)?,
            quote_pg(ref_new_key)?,
            qualify_pg(ref_schema, ref_table)?,
            quote_pg(ref_old_key)?,
            quote_pg(old_column)?
        ))
    }

    pub fn set_not_null(&self, schema: &str, table: &str, column: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
            qualify_pg(schema, table)?,
            quote_pg(column)?
        ))
    }

    pub fn drop_column(&self, schema: &str, table: &str, column: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            qualify_pg(schema, table)?,
            quote_pg(column)?
        ))
    }

    /// Map a catalog referential action to its SQL spelling.
    fn map_referential_action(action: &str) -> &'static str {
        match action.to_uppercase().as_str() {
            "CASCADE" => "CASCADE",
            "RESTRICT" => "RESTRICT",
            "SET_NULL" => "SET NULL",
            "SET_DEFAULT" => "SET DEFAULT",
            _ => "NO ACTION",
        }
    }
}
