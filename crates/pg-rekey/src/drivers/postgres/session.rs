//! Migration session over one open PostgreSQL transaction.

use async_trait::async_trait;
use tokio_postgres::Transaction;
use tracing::debug;

use crate::config::CatalogConfig;
use crate::core::identifier::qualify_pg;
use crate::core::schema::{ForeignKeyConstraint, MigrationStep, PrimaryKeyConstraint};
use crate::core::traits::{MetadataCatalog, MigrationSession, SchemaSession};
use crate::error::{MigrateError, Result};
use crate::metadata::{FieldRecord, FieldSortStats, NewFieldRecord, RelationColumn, RelationRecord};

const PRIMARY_KEY_QUERY: &str = r#"
    SELECT c.conname, a.attname
    FROM pg_catalog.pg_constraint c
    JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
    WHERE n.nspname = $1
      AND t.relname = $2
      AND c.contype = 'p'
      AND a.attnum = ANY(c.conkey)
    ORDER BY array_position(c.conkey, a.attnum)
"#;

const REFERENCING_FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        c.conname,
        fn.nspname,
        ft.relname,
        a.attname,
        rt.relname,
        ra.attname,
        CASE c.confdeltype
            WHEN 'r' THEN 'RESTRICT'
            WHEN 'c' THEN 'CASCADE'
            WHEN 'n' THEN 'SET_NULL'
            WHEN 'd' THEN 'SET_DEFAULT'
            ELSE 'NO_ACTION'
        END AS on_delete,
        CASE c.confupdtype
            WHEN 'r' THEN 'RESTRICT'
            WHEN 'c' THEN 'CASCADE'
            WHEN 'n' THEN 'SET_NULL'
            WHEN 'd' THEN 'SET_DEFAULT'
            ELSE 'NO_ACTION'
        END AS on_update,
        NOT a.attnotnull AS is_nullable,
        cardinality(c.conkey) AS key_columns
    FROM pg_catalog.pg_constraint c
    JOIN pg_catalog.pg_class ft ON ft.oid = c.conrelid
    JOIN pg_catalog.pg_namespace fn ON fn.oid = ft.relnamespace
    JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
    JOIN pg_catalog.pg_namespace rn ON rn.oid = rt.relnamespace
    JOIN pg_catalog.pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = c.conkey[1]
    JOIN pg_catalog.pg_attribute ra ON ra.attrelid = c.confrelid AND ra.attnum = c.confkey[1]
    WHERE c.contype = 'f'
      AND c.conparentid = 0
      AND rn.nspname = $1
      AND rt.relname = $2
    ORDER BY fn.nspname, ft.relname, c.conname
"#;

/// [`MigrationSession`] bound to a tokio-postgres transaction.
pub struct PgSession<'a> {
    tx: Transaction<'a>,
    fields_table: String,
    relations_table: String,
}

impl<'a> PgSession<'a> {
    /// Wrap an open transaction. Catalog tables are looked up in `schema`.
    pub fn new(tx: Transaction<'a>, schema: &str, catalog: &CatalogConfig) -> Result<Self> {
        Ok(Self {
            tx,
            fields_table: qualify_pg(schema, &catalog.fields_table)?,
            relations_table: qualify_pg(schema, &catalog.relations_table)?,
        })
    }
}

#[async_trait]
impl SchemaSession for PgSession<'_> {
    async fn primary_keys(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<PrimaryKeyConstraint>> {
        let rows = self.tx.query(PRIMARY_KEY_QUERY, &[&schema, &table]).await?;
        Ok(rows
            .iter()
            .map(|row| PrimaryKeyConstraint {
                constraint_name: row.get(0),
                column_name: row.get(1),
            })
            .collect())
    }

    async fn referencing_foreign_keys(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeyConstraint>> {
        let rows = self
            .tx
            .query(REFERENCING_FOREIGN_KEYS_QUERY, &[&schema, &table])
            .await?;

        let mut foreign_keys = Vec::with_capacity(rows.len());
        for row in rows {
            let constraint_name: String = row.get(0);
            let key_columns: i32 = row.get(9);
            if key_columns != 1 {
                return Err(MigrateError::Precondition(format!(
                    "foreign key {} references {}.{} with {} columns; only single-column keys can be migrated",
                    constraint_name, schema, table, key_columns
                )));
            }
            foreign_keys.push(ForeignKeyConstraint {
                constraint_name,
                foreign_schema: row.get(1),
                foreign_table: row.get(2),
                foreign_column: row.get(3),
                referenced_table: row.get(4),
                referenced_column: row.get(5),
                on_delete: row.get(6),
                on_update: row.get(7),
                is_nullable: row.get(8),
            });
        }
        Ok(foreign_keys)
    }

    async fn execute(&mut self, step: MigrationStep, sql: &str) -> Result<u64> {
        debug!("[{}] {}", step, sql);
        self.tx
            .execute(sql, &[])
            .await
            .map_err(|e| MigrateError::constraint(step, sql, e))
    }
}

#[async_trait]
impl MetadataCatalog for PgSession<'_> {
    async fn catalog_available(&mut self) -> Result<bool> {
        let row = self
            .tx
            .query_one(
                "SELECT to_regclass($1) IS NOT NULL AND to_regclass($2) IS NOT NULL",
                &[&self.fields_table, &self.relations_table],
            )
            .await
            .map_err(|e| MigrateError::catalog_sync("checking catalog tables", e))?;
        Ok(row.get(0))
    }

    async fn find_field(&mut self, collection: &str, field: &str) -> Result<Option<FieldRecord>> {
        let sql = format!(
            "SELECT id, collection, field, sort FROM {} WHERE collection = $1 AND field = $2 LIMIT 1",
            self.fields_table
        );
        let row = self
            .tx
            .query_opt(&sql, &[&collection, &field])
            .await
            .map_err(|e| MigrateError::catalog_sync("reading field record", e))?;

        row.map(|row| -> std::result::Result<FieldRecord, tokio_postgres::Error> {
            Ok(FieldRecord {
                id: row.try_get(0)?,
                collection: row.try_get(1)?,
                field: row.try_get(2)?,
                sort: row.try_get(3)?,
            })
        })
        .transpose()
        .map_err(|e| MigrateError::catalog_sync("decoding field record", e))
    }

    async fn delete_field(&mut self, id: i32) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.fields_table);
        debug!("[{}] {} ({})", MigrationStep::SyncMetadata, sql, id);
        self.tx
            .execute(&sql, &[&id])
            .await
            .map_err(|e| MigrateError::catalog_sync("deleting field record", e))?;
        Ok(())
    }

    async fn insert_field(&mut self, record: &NewFieldRecord) -> Result<()> {
        let result = match record.id {
            Some(id) => {
                let sql = format!(
                    "INSERT INTO {} (id, collection, field, sort) VALUES ($1, $2, $3, $4)",
                    self.fields_table
                );
                debug!("[{}] {} ({})", MigrationStep::SyncMetadata, sql, record.field);
                self.tx
                    .execute(&sql, &[&id, &record.collection, &record.field, &record.sort])
                    .await
            }
            None => {
                let sql = format!(
                    "INSERT INTO {} (collection, field, sort) VALUES ($1, $2, $3)",
                    self.fields_table
                );
                debug!("[{}] {} ({})", MigrationStep::SyncMetadata, sql, record.field);
                self.tx
                    .execute(&sql, &[&record.collection, &record.field, &record.sort])
                    .await
            }
        };
        result.map_err(|e| MigrateError::catalog_sync("inserting field record", e))?;
        Ok(())
    }

    async fn field_sort_stats(&mut self, collection: &str) -> Result<FieldSortStats> {
        let sql = format!(
            "SELECT COUNT(*), MAX(sort) FROM {} WHERE collection = $1",
            self.fields_table
        );
        let row = self
            .tx
            .query_one(&sql, &[&collection])
            .await
            .map_err(|e| MigrateError::catalog_sync("reading field sort order", e))?;
        Ok(FieldSortStats {
            count: row
                .try_get(0)
                .map_err(|e| MigrateError::catalog_sync("decoding field count", e))?,
            max_sort: row
                .try_get(1)
                .map_err(|e| MigrateError::catalog_sync("decoding field sort", e))?,
        })
    }

    async fn relations_for(&mut self, many_collection: &str) -> Result<Vec<RelationRecord>> {
        let sql = format!(
            "SELECT id, many_collection, many_field, junction_field FROM {} \
             WHERE many_collection = $1 ORDER BY id",
            self.relations_table
        );
        let rows = self
            .tx
            .query(&sql, &[&many_collection])
            .await
            .map_err(|e| MigrateError::catalog_sync("reading relation records", e))?;

        rows.iter()
            .map(|row| {
                Ok(RelationRecord {
                    id: row.try_get(0)?,
                    many_collection: row.try_get(1)?,
                    many_field: row.try_get(2)?,
                    junction_field: row.try_get(3)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| MigrateError::catalog_sync("decoding relation record", e))
    }

    async fn update_relation(
        &mut self,
        id: i32,
        column: RelationColumn,
        value: &str,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET {} = $1 WHERE id = $2",
            self.relations_table,
            column.column_name()
        );
        debug!("[{}] {} ({} -> {})", MigrationStep::SyncMetadata, sql, id, value);
        self.tx
            .execute(&sql, &[&value, &id])
            .await
            .map_err(|e| MigrateError::catalog_sync("updating relation record", e))?;
        Ok(())
    }
}

#[async_trait]
impl MigrationSession for PgSession<'_> {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
