//! Metadata catalog synchronization.
//!
//! After the schema change the catalog still describes the old columns. This
//! module renames field records of rewritten foreign columns, repoints
//! relation records at them, and registers the new primary-key column.

mod records;

pub use records::{FieldRecord, FieldSortStats, NewFieldRecord, RelationColumn, RelationRecord};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::schema::MigrationStep;
use crate::core::traits::MetadataCatalog;
use crate::error::Result;
use crate::orchestrator::MigrationPlan;

/// What the synchronizer changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Whether the catalog tables were found at all.
    pub catalog_present: bool,
    pub fields_renamed: usize,
    pub relations_updated: usize,
    pub old_key_field_removed: bool,
    pub primary_key_field_added: bool,
}

/// Bring the catalog in line with a completed schema change.
///
/// Runs inside the migration transaction; any failure aborts the migration.
pub async fn synchronize<C: MetadataCatalog + ?Sized>(
    catalog: &mut C,
    plan: &MigrationPlan,
) -> Result<SyncOutcome> {
    let step = MigrationStep::SyncMetadata;
    let mut outcome = SyncOutcome::default();

    if !catalog.catalog_available().await? {
        info!("[{}] metadata catalog not found, skipping", step);
        return Ok(outcome);
    }
    outcome.catalog_present = true;

    for fk in &plan.foreign_keys {
        let c = &fk.constraint;

        // Delete and re-insert even when the name is unchanged.
        if let Some(record) = catalog.find_field(&c.foreign_table, &c.foreign_column).await? {
            catalog.delete_field(record.id).await?;
            catalog
                .insert_field(&NewFieldRecord::renamed(&record, &fk.new_column))
                .await?;
            debug!(
                "[{}] field {}.{} -> {}",
                step, c.foreign_table, c.foreign_column, fk.new_column
            );
            outcome.fields_renamed += 1;
        }

        if fk.new_column == c.foreign_column {
            continue;
        }
        for relation in catalog.relations_for(&c.foreign_table).await? {
            let column = if relation.junction_field.as_deref() == Some(c.foreign_column.as_str()) {
                RelationColumn::JunctionField
            } else if relation.many_field == c.foreign_column {
                RelationColumn::ManyField
            } else {
                continue;
            };
            catalog
                .update_relation(relation.id, column, &fk.new_column)
                .await?;
            debug!(
                "[{}] relation {} {} -> {}",
                step,
                relation.id,
                column.column_name(),
                fk.new_column
            );
            outcome.relations_updated += 1;
        }
    }

    // Sort position is taken before the old key's record goes away.
    let stats = catalog.field_sort_stats(&plan.table).await?;

    if plan.drop_old_key_column {
        if let Some(record) = catalog
            .find_field(&plan.table, &plan.old_key.column_name)
            .await?
        {
            catalog.delete_field(record.id).await?;
            outcome.old_key_field_removed = true;
        }
    }

    if let Some(sort) = stats.next_sort() {
        if catalog.find_field(&plan.table, &plan.new_key).await?.is_none() {
            catalog
                .insert_field(&NewFieldRecord {
                    id: None,
                    collection: plan.table.clone(),
                    field: plan.new_key.clone(),
                    sort: Some(sort),
                })
                .await?;
            outcome.primary_key_field_added = true;
        }
    }

    info!(
        "[{}] {} field(s) renamed, {} relation(s) updated",
        step, outcome.fields_renamed, outcome.relations_updated
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::core::schema::{ForeignKeyConstraint, PrimaryKeyConstraint};
    use crate::error::MigrateError;
    use crate::orchestrator::MigrationRequest;

    #[derive(Default)]
    struct MemoryCatalog {
        available: bool,
        fields: Vec<FieldRecord>,
        relations: Vec<RelationRecord>,
        next_id: i32,
        fail_inserts: bool,
    }

    impl MemoryCatalog {
        fn new() -> Self {
            Self {
                available: true,
                next_id: 100,
                ..Default::default()
            }
        }

        fn field(mut self, id: i32, collection: &str, field: &str, sort: Option<i32>) -> Self {
            self.fields.push(FieldRecord {
                id,
                collection: collection.to_string(),
                field: field.to_string(),
                sort,
            });
            self
        }

        fn relation(mut self, id: i32, many_collection: &str, many_field: &str, junction: Option<&str>) -> Self {
            self.relations.push(RelationRecord {
                id,
                many_collection: many_collection.to_string(),
                many_field: many_field.to_string(),
                junction_field: junction.map(str::to_string),
            });
            self
        }

        fn get(&self, collection: &str, field: &str) -> Option<&FieldRecord> {
            self.fields
                .iter()
                .find(|f| f.collection == collection && f.field == field)
        }
    }

    #[async_trait]
    impl MetadataCatalog for MemoryCatalog {
        async fn catalog_available(&mut self) -> Result<bool> {
            Ok(self.available)
        }

        async fn find_field(&mut self, collection: &str, field: &str) -> Result<Option<FieldRecord>> {
            Ok(self.get(collection, field).cloned())
        }

        async fn delete_field(&mut self, id: i32) -> Result<()> {
            self.fields.retain(|f| f.id != id);
            Ok(())
        }

        async fn insert_field(&mut self, record: &NewFieldRecord) -> Result<()> {
            if self.fail_inserts {
                return Err(MigrateError::catalog_sync(
                    "inserting field record",
                    std::io::Error::other("permission denied"),
                ));
            }
            let id = record.id.unwrap_or_else(|| {
                self.next_id += 1;
                self.next_id
            });
            self.fields.push(FieldRecord {
                id,
                collection: record.collection.clone(),
                field: record.field.clone(),
                sort: record.sort,
            });
            Ok(())
        }

        async fn field_sort_stats(&mut self, collection: &str) -> Result<FieldSortStats> {
            let sorts: Vec<_> = self.fields.iter().filter(|f| f.collection == collection).collect();
            Ok(FieldSortStats {
                count: sorts.len() as i64,
                max_sort: sorts.iter().filter_map(|f| f.sort).max(),
            })
        }

        async fn relations_for(&mut self, many_collection: &str) -> Result<Vec<RelationRecord>> {
            Ok(self
                .relations
                .iter()
                .filter(|r| r.many_collection == many_collection)
                .cloned()
                .collect())
        }

        async fn update_relation(&mut self, id: i32, column: RelationColumn, value: &str) -> Result<()> {
            if let Some(r) = self.relations.iter_mut().find(|r| r.id == id) {
                match column {
                    RelationColumn::ManyField => r.many_field = value.to_string(),
                    RelationColumn::JunctionField => r.junction_field = Some(value.to_string()),
                }
            }
            Ok(())
        }
    }

    fn plan(foreign: &[(&str, &str)]) -> MigrationPlan {
        let request = MigrationRequest::new("orders", "uuid", "uuid").unwrap();
        let fks = foreign
            .iter()
            .map(|(table, column)| ForeignKeyConstraint {
                constraint_name: format!("{}_{}_foreign", table, column),
                foreign_schema: "public".to_string(),
                foreign_table: table.to_string(),
                foreign_column: column.to_string(),
                referenced_table: "orders".to_string(),
                referenced_column: "id".to_string(),
                on_delete: "NO_ACTION".to_string(),
                on_update: "NO_ACTION".to_string(),
                is_nullable: true,
            })
            .collect();
        let pk = PrimaryKeyConstraint {
            constraint_name: "orders_pkey".to_string(),
            column_name: "id".to_string(),
        };
        MigrationPlan::build("public", &request, vec![pk], fks).unwrap()
    }

    // ==================== Field records ====================

    #[tokio::test]
    async fn test_renames_foreign_field_keeping_id_and_sort() {
        let mut catalog = MemoryCatalog::new()
            .field(1, "orders", "id", Some(1))
            .field(7, "order_items", "orders_id", Some(4));

        let outcome = synchronize(&mut catalog, &plan(&[("order_items", "orders_id")]))
            .await
            .unwrap();

        assert_eq!(outcome.fields_renamed, 1);
        assert!(catalog.get("order_items", "orders_id").is_none());
        let renamed = catalog.get("order_items", "order_items_uuid").unwrap();
        assert_eq!(renamed.id, 7);
        assert_eq!(renamed.sort, Some(4));
    }

    #[tokio::test]
    async fn test_unchanged_name_is_still_reinserted() {
        let mut catalog = MemoryCatalog::new().field(7, "refunds", "source_order", Some(2));
        let outcome = synchronize(&mut catalog, &plan(&[("refunds", "source_order")]))
            .await
            .unwrap();
        assert_eq!(outcome.fields_renamed, 1);
        assert_eq!(catalog.get("refunds", "source_order").unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_missing_field_record_is_not_created() {
        let mut catalog = MemoryCatalog::new().field(1, "orders", "id", Some(1));
        let outcome = synchronize(&mut catalog, &plan(&[("order_items", "orders_id")]))
            .await
            .unwrap();
        assert_eq!(outcome.fields_renamed, 0);
        assert!(catalog.get("order_items", "order_items_uuid").is_none());
    }

    // ==================== Primary key field ====================

    #[tokio::test]
    async fn test_new_key_field_sorted_after_existing() {
        let mut catalog = MemoryCatalog::new()
            .field(1, "orders", "id", Some(1))
            .field(2, "orders", "total", Some(5));

        let outcome = synchronize(&mut catalog, &plan(&[])).await.unwrap();

        assert!(outcome.old_key_field_removed);
        assert!(outcome.primary_key_field_added);
        assert!(catalog.get("orders", "id").is_none());
        assert_eq!(catalog.get("orders", "uuid").unwrap().sort, Some(6));
    }

    #[tokio::test]
    async fn test_null_sorts_start_at_one() {
        let mut catalog = MemoryCatalog::new().field(1, "orders", "total", None);
        synchronize(&mut catalog, &plan(&[])).await.unwrap();
        assert_eq!(catalog.get("orders", "uuid").unwrap().sort, Some(1));
    }

    #[tokio::test]
    async fn test_no_key_field_for_unregistered_collection() {
        let mut catalog = MemoryCatalog::new();
        let outcome = synchronize(&mut catalog, &plan(&[])).await.unwrap();
        assert!(!outcome.primary_key_field_added);
        assert!(catalog.fields.is_empty());
    }

    #[tokio::test]
    async fn test_existing_key_field_is_not_duplicated() {
        let mut catalog = MemoryCatalog::new()
            .field(1, "orders", "id", Some(1))
            .field(2, "orders", "uuid", Some(2));
        let outcome = synchronize(&mut catalog, &plan(&[])).await.unwrap();
        assert!(!outcome.primary_key_field_added);
        assert_eq!(catalog.fields.iter().filter(|f| f.field == "uuid").count(), 1);
    }

    #[tokio::test]
    async fn test_kept_old_key_keeps_its_field() {
        let mut catalog = MemoryCatalog::new().field(1, "orders", "id", Some(1));
        let mut plan = plan(&[]);
        plan.drop_old_key_column = false;
        let outcome = synchronize(&mut catalog, &plan).await.unwrap();
        assert!(!outcome.old_key_field_removed);
        assert!(catalog.get("orders", "id").is_some());
        assert_eq!(catalog.get("orders", "uuid").unwrap().sort, Some(2));
    }

    // ==================== Relations ====================

    #[tokio::test]
    async fn test_relations_repointed() {
        let mut catalog = MemoryCatalog::new()
            .relation(1, "order_items", "orders_id", None)
            .relation(2, "order_items", "product_id", Some("orders_id"))
            .relation(3, "order_items", "product_id", None)
            .relation(4, "invoices", "orders_id", None);

        let outcome = synchronize(&mut catalog, &plan(&[("order_items", "orders_id")]))
            .await
            .unwrap();

        assert_eq!(outcome.relations_updated, 2);
        assert_eq!(catalog.relations[0].many_field, "order_items_uuid");
        assert_eq!(catalog.relations[1].many_field, "product_id");
        assert_eq!(catalog.relations[1].junction_field.as_deref(), Some("order_items_uuid"));
        assert_eq!(catalog.relations[2].many_field, "product_id");
        assert_eq!(catalog.relations[3].many_field, "orders_id");
    }

    #[tokio::test]
    async fn test_relations_untouched_when_name_unchanged() {
        let mut catalog = MemoryCatalog::new().relation(1, "refunds", "source_order", None);
        let outcome = synchronize(&mut catalog, &plan(&[("refunds", "source_order")]))
            .await
            .unwrap();
        assert_eq!(outcome.relations_updated, 0);
    }

    // ==================== Catalog state ====================

    #[tokio::test]
    async fn test_absent_catalog_is_skipped() {
        let mut catalog = MemoryCatalog::new();
        catalog.available = false;
        let outcome = synchronize(&mut catalog, &plan(&[("order_items", "orders_id")]))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::default());
    }

    #[tokio::test]
    async fn test_catalog_failure_propagates() {
        let mut catalog = MemoryCatalog::new().field(7, "order_items", "orders_id", Some(4));
        catalog.fail_inserts = true;
        let err = synchronize(&mut catalog, &plan(&[("order_items", "orders_id")]))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::CatalogSync { .. }));
    }
}
