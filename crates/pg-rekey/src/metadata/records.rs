//! Typed rows of the metadata catalog.

use serde::{Deserialize, Serialize};

/// Presentation metadata for one column, keyed by `(collection, field)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub id: i32,
    pub collection: String,
    pub field: String,
    pub sort: Option<i32>,
}

/// A field record to insert. `id` is left to the catalog's sequence when `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFieldRecord {
    pub id: Option<i32>,
    pub collection: String,
    pub field: String,
    pub sort: Option<i32>,
}

impl NewFieldRecord {
    /// Re-insert an existing record under a new field name, keeping identity and order.
    ///
    /// Any other configuration attached to the old record is not carried over.
    pub fn renamed(record: &FieldRecord, field: &str) -> Self {
        Self {
            id: Some(record.id),
            collection: record.collection.clone(),
            field: field.to_string(),
            sort: record.sort,
        }
    }
}

/// A relation mapping between collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub id: i32,
    pub many_collection: String,
    pub many_field: String,
    pub junction_field: Option<String>,
}

/// Relation columns that may name a foreign column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationColumn {
    ManyField,
    JunctionField,
}

impl RelationColumn {
    pub fn column_name(&self) -> &'static str {
        match self {
            RelationColumn::ManyField => "many_field",
            RelationColumn::JunctionField => "junction_field",
        }
    }
}

/// Field count and highest sort value for one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSortStats {
    pub count: i64,
    pub max_sort: Option<i32>,
}

impl FieldSortStats {
    /// Sort value for a field appended after every existing one.
    ///
    /// `None` when the collection has no field records at all.
    pub fn next_sort(&self) -> Option<i32> {
        if self.count == 0 {
            None
        } else {
            Some(self.max_sort.unwrap_or(0) + 1)
        }
    }
}
