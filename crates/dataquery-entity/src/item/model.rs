//! Item entity model.

use serde::Serialize;

use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::traits::{Entity, FromRow, Selection};
use dataquery_core::types::{AuditFields, EntitySchema, FieldDef, FieldType, Row, Value};

/// Table mapping for [`Item`].
pub static ITEM_SCHEMA: EntitySchema = EntitySchema {
    entity: "Item",
    table: "item",
    id: "id",
    id_generated: false,
    fields: &[
        FieldDef::new("id", "id", FieldType::Text),
        FieldDef::nullable("created_date", "created_date", FieldType::Timestamp),
    ],
    relations: &[],
};

/// An item with a caller-assigned identifier.
///
/// Because the id is always present, newness is decided by the creation
/// stamp instead: an item that was never saved has no `created_date`.
/// Only the creation stamp is persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    /// Assigned identifier.
    pub id: String,
    #[serde(skip)]
    audit: AuditFields,
}

impl Item {
    /// A new, unsaved item.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            audit: AuditFields::default(),
        }
    }

    /// When the item was first saved.
    pub fn created_date(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.audit.created_date
    }
}

impl FromRow for Item {
    fn selection() -> Selection {
        Selection::Entity(&ITEM_SCHEMA)
    }

    fn from_row(row: &Row) -> AppResult<Self> {
        Ok(Self {
            id: row.get_as("id")?,
            audit: AuditFields {
                created_date: row.get_as("created_date")?,
                ..AuditFields::default()
            },
        })
    }
}

impl Entity for Item {
    fn schema() -> &'static EntitySchema {
        &ITEM_SCHEMA
    }

    fn id(&self) -> Value {
        self.id.as_str().into()
    }

    fn set_id(&mut self, id: Value) -> AppResult<()> {
        match id {
            Value::Text(id) => {
                self.id = id;
                Ok(())
            }
            other => Err(AppError::mapping(format!(
                "item id must be text, found {}",
                other.kind()
            ))),
        }
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.as_str().into()),
            ("created_date", self.audit.created_date.into()),
        ]
    }

    fn is_new(&self) -> bool {
        self.audit.created_date.is_none()
    }

    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        Some(&mut self.audit)
    }
}
