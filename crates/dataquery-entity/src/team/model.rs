//! Team entity model.

use serde::Serialize;

use dataquery_core::result::AppResult;
use dataquery_core::traits::{Entity, FromRow, Selection};
use dataquery_core::types::{AuditFields, EntitySchema, FieldDef, FieldType, FromValue, Row, Value};

/// Table mapping for [`Team`].
pub static TEAM_SCHEMA: EntitySchema = EntitySchema {
    entity: "Team",
    table: "team",
    id: "id",
    id_generated: true,
    fields: &[
        FieldDef::new("id", "team_id", FieldType::Int),
        FieldDef::new("name", "name", FieldType::Text),
        FieldDef::nullable("created_date", "created_date", FieldType::Timestamp),
        FieldDef::nullable("last_modified_date", "last_modified_date", FieldType::Timestamp),
        FieldDef::nullable("created_by", "created_by", FieldType::Text),
        FieldDef::nullable("last_modified_by", "last_modified_by", FieldType::Text),
    ],
    relations: &[],
};

/// A team that members belong to. Audited on every save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    /// Generated identifier; `None` until inserted.
    pub id: Option<i64>,
    /// Team name.
    pub name: String,
    /// Creation and modification stamps.
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Team {
    /// A new, unsaved team.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            audit: AuditFields::default(),
        }
    }
}

impl FromRow for Team {
    fn selection() -> Selection {
        Selection::Entity(&TEAM_SCHEMA)
    }

    fn from_row(row: &Row) -> AppResult<Self> {
        Ok(Self {
            id: row.get_as("id")?,
            name: row.get_as("name")?,
            audit: AuditFields {
                created_date: row.get_as("created_date")?,
                last_modified_date: row.get_as("last_modified_date")?,
                created_by: row.get_as("created_by")?,
                last_modified_by: row.get_as("last_modified_by")?,
            },
        })
    }
}

impl Entity for Team {
    fn schema() -> &'static EntitySchema {
        &TEAM_SCHEMA
    }

    fn id(&self) -> Value {
        self.id.into()
    }

    fn set_id(&mut self, id: Value) -> AppResult<()> {
        self.id = Option::<i64>::from_value(&id)?;
        Ok(())
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("name", self.name.as_str().into()),
            ("created_date", self.audit.created_date.into()),
            ("last_modified_date", self.audit.last_modified_date.into()),
            ("created_by", self.audit.created_by.clone().into()),
            ("last_modified_by", self.audit.last_modified_by.clone().into()),
        ]
    }

    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        Some(&mut self.audit)
    }
}
