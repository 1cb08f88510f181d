//! Static mapping from logical entity/field names to tables and columns.
//!
//! Schemas are declared as `static` items next to each entity and are
//! consulted read-only by the parser, the compiler and the stores.

use serde::Serialize;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::value::Value;

/// Declared type of a persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// 64-bit integer.
    Int,
    /// Double precision float.
    Float,
    /// Text.
    Text,
    /// Boolean.
    Bool,
    /// Timestamp with time zone.
    Timestamp,
}

impl FieldType {
    /// Whether a (non-null) value may be stored in or compared with a
    /// field of this type.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Int, Value::Int(_)) => true,
            (Self::Float, Value::Float(_) | Value::Int(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            _ => false,
        }
    }
}

/// A persisted attribute of an entity.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldDef {
    /// Logical (snake_case) field name.
    pub name: &'static str,
    /// Physical column name.
    pub column: &'static str,
    /// Declared type.
    pub ty: FieldType,
    /// Whether the column accepts `NULL`.
    pub nullable: bool,
}

impl FieldDef {
    /// Declare a non-null field.
    pub const fn new(name: &'static str, column: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            column,
            ty,
            nullable: false,
        }
    }

    /// Declare a nullable field.
    pub const fn nullable(name: &'static str, column: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            column,
            ty,
            nullable: true,
        }
    }
}

/// A many-to-one association stored as a foreign key field.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RelationDef {
    /// Relation name used in entity graphs and property paths.
    pub name: &'static str,
    /// Logical name of the foreign key field on the owning entity.
    pub field: &'static str,
    /// Schema of the referenced entity.
    #[serde(skip)]
    pub target: &'static EntitySchema,
}

/// Mapping of one entity to its table.
#[derive(Debug, Serialize)]
pub struct EntitySchema {
    /// Entity name (`Member`).
    pub entity: &'static str,
    /// Table name.
    pub table: &'static str,
    /// Logical name of the identity field.
    pub id: &'static str,
    /// Whether the store generates identity values on insert.
    pub id_generated: bool,
    /// All persisted fields, identity included.
    pub fields: &'static [FieldDef],
    /// Many-to-one relations.
    pub relations: &'static [RelationDef],
}

/// A field reached from an entity, possibly through a relation.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedPath {
    /// The relation traversed, if the path is `relation.field`.
    pub relation: Option<&'static RelationDef>,
    /// The terminal field.
    pub field: &'static FieldDef,
}

impl EntitySchema {
    /// Look up a field by logical name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by logical name or fail with `UnknownField`.
    pub fn require_field(&self, name: &str) -> AppResult<&'static FieldDef> {
        self.field(name)
            .ok_or_else(|| AppError::unknown_field(self.entity, name))
    }

    /// Look up a field by physical column name.
    pub fn field_by_column(&self, column: &str) -> Option<&'static FieldDef> {
        self.fields
            .iter()
            .find(|f| f.column.eq_ignore_ascii_case(column))
    }

    /// The identity field.
    pub fn id_field(&self) -> &'static FieldDef {
        self.field(self.id)
            .expect("entity schema must declare its identity field")
    }

    /// Look up a relation by name.
    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Resolve `field` or `relation.field`.
    pub fn resolve(&self, path: &str) -> AppResult<ResolvedPath> {
        match path.split_once('.') {
            None => Ok(ResolvedPath {
                relation: None,
                field: self.require_field(path)?,
            }),
            Some((relation, field)) => {
                let relation = self
                    .relation(relation)
                    .ok_or_else(|| AppError::unknown_field(self.entity, path))?;
                let field = relation
                    .target
                    .field(field)
                    .ok_or_else(|| AppError::unknown_field(self.entity, path))?;
                Ok(ResolvedPath {
                    relation: Some(relation),
                    field,
                })
            }
        }
    }

    /// All physical columns in declaration order.
    pub fn columns(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.column).collect()
    }

    /// Short table alias used in generated SQL (`member` → `m`).
    pub fn alias(&self) -> String {
        self.table
            .chars()
            .next()
            .map(|c| c.to_ascii_lowercase().to_string())
            .unwrap_or_else(|| "t".to_string())
    }
}

/// `team_id` → `TeamId`.
pub fn to_pascal_case(name: &str) -> String {
    name.split(['_', '.'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    static OWNER: EntitySchema = EntitySchema {
        entity: "Owner",
        table: "owner",
        id: "id",
        id_generated: true,
        fields: &[
            FieldDef::new("id", "owner_id", FieldType::Int),
            FieldDef::new("name", "name", FieldType::Text),
        ],
        relations: &[],
    };

    static PET: EntitySchema = EntitySchema {
        entity: "Pet",
        table: "pet",
        id: "id",
        id_generated: true,
        fields: &[
            FieldDef::new("id", "pet_id", FieldType::Int),
            FieldDef::nullable("owner_id", "owner_id", FieldType::Int),
        ],
        relations: &[RelationDef {
            name: "owner",
            field: "owner_id",
            target: &OWNER,
        }],
    };

    #[test]
    fn test_resolve_plain_and_relation_paths() {
        let plain = PET.resolve("owner_id").unwrap();
        assert!(plain.relation.is_none());
        let nested = PET.resolve("owner.name").unwrap();
        assert_eq!(nested.relation.unwrap().name, "owner");
        assert_eq!(nested.field.column, "name");
        assert!(PET.resolve("owner.age").is_err());
        assert!(PET.resolve("breed").is_err());
    }

    #[test]
    fn test_field_by_column_and_alias() {
        assert_eq!(PET.field_by_column("PET_ID").unwrap().name, "id");
        assert_eq!(PET.alias(), "p");
        assert_eq!(PET.id_field().column, "pet_id");
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("team_id"), "TeamId");
        assert_eq!(to_pascal_case("team.name"), "TeamName");
        assert_eq!(to_pascal_case("username"), "Username");
    }

    #[test]
    fn test_field_type_admits() {
        assert!(FieldType::Float.admits(&Value::Int(3)));
        assert!(!FieldType::Int.admits(&Value::Text("3".into())));
        assert!(FieldType::Text.admits(&Value::Null));
    }
}
