//! Member entity model.

use serde::Serialize;

use dataquery_core::result::AppResult;
use dataquery_core::traits::{Entity, FromRow, Selection};
use dataquery_core::types::{EntitySchema, FieldDef, FieldType, FromValue, RelationDef, Row, Value};

use crate::relation::Relation;
use crate::team::{TEAM_SCHEMA, Team};

/// Table mapping for [`Member`].
pub static MEMBER_SCHEMA: EntitySchema = EntitySchema {
    entity: "Member",
    table: "member",
    id: "id",
    id_generated: true,
    fields: &[
        FieldDef::new("id", "member_id", FieldType::Int),
        FieldDef::new("username", "username", FieldType::Text),
        FieldDef::new("age", "age", FieldType::Int),
        FieldDef::nullable("team_id", "team_id", FieldType::Int),
    ],
    relations: &[RelationDef {
        name: "team",
        field: "team_id",
        target: &TEAM_SCHEMA,
    }],
};

/// A member, optionally belonging to a [`Team`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    /// Generated identifier; `None` until inserted.
    pub id: Option<i64>,
    /// Login name.
    pub username: String,
    /// Age in years.
    pub age: i32,
    /// The member's team.
    pub team: Relation<Team>,
}

impl Member {
    /// A new member with age 0 and no team.
    pub fn new(username: impl Into<String>) -> Self {
        Self::with_age(username, 0)
    }

    /// A new member without a team.
    pub fn with_age(username: impl Into<String>, age: i32) -> Self {
        Self {
            id: None,
            username: username.into(),
            age,
            team: Relation::Absent,
        }
    }

    /// A new member in a (saved) team.
    pub fn with_team(username: impl Into<String>, age: i32, team: &Team) -> Self {
        let mut member = Self::with_age(username, age);
        member.change_team(team);
        member
    }

    /// Move the member to another team.
    pub fn change_team(&mut self, team: &Team) {
        self.team = Relation::to(team);
    }

    /// The team, if it was fetched.
    pub fn team(&self) -> Option<&Team> {
        self.team.get()
    }
}

impl FromRow for Member {
    fn selection() -> Selection {
        Selection::Entity(&MEMBER_SCHEMA)
    }

    fn from_row(row: &Row) -> AppResult<Self> {
        Ok(Self {
            id: row.get_as("id")?,
            username: row.get_as("username")?,
            age: row.get_as("age")?,
            team: Relation::from_row(row, "team", "team_id")?,
        })
    }
}

impl Entity for Member {
    fn schema() -> &'static EntitySchema {
        &MEMBER_SCHEMA
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
            ("username", self.username.as_str().into()),
            ("age", self.age.into()),
            ("team_id", self.team.key()),
        ]
    }
}
