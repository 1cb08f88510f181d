//! Read-only projections of [`Member`].

use serde::Serialize;

use dataquery_core::result::AppResult;
use dataquery_core::traits::{FromRow, Selection};
use dataquery_core::types::Row;

use super::model::Member;

/// Member with its team name, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberDto {
    /// Member id.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Team name, when the source query joined it.
    pub team_name: Option<String>,
}

impl MemberDto {
    /// Create a DTO.
    pub fn new(id: i64, username: impl Into<String>, team_name: Option<String>) -> Self {
        Self {
            id,
            username: username.into(),
            team_name,
        }
    }
}

impl From<&Member> for MemberDto {
    /// Uses the team name only when the team was fetched.
    fn from(member: &Member) -> Self {
        Self {
            id: member.id.unwrap_or_default(),
            username: member.username.clone(),
            team_name: member.team().map(|t| t.name.clone()),
        }
    }
}

impl FromRow for MemberDto {
    fn selection() -> Selection {
        Selection::Fields(&["id", "username", "team_name"])
    }

    fn from_row(row: &Row) -> AppResult<Self> {
        Ok(Self {
            id: row.get_as("id")?,
            username: row.get_as("username")?,
            team_name: match row.get("team_name") {
                Some(_) => row.get_as("team_name")?,
                None => None,
            },
        })
    }
}

/// Projection exposing only a display name built from username and age.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsernameOnly {
    username: String,
    age: i32,
}

impl UsernameOnly {
    /// `"<username> <age>"`.
    pub fn username(&self) -> String {
        format!("{} {}", self.username, self.age)
    }
}

impl FromRow for UsernameOnly {
    fn selection() -> Selection {
        Selection::Fields(&["username", "age"])
    }

    fn from_row(row: &Row) -> AppResult<Self> {
        Ok(Self {
            username: row.get_as("username")?,
            age: row.get_as("age")?,
        })
    }
}
