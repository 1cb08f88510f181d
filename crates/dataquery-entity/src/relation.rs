//! Many-to-one association state.

use serde::Serialize;

use dataquery_core::result::AppResult;
use dataquery_core::traits::Entity;
use dataquery_core::types::{Row, Value};

/// The referenced side of a many-to-one association.
///
/// Related rows are never fetched implicitly. A relation is `Loaded` only
/// when the query requested it through an entity graph (or the caller set
/// it); otherwise it only knows the foreign key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Relation<T> {
    /// The foreign key is null.
    Absent,
    /// The foreign key is known but the row was not fetched.
    Unloaded(Value),
    /// The related entity was fetched.
    Loaded(Box<T>),
}

impl<T> Default for Relation<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T: Entity> Relation<T> {
    /// Reference an entity that is already in hand.
    pub fn to(entity: &T) -> Self {
        Self::Loaded(Box::new(entity.clone()))
    }

    /// Foreign key value (`Value::Null` when absent).
    pub fn key(&self) -> Value {
        match self {
            Self::Absent => Value::Null,
            Self::Unloaded(id) => id.clone(),
            Self::Loaded(entity) => entity.id(),
        }
    }

    /// The fetched entity, if loaded.
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Loaded(entity) => Some(entity),
            _ => None,
        }
    }

    /// Whether the related entity was fetched.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Read the association from a row: the fetched related row when the
    /// query attached one, otherwise the foreign key column.
    pub fn from_row(row: &Row, name: &str, key_field: &str) -> AppResult<Self> {
        match row.related(name) {
            Some(Some(related)) => Ok(Self::Loaded(Box::new(T::from_row(related)?))),
            Some(None) => Ok(Self::Absent),
            None => match row.get(key_field) {
                None | Some(Value::Null) => Ok(Self::Absent),
                Some(key) => Ok(Self::Unloaded(key.clone())),
            },
        }
    }
}
