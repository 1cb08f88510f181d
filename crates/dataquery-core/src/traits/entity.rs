//! Entity and row-mapping traits.

use chrono::{DateTime, Utc};

use crate::result::AppResult;
use crate::types::audit::AuditFields;
use crate::types::row::Row;
use crate::types::schema::EntitySchema;
use crate::types::value::Value;

/// What a result type needs from each row.
#[derive(Debug, Clone, Copy)]
pub enum Selection {
    /// Every column of the entity; rows go through the persistence context.
    Entity(&'static EntitySchema),
    /// A named-field subset (projection).
    Fields(&'static [&'static str]),
    /// The first column.
    Scalar,
}

/// Maps one normalized result row to a value.
pub trait FromRow: Sized + Send {
    /// Columns this type reads.
    fn selection() -> Selection;

    /// Build the value from a row whose columns carry logical names.
    fn from_row(row: &Row) -> AppResult<Self>;
}

/// A persisted record with a stable identity.
pub trait Entity: FromRow + Clone + Sync + 'static {
    /// Static table mapping.
    fn schema() -> &'static EntitySchema;

    /// Current identity value; `Value::Null` before the first insert of a
    /// generated identity.
    fn id(&self) -> Value;

    /// Store the identity generated on insert.
    fn set_id(&mut self, id: Value) -> AppResult<()>;

    /// Every persisted field as `(logical name, value)`, identity included.
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Whether `save` must insert rather than update.
    fn is_new(&self) -> bool {
        self.id().is_null()
    }

    /// Audit stamps, for entities that carry them.
    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        None
    }
}

macro_rules! scalar_from_row {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromRow for $ty {
                fn selection() -> Selection {
                    Selection::Scalar
                }

                fn from_row(row: &Row) -> AppResult<Self> {
                    row.first_as()
                }
            }
        )*
    };
}

scalar_from_row!(String, i64, i32, bool, f64, DateTime<Utc>, Value);

impl FromRow for Row {
    fn selection() -> Selection {
        Selection::Scalar
    }

    fn from_row(row: &Row) -> AppResult<Self> {
        Ok(row.clone())
    }
}
