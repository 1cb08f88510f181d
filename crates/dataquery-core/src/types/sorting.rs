//! Sorting types for paged and listed queries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Return the SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(AppError::validation(format!(
                "invalid sort direction '{other}', expected asc or desc"
            ))),
        }
    }
}

/// A sort specification consisting of a field name and direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Logical field name to sort by.
    pub field: String,
    /// Sort direction.
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortField {
    /// Create a new sort field.
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Create an ascending sort on the given field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    /// Create a descending sort on the given field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}",
            self.field,
            self.direction.as_sql().to_ascii_lowercase()
        )
    }
}

/// Ordered list of sort fields, applied in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sort(Vec<SortField>);

impl Sort {
    /// No ordering.
    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Sort by one field.
    pub fn by(direction: SortDirection, field: impl Into<String>) -> Self {
        Self(vec![SortField::new(field, direction)])
    }

    /// Append another sort field.
    pub fn and(mut self, direction: SortDirection, field: impl Into<String>) -> Self {
        self.0.push(SortField::new(field, direction));
        self
    }

    /// Parse `field[,dir]` items such as `username,desc`.
    pub fn parse<S: AsRef<str>>(items: &[S]) -> AppResult<Self> {
        let mut fields = Vec::with_capacity(items.len());
        for item in items {
            let item = item.as_ref().trim();
            if item.is_empty() {
                continue;
            }
            let field = match item.split_once(',') {
                Some((field, direction)) => SortField::new(field.trim(), direction.parse()?),
                None => SortField::asc(item),
            };
            if field.field.is_empty() {
                return Err(AppError::validation(format!("empty sort field in '{item}'")));
            }
            fields.push(field);
        }
        Ok(Self(fields))
    }

    /// Whether no field is set.
    pub fn is_unsorted(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields in order.
    pub fn fields(&self) -> &[SortField] {
        &self.0
    }

    /// Iterate fields in order.
    pub fn iter(&self) -> std::slice::Iter<'_, SortField> {
        self.0.iter()
    }
}

impl From<Vec<SortField>> for Sort {
    fn from(fields: Vec<SortField>) -> Self {
        Self(fields)
    }
}

impl<'a> IntoIterator for &'a Sort {
    type Item = &'a SortField;
    type IntoIter = std::slice::Iter<'a, SortField>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
