//! Result rows returned by stores.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::schema::EntitySchema;
use crate::types::value::{FromValue, Value};

/// One result row: ordered named columns plus eagerly fetched relations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
    /// Fetched relations; `None` means the foreign key was null.
    related: BTreeMap<String, Option<Row>>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut row = Self::new();
        for (column, value) in pairs {
            row.push(column, value);
        }
        row
    }

    /// Append or overwrite a column.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.position(&column) {
            Some(i) => self.values[i] = value,
            None => {
                self.columns.push(column);
                self.values.push(value);
            }
        }
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw value of a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.position(column).map(|i| &self.values[i])
    }

    /// Typed value of a column; a missing column is a mapping error.
    pub fn get_as<T: FromValue>(&self, column: &str) -> AppResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| AppError::mapping(format!("row has no column '{column}'")))?;
        T::from_value(value)
            .map_err(|e| AppError::mapping(format!("column '{column}': {}", e.message)))
    }

    /// Typed value of the first column (scalar results).
    pub fn first_as<T: FromValue>(&self) -> AppResult<T> {
        let value = self
            .values
            .first()
            .ok_or_else(|| AppError::mapping("scalar result row has no columns"))?;
        T::from_value(value)
    }

    /// Rename physical columns to the schema's logical field names.
    /// Columns the schema does not know keep their name.
    pub fn into_logical(self, schema: &EntitySchema) -> Self {
        let columns = self
            .columns
            .into_iter()
            .map(|c| match schema.field_by_column(&c) {
                Some(field) => field.name.to_string(),
                None => c,
            })
            .collect();
        Self {
            columns,
            values: self.values,
            related: self.related,
        }
    }

    /// Keep only the given columns, in the given order.
    pub fn project(&self, columns: &[&str]) -> Self {
        let mut row = Self::new();
        for column in columns {
            row.push(*column, self.get(column).cloned().unwrap_or(Value::Null));
        }
        row
    }

    /// Attach a fetched relation.
    pub fn set_related(&mut self, name: impl Into<String>, row: Option<Row>) {
        self.related.insert(name.into(), row);
    }

    /// A fetched relation: `None` if not fetched, `Some(None)` if the
    /// foreign key was null.
    pub fn related(&self, name: &str) -> Option<Option<&Row>> {
        self.related.get(name).map(Option::as_ref)
    }
}
