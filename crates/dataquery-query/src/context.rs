//! Per-session identity map.

use std::collections::HashMap;

use dataquery_core::types::{EntitySchema, Row, Value};

/// Entity state loaded in one session, keyed by `(table, id)`.
///
/// Once an entity is known, later reads of the same id resolve to the
/// known state until the context is cleared.
#[derive(Debug, Default)]
pub struct PersistenceContext {
    entries: HashMap<(&'static str, String), Row>,
}

impl PersistenceContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(schema: &'static EntitySchema, id: &Value) -> (&'static str, String) {
        (schema.table, id.key())
    }

    /// Known state of an entity.
    pub fn get(&self, schema: &'static EntitySchema, id: &Value) -> Option<&Row> {
        self.entries.get(&Self::key(schema, id))
    }

    /// Record the state of an entity, replacing any previous one. Rows
    /// without an identity are ignored.
    pub fn put(&mut self, schema: &'static EntitySchema, row: Row) {
        let Some(id) = row.get(schema.id).filter(|id| !id.is_null()) else {
            return;
        };
        let key = Self::key(schema, id);
        self.entries.insert(key, row);
    }

    /// Resolve a freshly read row: the known state wins, otherwise the
    /// row becomes the known state.
    pub fn resolve(&mut self, schema: &'static EntitySchema, row: Row) -> Row {
        let Some(id) = row.get(schema.id).filter(|id| !id.is_null()) else {
            return row;
        };
        self.entries
            .entry(Self::key(schema, id))
            .or_insert(row)
            .clone()
    }

    /// Forget one entity.
    pub fn evict(&mut self, schema: &'static EntitySchema, id: &Value) {
        self.entries.remove(&Self::key(schema, id));
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of known entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
