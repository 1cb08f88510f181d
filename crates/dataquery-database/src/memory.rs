//! In-memory store.
//!
//! Evaluates structured [`Plan`]s over in-process tables, so every
//! criteria query and CRUD operation runs without a database. Native
//! SQL templates cannot be evaluated and fail with `Unsupported`.
//!
//! A transactional connection holds the table lock until it finishes,
//! which serializes transactions. While one is open, statements on other
//! connections wait for it.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::traits::{Store, StoreConnection};
use dataquery_core::types::{
    Assignment, ComparisonOp, Condition, Connector, Dialect, EntitySchema, Filter, FilterPlan,
    InsertPlan, OrderTerm, Plan, Row, SelectPlan, SortDirection, Statement, UpdatePlan, Value,
};

#[derive(Debug, Clone)]
struct Table {
    schema: &'static EntitySchema,
    rows: Vec<Row>,
    next_id: i64,
}

type Tables = HashMap<&'static str, Table>;

/// Tables held in process memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    statements: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create empty tables for the given entities.
    pub fn new(schemas: &[&'static EntitySchema]) -> Self {
        let tables = schemas
            .iter()
            .map(|schema| {
                (
                    schema.table,
                    Table {
                        schema,
                        rows: Vec::new(),
                        next_id: 1,
                    },
                )
            })
            .collect();
        info!(tables = schemas.len(), "In-memory store created");
        Self {
            tables: Arc::new(Mutex::new(tables)),
            statements: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of statements executed so far, on any connection.
    pub fn statements_executed(&self) -> usize {
        self.statements.load(AtomicOrdering::SeqCst)
    }

    /// Number of rows in a table.
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .await
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    /// Delete every row and restart identity sequences.
    pub async fn reset(&self) {
        for table in self.tables.lock().await.values_mut() {
            table.rows.clear();
            table.next_id = 1;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn connect(&self) -> AppResult<Box<dyn StoreConnection>> {
        Ok(Box::new(MemoryConnection {
            access: Access::Shared(Arc::clone(&self.tables)),
            statements: Arc::clone(&self.statements),
        }))
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreConnection>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryConnection {
            access: Access::Held {
                guard,
                snapshot: Some(snapshot),
            },
            statements: Arc::clone(&self.statements),
        }))
    }
}

enum Access {
    Shared(Arc<Mutex<Tables>>),
    /// Transaction: the lock is held, the snapshot restores on rollback.
    Held {
        guard: OwnedMutexGuard<Tables>,
        snapshot: Option<Tables>,
    },
}

/// A connection to a [`MemoryStore`].
pub struct MemoryConnection {
    access: Access,
    statements: Arc<AtomicUsize>,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if let Access::Held { guard, snapshot } = &mut self.access {
            if let Some(snapshot) = snapshot.take() {
                **guard = snapshot;
            }
        }
    }
}

impl MemoryConnection {
    async fn with_tables<R>(
        &mut self,
        statement: &Statement,
        f: impl FnOnce(&mut Tables, &Plan) -> AppResult<R> + Send,
    ) -> AppResult<R> {
        self.statements.fetch_add(1, AtomicOrdering::SeqCst);
        if matches!(statement.plan, Plan::Native) {
            return Err(AppError::unsupported(
                "the in-memory store cannot evaluate native SQL",
            ));
        }
        match &mut self.access {
            Access::Shared(tables) => {
                let mut tables = tables.lock().await;
                f(&mut tables, &statement.plan)
            }
            Access::Held { guard, .. } => f(guard, &statement.plan),
        }
    }

    fn take_snapshot(&mut self) -> AppResult<Option<Tables>> {
        match &mut self.access {
            Access::Held { snapshot, .. } if snapshot.is_some() => Ok(snapshot.take()),
            _ => Err(AppError::no_active_transaction(
                "connection is not in a transaction",
            )),
        }
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    fn in_transaction(&self) -> bool {
        matches!(&self.access, Access::Held { snapshot: Some(_), .. })
    }

    async fn execute(&mut self, statement: &Statement) -> AppResult<Vec<Row>> {
        self.with_tables(statement, |tables, plan| match plan {
            Plan::Select(select) => select_rows(tables, select),
            Plan::Count(count) => Ok(vec![Row::from_pairs([(
                "count",
                count_rows(tables, count)?,
            )])]),
            Plan::Insert(insert) => insert_row(tables, insert).map(|row| row.into_iter().collect()),
            _ => Err(AppError::unsupported(
                "statement does not return rows; use a bulk execution",
            )),
        })
        .await
    }

    async fn execute_count(&mut self, statement: &Statement) -> AppResult<i64> {
        self.with_tables(statement, |tables, plan| match plan {
            Plan::Count(count) => count_rows(tables, count),
            _ => Err(AppError::unsupported("statement is not a count")),
        })
        .await
    }

    async fn execute_bulk(&mut self, statement: &Statement) -> AppResult<u64> {
        self.with_tables(statement, |tables, plan| match plan {
            Plan::Insert(insert) => insert_row(tables, insert).map(|_| 1),
            Plan::Update(update) => update_rows(tables, update),
            Plan::Delete(delete) => delete_rows(tables, delete),
            _ => Err(AppError::unsupported("statement is not an insert, update or delete")),
        })
        .await
    }

    async fn commit(&mut self) -> AppResult<()> {
        self.take_snapshot()?;
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        let snapshot = self.take_snapshot()?;
        if let (Access::Held { guard, .. }, Some(snapshot)) = (&mut self.access, snapshot) {
            **guard = snapshot;
        }
        Ok(())
    }
}

fn table<'a>(tables: &'a Tables, name: &str) -> AppResult<&'a Table> {
    tables
        .get(name)
        .ok_or_else(|| AppError::database(format!("relation \"{name}\" does not exist")))
}

fn table_mut<'a>(tables: &'a mut Tables, name: &str) -> AppResult<&'a mut Table> {
    tables
        .get_mut(name)
        .ok_or_else(|| AppError::database(format!("relation \"{name}\" does not exist")))
}

/// Evaluate a filter left to right, `AND` binding tighter than `OR`.
fn matches(tables: &Tables, row: &Row, filter: &Filter) -> AppResult<bool> {
    let mut any = false;
    let mut all = true;
    for (i, (connector, condition)) in filter.iter().enumerate() {
        if i > 0 && *connector == Connector::Or {
            any |= all;
            all = true;
        }
        if all {
            all = holds(tables, row, condition)?;
        }
    }
    Ok(any || all)
}

fn holds(tables: &Tables, row: &Row, condition: &Condition) -> AppResult<bool> {
    let lhs = row.get(&condition.column).cloned().unwrap_or(Value::Null);
    let Some(sub) = &condition.via else {
        return Ok(compare(condition.op, &lhs, condition.value.as_ref()));
    };
    if lhs.is_null() {
        return Ok(false);
    }
    let target = table(tables, &sub.table)?;
    Ok(target.rows.iter().any(|candidate| {
        let value = candidate.get(&sub.column).cloned().unwrap_or(Value::Null);
        candidate.get(&sub.key_column) == Some(&lhs)
            && compare(condition.op, &value, condition.value.as_ref())
    }))
}

/// SQL comparison semantics: anything compared with `NULL` is false.
fn compare(op: ComparisonOp, lhs: &Value, rhs: Option<&Value>) -> bool {
    let rhs = rhs.unwrap_or(&Value::Null);
    match op {
        ComparisonOp::IsNull => lhs.is_null(),
        ComparisonOp::IsNotNull => !lhs.is_null(),
        ComparisonOp::Eq => lhs.compare(rhs) == Some(Ordering::Equal),
        ComparisonOp::Ne => matches!(lhs.compare(rhs), Some(o) if o != Ordering::Equal),
        ComparisonOp::Gt => lhs.compare(rhs) == Some(Ordering::Greater),
        ComparisonOp::Gte => matches!(lhs.compare(rhs), Some(Ordering::Greater | Ordering::Equal)),
        ComparisonOp::Lt => lhs.compare(rhs) == Some(Ordering::Less),
        ComparisonOp::Lte => matches!(lhs.compare(rhs), Some(Ordering::Less | Ordering::Equal)),
        ComparisonOp::In => list(rhs)
            .iter()
            .any(|item| lhs.compare(item) == Some(Ordering::Equal)),
        ComparisonOp::NotIn => {
            let items = list(rhs);
            !items.is_empty()
                && items
                    .iter()
                    .all(|item| matches!(lhs.compare(item), Some(o) if o != Ordering::Equal))
        }
        ComparisonOp::Like => match (lhs, rhs) {
            (Value::Text(text), Value::Text(pattern)) => like(text, pattern),
            _ => false,
        },
    }
}

fn list(value: &Value) -> &[Value] {
    match value {
        Value::List(items) => items,
        other => std::slice::from_ref(other),
    }
}

/// `LIKE` with `%` and `_` wildcards.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    // matched[j]: text[..i] matches pattern[..j]
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && pattern[j - 1] == '%';
    }
    for c in text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p == c,
            };
        }
        matched = next;
    }
    matched[pattern.len()]
}

fn order_rows(rows: &mut [Row], order: &[OrderTerm]) {
    rows.sort_by(|a, b| {
        for term in order {
            let left = a.get(&term.column).unwrap_or(&Value::Null);
            let right = b.get(&term.column).unwrap_or(&Value::Null);
            let ordering = match term.direction {
                SortDirection::Asc => left.sort_cmp(right),
                SortDirection::Desc => right.sort_cmp(left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn select_rows(tables: &Tables, select: &SelectPlan) -> AppResult<Vec<Row>> {
    let source = table(tables, &select.table)?;
    let mut rows = Vec::new();
    for row in &source.rows {
        if matches(tables, row, &select.filter)? {
            rows.push(row.clone());
        }
    }
    order_rows(&mut rows, &select.order);

    let columns: Vec<&str> = select.columns.iter().map(String::as_str).collect();
    let mut projected: Vec<Row> = rows.iter().map(|row| row.project(&columns)).collect();
    if select.distinct {
        let mut seen = HashSet::new();
        projected.retain(|row| {
            let key: Vec<String> = row.values().iter().map(Value::key).collect();
            seen.insert(key)
        });
    }

    let offset = usize::try_from(select.offset).unwrap_or(usize::MAX);
    let limit = select
        .limit
        .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
    Ok(projected.into_iter().skip(offset).take(limit).collect())
}

fn count_rows(tables: &Tables, count: &FilterPlan) -> AppResult<i64> {
    let source = table(tables, &count.table)?;
    let mut n = 0i64;
    for row in &source.rows {
        if matches(tables, row, &count.filter)? {
            n += 1;
        }
    }
    Ok(n)
}

/// Insert a row; returns the generated identity as a one-column row when
/// the plan asks for it.
fn insert_row(tables: &mut Tables, insert: &InsertPlan) -> AppResult<Option<Row>> {
    let target = table_mut(tables, &insert.table)?;
    let schema = target.schema;
    let id_column = schema.id_field().column;

    let mut row = Row::new();
    for field in schema.fields {
        let value = insert
            .values
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(field.column))
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Null);
        row.push(field.column, value);
    }

    let mut returned = None;
    if let Some(column) = &insert.returning {
        let id = Value::Int(target.next_id);
        target.next_id += 1;
        row.push(column.as_str(), id.clone());
        returned = Some(Row::from_pairs([(column.as_str(), id)]));
    }

    for field in schema.fields {
        if !field.nullable && row.get(field.column).is_none_or(Value::is_null) {
            return Err(AppError::database(format!(
                "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                field.column, schema.table
            )));
        }
    }
    let id = row.get(id_column).cloned().unwrap_or(Value::Null);
    if target.rows.iter().any(|r| r.get(id_column) == Some(&id)) {
        return Err(AppError::database(format!(
            "duplicate key value violates unique constraint \"{}_pkey\"",
            schema.table
        )));
    }
    if let Value::Int(n) = id {
        target.next_id = target.next_id.max(n.saturating_add(1));
    }

    target.rows.push(row);
    Ok(returned)
}

fn matching_indexes(tables: &Tables, name: &str, filter: &Filter) -> AppResult<Vec<usize>> {
    let source = table(tables, name)?;
    let mut indexes = Vec::new();
    for (i, row) in source.rows.iter().enumerate() {
        if matches(tables, row, filter)? {
            indexes.push(i);
        }
    }
    Ok(indexes)
}

fn add(current: &Value, delta: &Value) -> AppResult<Value> {
    match (current, delta) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or_else(|| AppError::database("bigint out of range")),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (a, b) => Err(AppError::database(format!(
            "operator does not exist: {} + {}",
            a.kind(),
            b.kind()
        ))),
    }
}

fn update_rows(tables: &mut Tables, update: &UpdatePlan) -> AppResult<u64> {
    let indexes = matching_indexes(tables, &update.table, &update.filter)?;
    let target = table_mut(tables, &update.table)?;

    // Every new value is computed from the old rows before any is written.
    let mut changes = Vec::with_capacity(indexes.len());
    for &i in &indexes {
        let row = &target.rows[i];
        let mut values = Vec::with_capacity(update.assignments.len());
        for (column, assignment) in &update.assignments {
            let value = match assignment {
                Assignment::Set(value) => value.clone(),
                Assignment::Increment(delta) => {
                    add(row.get(column).unwrap_or(&Value::Null), delta)?
                }
            };
            values.push((column.as_str(), value));
        }
        changes.push((i, values));
    }

    for (i, values) in changes {
        let row = &mut target.rows[i];
        for (column, value) in values {
            row.push(column, value);
        }
    }
    Ok(indexes.len() as u64)
}

fn delete_rows(tables: &mut Tables, delete: &FilterPlan) -> AppResult<u64> {
    let indexes: HashSet<usize> = matching_indexes(tables, &delete.table, &delete.filter)?
        .into_iter()
        .collect();
    let target = table_mut(tables, &delete.table)?;
    let mut i = 0;
    target.rows.retain(|_| {
        let keep = !indexes.contains(&i);
        i += 1;
        keep
    });
    Ok(indexes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataquery_core::types::{FieldDef, FieldType, LockMode};

    static THING: EntitySchema = EntitySchema {
        entity: "Thing",
        table: "thing",
        id: "id",
        id_generated: true,
        fields: &[
            FieldDef::new("id", "thing_id", FieldType::Int),
            FieldDef::new("label", "label", FieldType::Text),
            FieldDef::nullable("rank", "rank", FieldType::Int),
        ],
        relations: &[],
    };

    fn statement(plan: Plan) -> Statement {
        Statement {
            sql: String::new(),
            binds: Vec::new(),
            plan,
            source: None,
        }
    }

    fn insert(label: &str, rank: Value) -> Statement {
        statement(Plan::Insert(InsertPlan {
            table: "thing".into(),
            values: vec![("label".into(), Value::from(label)), ("rank".into(), rank)],
            returning: Some("thing_id".into()),
        }))
    }

    fn condition(column: &str, op: ComparisonOp, value: Option<Value>) -> Condition {
        Condition {
            column: column.into(),
            op,
            value,
            hint: None,
            via: None,
        }
    }

    fn select(filter: Filter) -> Statement {
        statement(Plan::Select(SelectPlan {
            table: "thing".into(),
            columns: vec!["thing_id".into(), "label".into()],
            distinct: false,
            filter,
            order: vec![OrderTerm {
                column: "thing_id".into(),
                direction: SortDirection::Asc,
            }],
            limit: None,
            offset: 0,
            lock: LockMode::None,
        }))
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like("member1", "mem%"));
        assert!(like("member1", "%ber_"));
        assert!(!like("member1", "ber%"));
        assert!(like("", "%"));
    }

    #[test]
    fn test_null_comparisons_are_false() {
        assert!(!compare(ComparisonOp::Eq, &Value::Null, Some(&Value::Null)));
        assert!(!compare(ComparisonOp::Ne, &Value::Null, Some(&Value::Int(1))));
        assert!(!compare(ComparisonOp::NotIn, &Value::Int(1), Some(&Value::List(Vec::new()))));
        assert!(compare(ComparisonOp::IsNull, &Value::Null, None));
    }

    #[tokio::test]
    async fn test_insert_generates_ids_and_filters() {
        let store = MemoryStore::new(&[&THING]);
        let mut conn = store.connect().await.unwrap();
        let first = conn.execute(&insert("a", Value::Int(1))).await.unwrap();
        assert_eq!(first[0].get("thing_id"), Some(&Value::Int(1)));
        conn.execute(&insert("b", Value::Null)).await.unwrap();
        conn.execute(&insert("c", Value::Int(3))).await.unwrap();

        let rows = conn
            .execute(&select(vec![
                (Connector::And, condition("rank", ComparisonOp::Gte, Some(Value::Int(2)))),
                (Connector::Or, condition("label", ComparisonOp::Eq, Some(Value::from("a")))),
            ]))
            .await
            .unwrap();
        let labels: Vec<&Value> = rows.iter().filter_map(|r| r.get("label")).collect();
        assert_eq!(labels, vec![&Value::from("a"), &Value::from("c")]);
        assert_eq!(store.statements_executed(), 4);
    }

    #[tokio::test]
    async fn test_rollback_restores_snapshot() {
        let store = MemoryStore::new(&[&THING]);
        {
            let mut tx = store.begin().await.unwrap();
            assert!(tx.in_transaction());
            tx.execute(&insert("a", Value::Null)).await.unwrap();
            tx.rollback().await.unwrap();
            assert!(!tx.in_transaction());
        }
        assert_eq!(store.row_count("thing").await, 0);

        {
            let mut tx = store.begin().await.unwrap();
            tx.execute(&insert("b", Value::Null)).await.unwrap();
        }
        assert_eq!(store.row_count("thing").await, 0);

        let mut tx = store.begin().await.unwrap();
        tx.execute(&insert("c", Value::Null)).await.unwrap();
        tx.commit().await.unwrap();
        drop(tx);
        assert_eq!(store.row_count("thing").await, 1);
    }

    #[tokio::test]
    async fn test_update_increment_and_delete() {
        let store = MemoryStore::new(&[&THING]);
        let mut conn = store.connect().await.unwrap();
        for rank in [1, 2, 3] {
            conn.execute(&insert("x", Value::Int(rank))).await.unwrap();
        }
        let filter = vec![(Connector::And, condition("rank", ComparisonOp::Gte, Some(Value::Int(2))))];
        let updated = conn
            .execute_bulk(&statement(Plan::Update(UpdatePlan {
                table: "thing".into(),
                assignments: vec![("rank".into(), Assignment::Increment(Value::Int(1)))],
                filter: filter.clone(),
            })))
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let deleted = conn
            .execute_bulk(&statement(Plan::Delete(FilterPlan {
                table: "thing".into(),
                filter: vec![(Connector::And, condition("rank", ComparisonOp::Gt, Some(Value::Int(3))))],
            })))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.row_count("thing").await, 2);
    }

    #[tokio::test]
    async fn test_native_sql_is_unsupported() {
        let store = MemoryStore::new(&[&THING]);
        let mut conn = store.connect().await.unwrap();
        let err = conn.execute(&statement(Plan::Native)).await.unwrap_err();
        assert_eq!(err.kind, dataquery_core::error::ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn test_not_null_violation() {
        let store = MemoryStore::new(&[&THING]);
        let mut conn = store.connect().await.unwrap();
        let err = conn
            .execute_bulk(&statement(Plan::Insert(InsertPlan {
                table: "thing".into(),
                values: vec![("label".into(), Value::Null)],
                returning: Some("thing_id".into()),
            })))
            .await
            .unwrap_err();
        assert_eq!(err.kind, dataquery_core::error::ErrorKind::Database);
    }

    #[tokio::test]
    async fn test_increment_overflow_leaves_rows_unchanged() {
        let store = MemoryStore::new(&[&THING]);
        let mut conn = store.connect().await.unwrap();
        conn.execute(&insert("a", Value::Int(1))).await.unwrap();
        conn.execute(&insert("b", Value::Int(i64::MAX))).await.unwrap();

        let err = conn
            .execute_bulk(&statement(Plan::Update(UpdatePlan {
                table: "thing".into(),
                assignments: vec![("rank".into(), Assignment::Increment(Value::Int(1)))],
                filter: Vec::new(),
            })))
            .await
            .unwrap_err();
        assert_eq!(err.kind, dataquery_core::error::ErrorKind::Database);

        for rank in [1, i64::MAX] {
            let rows = conn
                .execute(&select(vec![(
                    Connector::And,
                    condition("rank", ComparisonOp::Eq, Some(Value::Int(rank))),
                )]))
                .await
                .unwrap();
            assert_eq!(rows.len(), 1, "rank {rank} must be untouched");
        }
    }
}
