//! PostgreSQL store backed by a sqlx pool.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgConnection, PgPool, Postgres, Transaction, TypeInfo};

use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::traits::{Store, StoreConnection};
use dataquery_core::types::{Bind, Dialect, FieldType, Row, Statement, Value};

/// Runs compiled statements on a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn connect(&self) -> AppResult<Box<dyn StoreConnection>> {
        let connection = self.pool.acquire().await?;
        Ok(Box::new(PgStoreConnection::Pooled(connection)))
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreConnection>> {
        let transaction = self.pool.begin().await?;
        Ok(Box::new(PgStoreConnection::Transaction(Some(transaction))))
    }
}

/// A pooled connection or an open transaction. A transaction dropped
/// without commit is rolled back by sqlx.
pub enum PgStoreConnection {
    /// Autocommit connection.
    Pooled(PoolConnection<Postgres>),
    /// Transaction; `None` once committed or rolled back.
    Transaction(Option<Transaction<'static, Postgres>>),
}

impl PgStoreConnection {
    fn connection(&mut self) -> AppResult<&mut PgConnection> {
        match self {
            Self::Pooled(connection) => Ok(&mut **connection),
            Self::Transaction(Some(transaction)) => Ok(&mut **transaction),
            Self::Transaction(None) => Err(AppError::no_active_transaction(
                "transaction already finished",
            )),
        }
    }

    fn take_transaction(&mut self) -> AppResult<Transaction<'static, Postgres>> {
        match self {
            Self::Transaction(transaction) => transaction
                .take()
                .ok_or_else(|| AppError::no_active_transaction("transaction already finished")),
            Self::Pooled(_) => Err(AppError::no_active_transaction(
                "connection is not in a transaction",
            )),
        }
    }
}

#[async_trait]
impl StoreConnection for PgStoreConnection {
    fn in_transaction(&self) -> bool {
        matches!(self, Self::Transaction(Some(_)))
    }

    async fn execute(&mut self, statement: &Statement) -> AppResult<Vec<Row>> {
        let rows = build_query(statement)?
            .fetch_all(self.connection()?)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute_count(&mut self, statement: &Statement) -> AppResult<i64> {
        let row = build_query(statement)?
            .fetch_one(self.connection()?)
            .await?;
        match decode_row(&row)?.values().first() {
            Some(Value::Int(count)) => Ok(*count),
            Some(other) => Err(AppError::mapping(format!(
                "count statement returned a {} value",
                other.kind()
            ))),
            None => Err(AppError::mapping("count statement returned no columns")),
        }
    }

    async fn execute_bulk(&mut self, statement: &Statement) -> AppResult<u64> {
        let result = build_query(statement)?
            .execute(self.connection()?)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> AppResult<()> {
        self.take_transaction()?.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        self.take_transaction()?.rollback().await?;
        Ok(())
    }
}

fn build_query(statement: &Statement) -> AppResult<Query<'_, Postgres, PgArguments>> {
    let mut query = sqlx::query(&statement.sql);
    for bind in &statement.binds {
        query = bind_value(query, bind)?;
    }
    Ok(query)
}

/// Bind one value. Nulls are typed from the field hint so PostgreSQL can
/// infer the parameter type.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    bind: &Bind,
) -> AppResult<Query<'q, Postgres, PgArguments>> {
    Ok(match (&bind.value, bind.hint) {
        (Value::Null, Some(FieldType::Float)) => query.bind(None::<f64>),
        (Value::Null, Some(FieldType::Text)) => query.bind(None::<String>),
        (Value::Null, Some(FieldType::Bool)) => query.bind(None::<bool>),
        (Value::Null, Some(FieldType::Timestamp)) => query.bind(None::<DateTime<Utc>>),
        (Value::Null, _) => query.bind(None::<i64>),
        (Value::Bool(b), _) => query.bind(*b),
        (Value::Int(i), Some(FieldType::Float)) => query.bind(*i as f64),
        (Value::Int(i), _) => query.bind(*i),
        (Value::Float(x), _) => query.bind(*x),
        (Value::Text(s), _) => query.bind(s.clone()),
        (Value::Timestamp(t), _) => query.bind(*t),
        (Value::List(_), _) => {
            return Err(AppError::internal("list values must be expanded before binding"));
        }
    })
}

fn get<'r, T>(row: &'r PgRow, index: usize) -> AppResult<Option<T>>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    Ok(sqlx::Row::try_get::<Option<T>, _>(row, index)?)
}

/// Decode a row generically from the column types PostgreSQL reports.
fn decode_row(row: &PgRow) -> AppResult<Row> {
    let mut out = Row::new();
    for column in sqlx::Row::columns(row) {
        let index = column.ordinal();
        let value = match column.type_info().name() {
            "INT2" => get::<i16>(row, index)?.map(|v| Value::Int(v.into())),
            "INT4" => get::<i32>(row, index)?.map(|v| Value::Int(v.into())),
            "INT8" => get::<i64>(row, index)?.map(Value::Int),
            "FLOAT4" => get::<f32>(row, index)?.map(|v| Value::Float(v.into())),
            "FLOAT8" => get::<f64>(row, index)?.map(Value::Float),
            "BOOL" => get::<bool>(row, index)?.map(Value::Bool),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => get::<String>(row, index)?.map(Value::Text),
            "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, index)?.map(Value::Timestamp),
            "TIMESTAMP" => get::<NaiveDateTime>(row, index)?.map(|t| Value::Timestamp(t.and_utc())),
            "UUID" => get::<uuid::Uuid>(row, index)?.map(|u| Value::Text(u.to_string())),
            other => {
                return Err(AppError::mapping(format!(
                    "column '{}' has unsupported type {other}",
                    column.name()
                )));
            }
        };
        out.push(column.name(), value.unwrap_or(Value::Null));
    }
    Ok(out)
}
