//! Compiled statements handed to a [`Store`](crate::traits::store::Store).
//!
//! A statement carries the rendered SQL with its positional binds and a
//! structured [`Plan`] describing the same operation. SQL stores execute
//! the text; stores without a SQL engine evaluate the plan.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::predicate::{ComparisonOp, Connector};
use crate::types::schema::FieldType;
use crate::types::sorting::SortDirection;
use crate::types::value::Value;

/// SQL flavour used when rendering placeholders, paging and locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL: `$n`, `LIMIT/OFFSET`, `FOR UPDATE` / `FOR SHARE`.
    #[default]
    Postgres,
    /// SQL:2008: `?`, `OFFSET n ROWS FETCH NEXT m ROWS ONLY`.
    Ansi,
}

impl Dialect {
    /// Placeholder for the 1-based bind position.
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Self::Postgres => format!("${position}"),
            Self::Ansi => "?".to_string(),
        }
    }

    /// Paging clause with a leading space, or an empty string.
    pub fn paging_clause(&self, limit: Option<u64>, offset: u64) -> String {
        match (self, limit) {
            (Self::Postgres, Some(limit)) if offset > 0 => format!(" LIMIT {limit} OFFSET {offset}"),
            (Self::Postgres, Some(limit)) => format!(" LIMIT {limit}"),
            (Self::Postgres, None) if offset > 0 => format!(" OFFSET {offset}"),
            (Self::Ansi, Some(limit)) => {
                format!(" OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY")
            }
            (Self::Ansi, None) if offset > 0 => format!(" OFFSET {offset} ROWS"),
            _ => String::new(),
        }
    }

    /// Row locking clause with a leading space, or an empty string.
    pub fn lock_clause(&self, lock: LockMode) -> &'static str {
        match lock {
            LockMode::None => "",
            LockMode::PessimisticRead => " FOR SHARE",
            LockMode::PessimisticWrite => " FOR UPDATE",
        }
    }
}

/// Row locking requested for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// No locking clause.
    #[default]
    None,
    /// Shared row lock.
    PessimisticRead,
    /// Exclusive row lock.
    PessimisticWrite,
}

impl LockMode {
    /// Whether any lock is requested.
    pub fn is_locking(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// A positional bind value with the type of the column it is compared to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bind {
    /// The value.
    pub value: Value,
    /// Declared type of the target column, used to type `NULL` binds.
    pub hint: Option<FieldType>,
}

/// Sub-select used to filter on a field of a related table:
/// `fk IN (SELECT key_column FROM table WHERE column op value)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subquery {
    /// Related table.
    pub table: String,
    /// Identity column of the related table.
    pub key_column: String,
    /// Column of the related table the condition applies to.
    pub column: String,
}

/// A resolved condition on a physical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    /// Column on the queried table (the foreign key when `via` is set).
    pub column: String,
    /// Operator.
    pub op: ComparisonOp,
    /// Operand; `None` for null checks.
    pub value: Option<Value>,
    /// Declared type of the compared column.
    pub hint: Option<FieldType>,
    /// Set when the condition applies to a related table.
    pub via: Option<Subquery>,
}

/// Conditions joined by connectors. `AND` binds tighter than `OR`.
pub type Filter = Vec<(Connector, Condition)>;

/// An ordering term on a physical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTerm {
    /// Column.
    pub column: String,
    /// Direction.
    pub direction: SortDirection,
}

/// Structured form of a `SELECT`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectPlan {
    /// Table.
    pub table: String,
    /// Selected columns in order.
    pub columns: Vec<String>,
    /// `SELECT DISTINCT`.
    pub distinct: bool,
    /// `WHERE` conditions.
    pub filter: Filter,
    /// `ORDER BY` terms.
    pub order: Vec<OrderTerm>,
    /// Row limit.
    pub limit: Option<u64>,
    /// Rows skipped.
    pub offset: u64,
    /// Row locking.
    pub lock: LockMode,
}

/// Structured form of a `SELECT COUNT(*)` or a `DELETE`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterPlan {
    /// Table.
    pub table: String,
    /// `WHERE` conditions.
    pub filter: Filter,
}

/// Structured form of an `INSERT`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertPlan {
    /// Table.
    pub table: String,
    /// Column values; a generated identity column is omitted.
    pub values: Vec<(String, Value)>,
    /// Generated identity column returned by the store.
    pub returning: Option<String>,
}

/// Right-hand side of an `UPDATE ... SET`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignment {
    /// `column = value`.
    Set(Value),
    /// `column = column + value`.
    Increment(Value),
}

/// Structured form of an `UPDATE`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatePlan {
    /// Table.
    pub table: String,
    /// Assignments in order.
    pub assignments: Vec<(String, Assignment)>,
    /// `WHERE` conditions.
    pub filter: Filter,
}

/// What a statement does, independent of its SQL rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Plan {
    /// Row-returning query.
    Select(SelectPlan),
    /// Row count.
    Count(FilterPlan),
    /// Single-row insert.
    Insert(InsertPlan),
    /// Bulk or single-row update.
    Update(UpdatePlan),
    /// Bulk or single-row delete.
    Delete(FilterPlan),
    /// Hand-written SQL that only a SQL engine can run.
    Native,
}

/// A compiled statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    /// Rendered SQL.
    pub sql: String,
    /// Positional binds in placeholder order.
    pub binds: Vec<Bind>,
    /// Structured form.
    pub plan: Plan,
    /// Name of the descriptor the statement was compiled from.
    pub source: Option<String>,
}

impl Statement {
    /// Tag the statement with the descriptor it came from.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Bind values in order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.binds.iter().map(|b| &b.value)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.binds.is_empty() {
            write!(f, " [")?;
            for (i, bind) in self.binds.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", bind.value)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
