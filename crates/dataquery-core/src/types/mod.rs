//! Core type definitions used across the DataQuery workspace.

pub mod audit;
pub mod pagination;
pub mod predicate;
pub mod row;
pub mod schema;
pub mod sorting;
pub mod statement;
pub mod value;

pub use audit::AuditFields;
pub use pagination::{PageRequest, PageResult, QueryMode};
pub use predicate::{ComparisonOp, Connector, FieldPredicate, Operand, PredicateGroup};
pub use row::Row;
pub use schema::{EntitySchema, FieldDef, FieldType, RelationDef, ResolvedPath};
pub use sorting::{Sort, SortDirection, SortField};
pub use statement::{
    Assignment, Bind, Condition, Dialect, Filter, FilterPlan, InsertPlan, LockMode, OrderTerm,
    Plan, SelectPlan, Statement, Subquery, UpdatePlan,
};
pub use value::{FromValue, Value};
