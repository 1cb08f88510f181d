//! # dataquery-query
//!
//! Declarative queries for DataQuery: the method-name grammar, the
//! predicate-to-statement compiler, page/slice windows, and execution
//! against a [`Session`] with result mapping, persistence context, entity
//! graphs and auditing.

pub mod auditing;
pub mod compiler;
pub mod context;
pub mod crud;
pub mod descriptor;
pub mod executor;
pub mod paging;
pub mod params;
pub mod parser;
pub mod repository;
pub mod session;
pub mod specification;
pub mod template;

pub use auditing::AuditingHandler;
pub use descriptor::{
    literal, param, CriteriaQuery, QueryDescriptor, QueryOptions, Subject, TemplateQuery,
};
pub use executor::{Explained, QueryOutput};
pub use params::Params;
pub use repository::{Repository, RepositoryBuilder};
pub use session::Session;
pub use specification::Specification;
