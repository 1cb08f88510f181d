//! # dataquery-database
//!
//! Store implementations behind the `Store` trait: PostgreSQL through a
//! sqlx pool and an in-memory plan evaluator for tests and demos. Also
//! holds the migrations runner and the repository definitions of the
//! sample domain.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod postgres;
pub mod repositories;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use postgres::PgStore;
