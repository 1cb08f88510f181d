//! # dataquery-core
//!
//! Core crate for DataQuery. Contains the store and entity traits,
//! configuration schemas, the dynamic value model, entity schema mapping,
//! predicate/paging/sorting types, compiled statements, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other DataQuery crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
