//! Core traits defined in `dataquery-core` and implemented by other crates.

pub mod auditing;
pub mod entity;
pub mod store;

pub use auditing::{AuditorAware, Clock, FixedAuditor, FixedClock, RandomAuditor, SystemClock};
pub use entity::{Entity, FromRow, Selection};
pub use store::{Store, StoreConnection};
