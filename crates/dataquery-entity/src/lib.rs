//! # dataquery-entity
//!
//! Sample domain for DataQuery. Every entity in this crate carries a
//! static [`EntitySchema`](dataquery_core::types::EntitySchema) that maps
//! its logical field names to table columns, and implements
//! [`Entity`](dataquery_core::traits::Entity) for row mapping and writes.
//! Projections implement only `FromRow`.

pub mod item;
pub mod member;
pub mod relation;
pub mod team;

pub use item::Item;
pub use member::{Member, MemberDto, UsernameOnly};
pub use relation::Relation;
pub use team::Team;
