//! Item domain entities.

pub mod model;

pub use model::{ITEM_SCHEMA, Item};
