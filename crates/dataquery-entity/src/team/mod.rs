//! Team domain entities.

pub mod model;

pub use model::{TEAM_SCHEMA, Team};
