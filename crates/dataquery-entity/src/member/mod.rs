//! Member domain entities and projections.

pub mod dto;
pub mod model;

pub use dto::{MemberDto, UsernameOnly};
pub use model::{MEMBER_SCHEMA, Member};
