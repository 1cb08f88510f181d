//! Repositories for the sample domain.

pub mod item;
pub mod member;
pub mod team;

pub use item::item_repository;
pub use member::{MemberRepository, spec as member_spec};
pub use team::TeamRepository;

use dataquery_core::config::QueryConfig;
use dataquery_core::result::AppResult;
use dataquery_entity::Item;
use dataquery_query::Repository;
use tracing::info;

/// Every repository, built once from configuration.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub members: MemberRepository,
    pub teams: TeamRepository,
    pub items: Repository<Item>,
}

impl Repositories {
    /// Build and validate all repositories. A malformed descriptor fails
    /// here, before any statement runs.
    pub fn build(config: &QueryConfig) -> AppResult<Self> {
        let repositories = Self {
            members: MemberRepository::new(config)?,
            teams: TeamRepository::new(config)?,
            items: item_repository(config)?,
        };
        info!("All repositories validated");
        Ok(repositories)
    }
}
