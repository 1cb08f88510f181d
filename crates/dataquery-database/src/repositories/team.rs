//! Team repository.

use dataquery_core::config::QueryConfig;
use dataquery_core::result::AppResult;
use dataquery_entity::Team;
use dataquery_query::{Params, Repository, Session};

/// Queries over [`Team`]. Saves are audited.
#[derive(Debug, Clone)]
pub struct TeamRepository {
    repository: Repository<Team>,
}

impl TeamRepository {
    /// Register and validate every team query.
    pub fn new(config: &QueryConfig) -> AppResult<Self> {
        let repository = Repository::<Team>::builder(config)
            .derived("findByName")
            .build()?;
        Ok(Self { repository })
    }

    /// The underlying repository.
    pub fn repository(&self) -> &Repository<Team> {
        &self.repository
    }

    pub async fn find_by_name(&self, session: &mut Session, name: &str) -> AppResult<Option<Team>> {
        self.repository
            .find_one(session, "findByName", &Params::new().with("name", name))
            .await
    }
}
