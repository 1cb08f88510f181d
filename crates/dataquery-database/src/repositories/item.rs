//! Item repository.

use dataquery_core::config::QueryConfig;
use dataquery_core::result::AppResult;
use dataquery_entity::Item;
use dataquery_query::Repository;

/// CRUD over [`Item`]. Items carry assigned ids, so `save` decides between
/// insert and update from the creation stamp.
pub fn item_repository(config: &QueryConfig) -> AppResult<Repository<Item>> {
    Repository::<Item>::builder(config).build()
}
