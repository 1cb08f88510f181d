//! Query resolution and paging configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Settings shared by every repository built from this configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueryConfig {
    /// Page size used when a caller does not supply one.
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1))]
    pub default_page_size: u64,
    /// Largest page size a caller may request.
    #[serde(default = "default_max_page_size")]
    #[validate(range(min = 1))]
    pub max_page_size: u64,
    /// Whether externally supplied page numbers start at 1.
    #[serde(default)]
    pub one_indexed_parameters: bool,
    /// Default for clearing the persistence context after bulk statements.
    #[serde(default)]
    pub clear_after_bulk: bool,
    /// Derive the page total from the content when the count is implied.
    #[serde(default)]
    pub skip_count_when_possible: bool,
    /// Whether `save` stamps audit fields.
    #[serde(default = "default_true")]
    pub auditing: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            one_indexed_parameters: false,
            clear_after_bulk: false,
            skip_count_when_possible: false,
            auditing: true,
        }
    }
}

fn default_page_size() -> u64 {
    20
}

fn default_max_page_size() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}
