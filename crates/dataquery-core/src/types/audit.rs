//! Audit fields stamped on save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation and modification stamps carried by audited entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    /// When the entity was first saved.
    pub created_date: Option<DateTime<Utc>>,
    /// When the entity was last saved.
    pub last_modified_date: Option<DateTime<Utc>>,
    /// Who first saved the entity.
    pub created_by: Option<String>,
    /// Who last saved the entity.
    pub last_modified_by: Option<String>,
}

impl AuditFields {
    /// Stamp both pairs, as on insert.
    pub fn mark_created(&mut self, now: DateTime<Utc>, by: Option<String>) {
        self.created_date = Some(now);
        self.created_by = by.clone();
        self.mark_modified(now, by);
    }

    /// Stamp the last-modified pair, as on update.
    pub fn mark_modified(&mut self, now: DateTime<Utc>, by: Option<String>) {
        self.last_modified_date = Some(now);
        self.last_modified_by = by;
    }
}
