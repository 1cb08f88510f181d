//! Audit stamping on save.

use std::sync::Arc;

use dataquery_core::traits::{AuditorAware, Clock, Entity, RandomAuditor, SystemClock};

/// Stamps created/modified dates and auditors on entities that carry
/// [`AuditFields`](dataquery_core::types::AuditFields).
#[derive(Debug, Clone)]
pub struct AuditingHandler {
    clock: Arc<dyn Clock>,
    auditor: Option<Arc<dyn AuditorAware>>,
}

impl Default for AuditingHandler {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Some(Arc::new(RandomAuditor)))
    }
}

impl AuditingHandler {
    /// Handler with an explicit time and identity source.
    pub fn new(clock: Arc<dyn Clock>, auditor: Option<Arc<dyn AuditorAware>>) -> Self {
        Self { clock, auditor }
    }

    /// Stamp an entity about to be inserted (`is_new`) or updated.
    pub fn stamp<E: Entity>(&self, entity: &mut E, is_new: bool) {
        let now = self.clock.now();
        let by = self.auditor.as_ref().and_then(|a| a.current_auditor());
        if let Some(audit) = entity.audit_mut() {
            if is_new {
                audit.mark_created(now, by);
            } else {
                audit.mark_modified(now, by);
            }
        }
    }
}
