//! Pluggable time and identity sources for audit stamps.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Source of the identity recorded in `created_by` / `last_modified_by`.
pub trait AuditorAware: Send + Sync + std::fmt::Debug {
    /// The current auditor, if any.
    fn current_auditor(&self) -> Option<String>;
}

/// Auditor that returns a fresh random UUID on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomAuditor;

impl AuditorAware for RandomAuditor {
    fn current_auditor(&self) -> Option<String> {
        Some(uuid::Uuid::new_v4().to_string())
    }
}

/// Auditor that always returns the same name.
#[derive(Debug, Clone)]
pub struct FixedAuditor(pub String);

impl AuditorAware for FixedAuditor {
    fn current_auditor(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
