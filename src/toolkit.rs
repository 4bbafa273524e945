//! Collaborators handed to every command

use crate::audit::AuditLog;
use crate::transport::GroundLink;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Dependency bundle shared by all commands
///
/// Commands hold it through an `Arc` and never own it.
pub struct Toolkit {
    ground_link: Arc<dyn GroundLink>,
    audit_log: AuditLog,
    started_at: Instant,
}

impl Toolkit {
    pub fn new(ground_link: Arc<dyn GroundLink>, audit_log: AuditLog) -> Self {
        Self {
            ground_link,
            audit_log,
            started_at: Instant::now(),
        }
    }

    pub fn ground_link(&self) -> &dyn GroundLink {
        self.ground_link.as_ref()
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
