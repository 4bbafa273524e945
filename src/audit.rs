//! Append-only command audit log
//!
//! Each record is appended by opening the file in append mode, writing one
//! encoded [`AuditRecord`] and closing the file again. There is no batching:
//! a reset between two commands loses nothing already logged.

use crate::command::CommandType;
use anyhow::Result;
use std::path::{Path, PathBuf};
use telecommand_shared::codec::AuditRecord;
use telecommand_shared::{now_secs, CommandStatus};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{trace, warn};

/// Well-known location of the audit log on the flight computer
pub const DEFAULT_AUDIT_LOG_PATH: &str = "/boot/tc_log.bin";

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that records nothing
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one record to the log file
    pub async fn append(&self, record: &AuditRecord) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(&record.encode()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Record a status of a command type, stamped with the current time
    ///
    /// Failures are logged and dropped; a command cannot correct them.
    pub async fn record(&self, kind: CommandType, status: CommandStatus) {
        let record = AuditRecord {
            kind: kind.0,
            timestamp: now_secs(),
            status,
        };

        match self.append(&record).await {
            Ok(()) => trace!("Audit: type={} status={}", kind, status),
            Err(e) => warn!("Failed to write audit record for type {}: {}", kind, e),
        }
    }

    /// Read back every record in the log
    pub async fn read_all(&self) -> Result<Vec<AuditRecord>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };

        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(AuditRecord::decode_all(&data)?)
    }
}
