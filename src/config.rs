//! Flight software configuration
//!
//! Every setting can come from the command line or the environment.

use crate::audit::{AuditLog, DEFAULT_AUDIT_LOG_PATH};
use crate::daemon::DaemonConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const UPLINK_ADDR_VAR: &str = "OBC_UPLINK_ADDR";
pub const AUDIT_LOG_VAR: &str = "OBC_AUDIT_LOG";
pub const EXEC_DEADLINE_VAR: &str = "OBC_EXEC_DEADLINE_MS";

const DEFAULT_UPLINK_ADDR: &str = "127.0.0.1:7100";

/// Command line of the flight software
#[derive(Parser, Debug, Clone)]
#[command(name = "obc-telecommand", about = "On-board telecommand script daemon")]
pub struct Args {
    #[arg(
        long,
        env = UPLINK_ADDR_VAR,
        default_value = DEFAULT_UPLINK_ADDR,
        help = "Address ground stations connect to"
    )]
    pub uplink_addr: String,

    #[arg(
        long,
        env = AUDIT_LOG_VAR,
        default_value = DEFAULT_AUDIT_LOG_PATH,
        help = "Command audit log file"
    )]
    pub audit_log: PathBuf,

    #[arg(long, help = "Do not write the command audit log")]
    pub no_audit: bool,

    #[arg(
        long,
        env = EXEC_DEADLINE_VAR,
        value_name = "MS",
        help = "Fail commands that run longer than this many milliseconds"
    )]
    pub exec_deadline_ms: Option<u64>,
}

/// Top-level configuration of the telecommand subsystem
#[derive(Debug, Clone)]
pub struct ObcConfig {
    /// Address the ground station uplink listens on
    pub uplink_addr: String,
    /// Audit log location; `None` disables auditing
    pub audit_log: Option<PathBuf>,
    pub daemon: DaemonConfig,
}

impl Default for ObcConfig {
    fn default() -> Self {
        Self {
            uplink_addr: DEFAULT_UPLINK_ADDR.into(),
            audit_log: Some(PathBuf::from(DEFAULT_AUDIT_LOG_PATH)),
            daemon: DaemonConfig::default(),
        }
    }
}

impl From<Args> for ObcConfig {
    fn from(args: Args) -> Self {
        Self {
            uplink_addr: args.uplink_addr,
            audit_log: (!args.no_audit).then_some(args.audit_log),
            daemon: DaemonConfig {
                execution_deadline: args.exec_deadline_ms.map(Duration::from_millis),
                ..Default::default()
            },
        }
    }
}

impl ObcConfig {
    pub fn audit_log(&self) -> AuditLog {
        match &self.audit_log {
            Some(path) => AuditLog::new(path),
            None => AuditLog::disabled(),
        }
    }
}
