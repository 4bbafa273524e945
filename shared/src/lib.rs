//! OBC Telecommand Shared Types
//!
//! This crate provides the constants, command status state machine and codecs
//! shared between the on-board script daemon and the ground station uplink tool.

pub mod codec;
pub mod state_machine;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use state_machine::{CommandStatus, Failure};

/// Get current timestamp in seconds since Unix epoch
///
/// Saturates at `u32::MAX`, which is the width of the audit record field.
pub fn now_secs() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    u32::try_from(secs).unwrap_or(u32::MAX)
}

/// Sizing limits for the telecommand subsystem
pub mod limits {
    /// Capacity of the daemon's receive buffer in bytes
    pub const SCRIPT_MAX_LENGTH: usize = 100;

    /// Maximum stored length of a command argument
    pub const MAX_ARGUMENT_LENGTH: usize = 30;

    /// Maximum length of a registry key; longer names are truncated
    pub const REGISTRY_KEY_LENGTH: usize = 20;

    /// Delay between two scripts in the daemon loop
    pub const DAEMON_SLEEP_MS: u64 = 100;

    /// Packets buffered by the in-memory ground link
    pub const UPLINK_QUEUE_DEPTH: usize = 20;

    /// Largest payload a single link frame may carry
    pub const MAX_FRAME_PAYLOAD: usize = 4096;
}

/// A logical port on the ground link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port(pub u8);

/// File transfer traffic
pub const FTP_PORT: Port = Port(0);

/// Uplinked scripts
pub const TELECOMMAND_PORT: Port = Port(1);

/// Downlinked command responses
pub const TELEMETRY_PORT: Port = Port(2);

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FTP_PORT => write!(f, "ftp"),
            TELECOMMAND_PORT => write!(f, "telecommand"),
            TELEMETRY_PORT => write!(f, "telemetry"),
            Port(n) => write!(f, "port{}", n),
        }
    }
}
