//! Ground link abstraction for pluggable radio backends

use async_trait::async_trait;
use std::time::Duration;
use telecommand_shared::Port;

/// The channel through which scripts arrive from the ground station
///
/// A `timeout` of `None` blocks until data is available. Both directions
/// report the number of bytes moved; 0 means nothing was transferred.
#[async_trait]
pub trait GroundLink: Send + Sync {
    /// Whether a ground station is currently reachable
    fn is_in_range(&self) -> bool;

    /// Receive one packet for `port` into `buf`, truncated to its length
    async fn read(&self, buf: &mut [u8], port: Port, timeout: Option<Duration>) -> usize;

    /// Send one packet to the ground station on `port`
    async fn write(&self, buf: &[u8], port: Port, timeout: Option<Duration>) -> usize;
}
