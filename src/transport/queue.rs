//! In-memory ground link backed by bounded packet queues

use crate::transport::traits::GroundLink;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use telecommand_shared::{limits, Port, TELECOMMAND_PORT};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout as with_timeout;
use tracing::debug;

/// Packet travelling over the link
pub type Packet = (Port, Bytes);

/// Ground link whose uplink is fed by [`QueueGroundLink::insert`]
///
/// Only telecommand traffic is queued. Downlinked packets go to a channel
/// that one consumer takes with [`QueueGroundLink::take_downlink`].
pub struct QueueGroundLink {
    uplink_tx: mpsc::Sender<Bytes>,
    uplink_rx: Mutex<mpsc::Receiver<Bytes>>,
    downlink_tx: mpsc::Sender<Packet>,
    downlink_rx: Mutex<Option<mpsc::Receiver<Packet>>>,
    in_range: AtomicBool,
}

impl QueueGroundLink {
    /// Create a link that is out of range until told otherwise
    pub fn new() -> Self {
        Self::with_depth(limits::UPLINK_QUEUE_DEPTH)
    }

    pub fn with_depth(depth: usize) -> Self {
        let (uplink_tx, uplink_rx) = mpsc::channel(depth);
        let (downlink_tx, downlink_rx) = mpsc::channel(depth);

        Self {
            uplink_tx,
            uplink_rx: Mutex::new(uplink_rx),
            downlink_tx,
            downlink_rx: Mutex::new(Some(downlink_rx)),
            in_range: AtomicBool::new(false),
        }
    }

    /// Queue an uplinked script
    ///
    /// Returns false when the queue is full; the packet is discarded.
    pub fn insert(&self, data: &[u8]) -> bool {
        match self.uplink_tx.try_send(Bytes::copy_from_slice(data)) {
            Ok(()) => true,
            Err(e) => {
                debug!("Uplink queue rejected packet: {}", e);
                false
            }
        }
    }

    /// Take the receiving end of the downlink (only once)
    pub async fn take_downlink(&self) -> Option<mpsc::Receiver<Packet>> {
        self.downlink_rx.lock().await.take()
    }

    pub fn set_in_range(&self, in_range: bool) {
        self.in_range.store(in_range, Ordering::SeqCst);
    }
}

impl Default for QueueGroundLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GroundLink for QueueGroundLink {
    fn is_in_range(&self) -> bool {
        self.in_range.load(Ordering::SeqCst)
    }

    async fn read(&self, buf: &mut [u8], port: Port, timeout: Option<Duration>) -> usize {
        if port != TELECOMMAND_PORT {
            return 0;
        }

        let mut rx = self.uplink_rx.lock().await;
        let packet = match timeout {
            Some(t) => match with_timeout(t, rx.recv()).await {
                Ok(packet) => packet,
                Err(_) => return 0,
            },
            None => rx.recv().await,
        };

        let Some(packet) = packet else {
            return 0;
        };

        let copy_size = packet.len().min(buf.len());
        buf[..copy_size].copy_from_slice(&packet[..copy_size]);
        copy_size
    }

    async fn write(&self, buf: &[u8], port: Port, timeout: Option<Duration>) -> usize {
        if !self.is_in_range() || self.downlink_tx.is_closed() {
            return 0;
        }

        // Nobody has taken the downlink yet
        if self.downlink_rx.lock().await.is_some() {
            return 0;
        }

        let packet = (port, Bytes::copy_from_slice(buf));
        let sent = match timeout {
            Some(t) => matches!(with_timeout(t, self.downlink_tx.send(packet)).await, Ok(Ok(()))),
            None => self.downlink_tx.send(packet).await.is_ok(),
        };

        if sent {
            buf.len()
        } else {
            0
        }
    }
}
