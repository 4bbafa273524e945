//! TCP stand-in for the radio link
//!
//! A ground station connects and sends framed packets (see
//! `telecommand_shared::codec`). Telecommand frames are queued on a
//! [`QueueGroundLink`]; packets the spacecraft downlinks are framed back to
//! the connected station. One station is served at a time, and the link is in
//! range only while it is connected.

use crate::transport::queue::{Packet, QueueGroundLink};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use telecommand_shared::{codec, codec::FrameDecoder, TELECOMMAND_PORT};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept, so a persistent error cannot spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Listener feeding a queue ground link from TCP connections
pub struct TcpUplink {
    address: String,
    link: Arc<QueueGroundLink>,
}

/// Handle to a running uplink listener
pub struct TcpUplinkHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TcpUplinkHandle {
    /// Address the listener actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting stations and drop the current one
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl TcpUplink {
    pub fn new(address: impl Into<String>, link: Arc<QueueGroundLink>) -> Self {
        Self {
            address: address.into(),
            link,
        }
    }

    /// Bind the listener and start serving ground stations
    pub async fn start(self) -> Result<TcpUplinkHandle> {
        let listener = TcpListener::bind(&self.address).await?;
        let local_addr = listener.local_addr()?;

        let mut downlink = match self.link.take_downlink().await {
            Some(rx) => rx,
            None => anyhow::bail!("Downlink of the ground link is already in use"),
        };

        let link = self.link;
        let task = tokio::spawn(async move {
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Uplink accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };

                info!("Ground station connected: {}", addr);
                link.set_in_range(true);

                if let Err(e) = serve_station(stream, &link, &mut downlink).await {
                    warn!("Ground station {} dropped: {}", addr, e);
                }

                link.set_in_range(false);
                info!("Ground station disconnected: {}", addr);
            }
        });

        Ok(TcpUplinkHandle { local_addr, task })
    }
}

async fn serve_station(
    stream: TcpStream,
    link: &QueueGroundLink,
    downlink: &mut mpsc::Receiver<Packet>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; 1024];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    return Ok(());
                }

                decoder.extend(&buf[..n]);
                while let Some((port, payload)) = decoder.decode_next()? {
                    if port != TELECOMMAND_PORT {
                        debug!("Ignoring {} byte packet for {}", payload.len(), port);
                        continue;
                    }
                    if !link.insert(&payload) {
                        warn!("Uplink queue full, script dropped");
                    }
                }
            }
            Some((port, payload)) = downlink.recv() => {
                let frame = codec::encode_frame(port, &payload)?;
                writer.write_all(&frame).await?;
            }
        }
    }
}
