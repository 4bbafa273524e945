use anyhow::Result;
use bytes::Bytes;
use clap::Parser;
use std::time::Duration;
use telecommand_shared::codec::{self, FrameDecoder};
use telecommand_shared::{limits, Port, TELECOMMAND_PORT};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How long to keep listening for downlinked packets
const LISTEN_WINDOW: Duration = Duration::from_secs(2);

/// Uplink one telecommand script and print what the spacecraft downlinks
#[derive(Parser, Debug)]
#[command(name = "ground-station")]
struct Args {
    #[arg(
        long,
        short,
        env = "OBC_UPLINK_ADDR",
        default_value = "127.0.0.1:7100",
        help = "Uplink address of the spacecraft"
    )]
    addr: String,

    #[arg(help = "Script to uplink, e.g. 'INVOKE(\"echo\",\"hi\");'")]
    script: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    if args.script.len() > limits::SCRIPT_MAX_LENGTH {
        warn!(
            "Script is {} bytes; the spacecraft only reads the first {}",
            args.script.len(),
            limits::SCRIPT_MAX_LENGTH
        );
    }

    let mut stream = TcpStream::connect(&args.addr).await?;
    info!("Connected to {}", args.addr);

    let frame = codec::encode_frame(TELECOMMAND_PORT, args.script.as_bytes())?;
    stream.write_all(&frame).await?;
    println!("Uplinked: {}", args.script);

    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; 4096];

    loop {
        let n = match timeout(LISTEN_WINDOW, stream.read(&mut buf)).await {
            Ok(read) => read?,
            Err(_) => {
                debug!("Nothing more downlinked");
                break;
            }
        };
        if n == 0 {
            info!("Spacecraft closed the connection");
            break;
        }

        decoder.extend(&buf[..n]);
        while let Some((port, payload)) = decoder.decode_next()? {
            print_packet(port, &payload);
        }
    }

    Ok(())
}

fn print_packet(port: Port, payload: &Bytes) {
    println!("[{}] {}", port, String::from_utf8_lossy(payload));
}
