use clap::Parser as _;
use obc_telecommand::command::{handlers, CommandRegistry};
use obc_telecommand::config::{Args, ObcConfig};
use obc_telecommand::daemon::ScriptDaemon;
use obc_telecommand::parser::Parser;
use obc_telecommand::toolkit::Toolkit;
use obc_telecommand::transport::{QueueGroundLink, TcpUplink};
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ObcConfig::from(Args::parse());

    info!("OBC telecommand service starting");
    info!("  Uplink: {}", config.uplink_addr);
    match &config.audit_log {
        Some(path) => info!("  Audit log: {}", path.display()),
        None => info!("  Audit log: disabled"),
    }
    if let Some(deadline) = config.daemon.execution_deadline {
        info!("  Command deadline: {}ms", deadline.as_millis());
    }

    // Ground link fed by TCP ground stations
    let link = Arc::new(QueueGroundLink::new());
    let uplink = TcpUplink::new(config.uplink_addr.clone(), link.clone())
        .start()
        .await?;
    info!("Waiting for ground stations on {}", uplink.local_addr());

    let toolkit = Arc::new(Toolkit::new(link.clone(), config.audit_log()));

    // Registration completes before the daemon starts; the registry is
    // read-only from here on
    let mut registry = CommandRegistry::new();
    handlers::register_builtin_commands(&mut registry, &toolkit, Arc::new(AtomicU32::new(0)));
    let registry = Arc::new(registry);
    info!("Commands: {}", registry.names().join(", "));

    let daemon = ScriptDaemon::new(Parser::new(registry), link, config.daemon.clone());
    let handle = daemon.spawn(CancellationToken::new());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let stats = handle.shutdown().await?;
    uplink.shutdown();

    info!(
        "Processed {} scripts ({} executed, {} dropped)",
        stats.received, stats.executed, stats.dropped
    );
    Ok(())
}
