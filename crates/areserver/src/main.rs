use std::time::Duration;

use areserver::{Server, ServerConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Authoritative world-state server for a small multiplayer tile world.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long)]
    bind: Option<String>,

    /// Connections beyond this many are refused
    #[arg(short, long)]
    max_connections: Option<usize>,

    /// Seconds without any frame (pongs count) before a connection is closed (0 = never)
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Drain loop rate in Hz (1-128)
    #[arg(short, long)]
    tick_rate: Option<u32>,

    /// Map width in cells
    #[arg(long)]
    width: Option<usize>,

    /// Map height in cells
    #[arg(long)]
    height: Option<usize>,

    /// Map depth (levels)
    #[arg(long)]
    depth: Option<usize>,

    /// Don't read admin commands from stdin
    #[arg(long)]
    no_console: bool,
}

impl Args {
    /// Layers the flags that were given over the defaults.
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig {
            admin_console: !self.no_console,
            ..ServerConfig::default()
        };
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }
        if let Some(secs) = self.idle_timeout {
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(rate) = self.tick_rate {
            config.tick.tick_rate_hz = rate;
        }
        if let Some(width) = self.width {
            config.map.width = width;
        }
        if let Some(height) = self.height {
            config.map.height = height;
        }
        if let Some(depth) = self.depth {
            config.map.depth = depth;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    let server = Server::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr(), "type `help` for admin commands");
    server.run().await?;
    Ok(())
}
