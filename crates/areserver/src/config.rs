//! Server configuration.

use std::time::Duration;

use areserver_tick::TickConfig;
use areserver_world::MapConfig;

/// Everything the server needs to start.
///
/// Defaults match the stock deployment: port 12345 on every interface, 32
/// players, a 20×20×3 map and a 125 Hz drain loop.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Connections beyond this many are refused at accept time.
    pub max_connections: usize,

    /// Close a connection whose peer sends no frame at all (not even a
    /// pong to the keepalive ping) for this long. `None` disables the
    /// keepalive and keeps dead connections open forever.
    pub idle_timeout: Option<Duration>,

    /// Map dimensions. Regeneration keeps them.
    pub map: MapConfig,

    /// Drain loop rate and overrun handling.
    pub tick: TickConfig,

    /// Read admin commands from stdin.
    pub admin_console: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:12345".to_string(),
            max_connections: 32,
            idle_timeout: Some(Duration::from_secs(30)),
            map: MapConfig::default(),
            tick: TickConfig::default(),
            admin_console: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:12345");
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.map, MapConfig::default());
        assert_eq!(config.tick.tick_rate_hz, 125);
        assert!(!config.admin_console);
    }
}
