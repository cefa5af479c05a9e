//! `Server` builder and the tick-driven server loop.
//!
//! Ties the layers together: the accept loop feeds the [`Hub`], and once per
//! tick the loop drains the hub into the [`Dispatcher`], runs queued admin
//! commands, then sleeps until the next tick.

use std::net::SocketAddr;
use std::time::Duration;

use areserver_protocol::{BinaryCodec, Codec};
use areserver_tick::{TickConfig, TickScheduler};
use areserver_transport::{accept_loop, Hub, WebSocketTransport};
use areserver_world::{MapConfig, WorldMap, WorldState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::admin::{read_stdin_commands, AdminCommand, AdminHandle, COMMANDS};
use crate::{Dispatcher, ServerConfig, ServerError};

/// Builder for configuring and starting a server.
///
/// ```rust,ignore
/// let server = Server::builder()
///     .bind("0.0.0.0:12345")
///     .max_connections(32)
///     .build()
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// A builder with [`ServerConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Address to listen on, e.g. `"0.0.0.0:12345"`. Port `0` picks a
    /// free one; read it back with [`Server::local_addr`].
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Connections beyond this many are closed without an event.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// How long a peer may send no frame at all before it counts as dead.
    /// Keepalive pings go out every half timeout. `None` disables both.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Map dimensions, used for the initial map and every `regen`.
    pub fn map(mut self, map: MapConfig) -> Self {
        self.config.map = map;
        self
    }

    pub fn tick(mut self, tick: TickConfig) -> Self {
        self.config.tick = tick;
        self
    }

    /// Whether to read admin commands from stdin.
    pub fn admin_console(mut self, enabled: bool) -> Self {
        self.config.admin_console = enabled;
        self
    }

    /// Builds the map, binds the listener and starts accepting, using the
    /// binary codec.
    pub async fn build(self) -> Result<Server<BinaryCodec>, ServerError> {
        self.build_with_codec(BinaryCodec).await
    }

    /// Like [`build`](Self::build), with a caller-chosen codec.
    pub async fn build_with_codec<C: Codec>(self, codec: C) -> Result<Server<C>, ServerError> {
        let config = self.config;
        let map = WorldMap::default_layout(config.map)?;

        let transport = WebSocketTransport::bind(&config.bind_addr).await?;
        let local_addr = transport
            .local_addr()
            .map_err(areserver_transport::TransportError::AcceptFailed)?;

        let hub = Hub::new(config.max_connections);
        let accept_task = tokio::spawn(accept_loop(transport, hub.sender(), config.idle_timeout));

        let (admin_tx, admin_rx) = mpsc::unbounded_channel();
        let admin = AdminHandle::new(admin_tx);
        if config.admin_console {
            tokio::spawn(read_stdin_commands(admin.clone()));
        }

        tracing::info!(
            %local_addr,
            max_connections = config.max_connections,
            tick_rate_hz = config.tick.tick_rate_hz,
            "server ready"
        );

        Ok(Server {
            hub,
            dispatcher: Dispatcher::new(WorldState::new(map), codec),
            scheduler: TickScheduler::new(config.tick),
            admin,
            admin_rx,
            accept_task,
            local_addr,
            map_config: config.map,
        })
    }
}

/// Whether the loop keeps going after an admin command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// A bound server, ready to [`run`](Self::run).
pub struct Server<C: Codec = BinaryCodec> {
    hub: Hub,
    dispatcher: Dispatcher<C>,
    scheduler: TickScheduler,
    admin: AdminHandle,
    admin_rx: mpsc::UnboundedReceiver<AdminCommand>,
    accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
    map_config: MapConfig,
}

impl Server<BinaryCodec> {
    /// Starts configuring a server that speaks the binary protocol.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }
}

impl<C: Codec> Server<C> {
    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle for queueing admin commands from outside the loop.
    pub fn admin_handle(&self) -> AdminHandle {
        self.admin.clone()
    }

    pub fn dispatcher(&self) -> &Dispatcher<C> {
        &self.dispatcher
    }

    /// Runs the tick loop until a `quit` command arrives.
    pub async fn run(mut self) -> Result<(), ServerError> {
        tracing::info!("server loop running");
        loop {
            self.scheduler.wait_for_tick().await;
            let mut handled = 0;

            while let Some(event) = self.hub.try_next_event() {
                self.dispatcher.handle_event(event, &self.hub);
                handled += 1;
            }

            while let Ok(command) = self.admin_rx.try_recv() {
                handled += 1;
                if self.execute(command) == Flow::Quit {
                    self.scheduler.record_tick_end(handled);
                    self.accept_task.abort();
                    tracing::info!(
                        ticks = self.scheduler.tick_count(),
                        events = self.scheduler.metrics().total_events,
                        "server loop stopped"
                    );
                    return Ok(());
                }
            }

            self.scheduler.record_tick_end(handled);
        }
    }

    fn execute(&mut self, command: AdminCommand) -> Flow {
        tracing::debug!(?command, "admin command");
        match command {
            AdminCommand::Help => {
                for entry in COMMANDS {
                    tracing::info!(command = entry.name, "{}", entry.help);
                }
            }
            AdminCommand::Players => {
                let world = self.dispatcher.world();
                tracing::info!(count = world.player_count(), "active players");
                for player in world.players() {
                    let actor = player.actor();
                    tracing::info!(
                        uid = %player.uid(),
                        name = %actor.name,
                        life = actor.life,
                        x = actor.x,
                        y = actor.y,
                        z = actor.z,
                        "player"
                    );
                }
            }
            AdminCommand::Regen => {
                let result = WorldMap::default_layout(self.map_config)
                    .map_err(ServerError::from)
                    .and_then(|map| self.dispatcher.regenerate_map(map, &self.hub));
                if let Err(e) = result {
                    tracing::error!(error = %e, "map regeneration failed");
                }
            }
            AdminCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }
}
