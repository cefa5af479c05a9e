//! The connection hub: the adapter between connection tasks and the
//! single-threaded server loop.
//!
//! Every accepted connection runs in its own task. Those tasks never touch
//! server state; they only report what happened on their socket through a
//! [`HubSender`]. The [`Hub`] itself is owned by the server loop, which
//! drains it once per tick with [`Hub::try_next_event`] and answers through
//! the [`Outbox`] primitives.
//!
//! ```text
//! conn task ─┐                       ┌─ send_to(id)
//! conn task ─┼─ PeerSignal ─→ Hub ───┤
//! conn task ─┘   (mpsc)        │     └─ send_to_all_except(id?)
//!                              ▼
//!                       TransportEvent
//! ```
//!
//! Messages sent to one connection are delivered in send order. Nothing is
//! ordered across connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "websocket")]
use std::time::Duration;

use tokio::sync::mpsc;

use crate::ConnectionId;

/// What the hub reports to the server loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection is open and can be sent to.
    Connected(ConnectionId),
    /// A connection delivered one message.
    Data(ConnectionId, Vec<u8>),
    /// A connection is gone. Nothing more will arrive from it, and sends
    /// to it are dropped.
    Disconnected(ConnectionId),
}

/// The outbound half of the transport contract.
///
/// Sends are fire-and-forget: a send to a connection that has already gone
/// away is silently dropped.
pub trait Outbox {
    /// Sends one message to a single connection.
    fn send_to(&self, conn: ConnectionId, data: &[u8]);

    /// Sends one message to every open connection except `exclude`
    /// (or to all of them when `exclude` is `None`).
    fn send_to_all_except(&self, exclude: Option<ConnectionId>, data: &[u8]);
}

/// Identifies one connection task's registration with the [`Hub`].
///
/// Connection ids come from the transport, and a misbehaving transport can
/// report the same id twice. The generation tells the two registrations
/// apart, so signals from a refused or duplicate task never touch the
/// peer that was admitted under that id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerKey {
    id: ConnectionId,
    generation: u64,
}

impl PeerKey {
    /// The connection this key was issued for.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Raw notifications from connection tasks.
#[derive(Debug)]
enum PeerSignal {
    Opened {
        key: PeerKey,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    },
    Received(PeerKey, Vec<u8>),
    Closed(PeerKey),
}

/// Handle that connection tasks use to talk to the [`Hub`].
///
/// Cheap to clone. Every method reports failure once the hub is dropped,
/// which tells the task to shut its connection.
#[derive(Debug, Clone)]
pub struct HubSender {
    tx: mpsc::UnboundedSender<PeerSignal>,
    next_generation: Arc<AtomicU64>,
}

impl HubSender {
    /// Announces a new connection together with the channel the hub should
    /// push its outbound messages into.
    ///
    /// The returned key must be passed to every later call for this
    /// connection. `None` means the hub is gone.
    pub fn opened(
        &self,
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Option<PeerKey> {
        let key = PeerKey {
            id,
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
        };
        self.tx
            .send(PeerSignal::Opened { key, outbound })
            .ok()
            .map(|()| key)
    }

    /// Forwards one inbound message.
    pub fn received(&self, key: PeerKey, data: Vec<u8>) -> bool {
        self.tx.send(PeerSignal::Received(key, data)).is_ok()
    }

    /// Reports that the connection is gone.
    pub fn closed(&self, key: PeerKey) -> bool {
        self.tx.send(PeerSignal::Closed(key)).is_ok()
    }
}

struct Peer {
    generation: u64,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// Collects connection signals and fans outbound messages back out.
pub struct Hub {
    tx: mpsc::UnboundedSender<PeerSignal>,
    rx: mpsc::UnboundedReceiver<PeerSignal>,
    next_generation: Arc<AtomicU64>,
    peers: HashMap<ConnectionId, Peer>,
    max_connections: usize,
}

impl Hub {
    /// Creates a hub that admits at most `max_connections` open
    /// connections at a time.
    pub fn new(max_connections: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            next_generation: Arc::new(AtomicU64::new(0)),
            peers: HashMap::new(),
            max_connections,
        }
    }

    /// Returns a sender for connection tasks.
    pub fn sender(&self) -> HubSender {
        HubSender {
            tx: self.tx.clone(),
            next_generation: Arc::clone(&self.next_generation),
        }
    }

    /// Returns the next pending event without waiting, or `None` when the
    /// queue is drained.
    pub fn try_next_event(&mut self) -> Option<TransportEvent> {
        while let Ok(signal) = self.rx.try_recv() {
            if let Some(event) = self.accept_signal(signal) {
                return Some(event);
            }
        }
        None
    }

    /// Waits for the next event.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        while let Some(signal) = self.rx.recv().await {
            if let Some(event) = self.accept_signal(signal) {
                return Some(event);
            }
        }
        None
    }

    /// Number of connections currently open.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Whether `key` is the registration currently admitted for its id.
    fn is_admitted(&self, key: PeerKey) -> bool {
        self.peers
            .get(&key.id)
            .is_some_and(|peer| peer.generation == key.generation)
    }

    fn accept_signal(&mut self, signal: PeerSignal) -> Option<TransportEvent> {
        match signal {
            PeerSignal::Opened { key, outbound } => {
                let id = key.id;
                if self.peers.contains_key(&id) {
                    // Surface it anyway; the server decides what a
                    // repeated connect means. The duplicate's channel is
                    // dropped and the admitted peer keeps the id.
                    tracing::warn!(%id, "connection opened twice");
                    return Some(TransportEvent::Connected(id));
                }
                if self.peers.len() >= self.max_connections {
                    tracing::warn!(
                        %id,
                        max = self.max_connections,
                        "connection limit reached, refusing"
                    );
                    // Dropping `outbound` makes the task close the socket.
                    return None;
                }
                self.peers.insert(
                    id,
                    Peer {
                        generation: key.generation,
                        outbound,
                    },
                );
                Some(TransportEvent::Connected(id))
            }
            PeerSignal::Received(key, data) => {
                if !self.is_admitted(key) {
                    tracing::trace!(id = %key.id, "data from unadmitted task dropped");
                    return None;
                }
                Some(TransportEvent::Data(key.id, data))
            }
            PeerSignal::Closed(key) => {
                if !self.is_admitted(key) {
                    tracing::trace!(id = %key.id, "close from unadmitted task ignored");
                    return None;
                }
                self.peers.remove(&key.id);
                Some(TransportEvent::Disconnected(key.id))
            }
        }
    }
}

impl Outbox for Hub {
    fn send_to(&self, conn: ConnectionId, data: &[u8]) {
        if let Some(peer) = self.peers.get(&conn) {
            let _ = peer.outbound.send(data.to_vec());
        }
    }

    fn send_to_all_except(&self, exclude: Option<ConnectionId>, data: &[u8]) {
        for (id, peer) in &self.peers {
            if Some(*id) != exclude {
                let _ = peer.outbound.send(data.to_vec());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// WebSocket plumbing
// ---------------------------------------------------------------------------

/// Accepts WebSocket connections forever, spawning one task per connection
/// that reports to `hub`.
///
/// With an `idle_timeout`, each task pings its peer every half timeout and
/// closes the connection once no frame at all (message, ping or pong) has
/// arrived for the full timeout. A quiet client that still answers pings
/// stays connected. `None` disables both.
#[cfg(feature = "websocket")]
pub async fn accept_loop(
    mut transport: crate::WebSocketTransport,
    hub: HubSender,
    idle_timeout: Option<Duration>,
) {
    use crate::Transport;

    loop {
        match transport.accept().await {
            Ok(conn) => {
                tokio::spawn(run_peer(conn, hub.clone(), idle_timeout));
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
    }
}

#[cfg(feature = "websocket")]
async fn run_peer(
    conn: crate::WebSocketConnection,
    hub: HubSender,
    idle_timeout: Option<Duration>,
) {
    use crate::{Connection, Inbound};
    use tokio::time::{Instant, MissedTickBehavior};

    let id = conn.id();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let Some(key) = hub.opened(id, outbound_tx) else {
        let _ = conn.close().await;
        return;
    };
    tracing::debug!(%id, peer = %conn.peer_addr(), "connection task started");

    let mut deadline = idle_timeout.map(|t| Instant::now() + t);
    let mut keepalive = idle_timeout.map(|t| {
        let period = (t / 2).max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(data) => {
                    if let Err(e) = conn.send(&data).await {
                        tracing::debug!(%id, error = %e, "send failed");
                        break;
                    }
                }
                None => {
                    tracing::debug!(%id, "hub released connection");
                    break;
                }
            },
            inbound = conn.recv_frame() => {
                match inbound {
                    Ok(Inbound::Message(data)) => {
                        if !hub.received(key, data) {
                            break;
                        }
                    }
                    Ok(Inbound::Control) => {}
                    Ok(Inbound::Closed) => {
                        tracing::info!(%id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%id, error = %e, "recv error");
                        break;
                    }
                }
                deadline = idle_timeout.map(|t| Instant::now() + t);
            },
            _ = keepalive_tick(&mut keepalive) => {
                if let Err(e) = conn.ping().await {
                    tracing::debug!(%id, error = %e, "keepalive ping failed");
                    break;
                }
            },
            _ = idle(deadline) => {
                tracing::info!(%id, "no frames from peer, closing");
                break;
            }
        }
    }

    hub.closed(key);
    let _ = conn.close().await;
}

#[cfg(feature = "websocket")]
async fn idle(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(feature = "websocket")]
async fn keepalive_tick(keepalive: &mut Option<tokio::time::Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

// =========================================================================
// Tests
// =========================================================================
