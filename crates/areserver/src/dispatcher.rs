//! The protocol dispatcher: reacts to transport events by mutating the
//! world and telling the transport what to send to whom.
//!
//! Per connection the lifecycle is `Connecting → Active → Disconnected`:
//!
//! 1. **Connect**: everyone else hears `JOIN(uid)`; the newcomer alone gets
//!    one batch `MULTI_ON`, snapshot, `MULTI_OFF`; only then is the player
//!    registered and inserted. The snapshot is taken before the insert, so
//!    the newcomer never receives its own introduction.
//! 2. **Data**: each request is applied under the sender's uid and echoed
//!    to every active connection, sender included.
//! 3. **Disconnect**: the others hear `PART(uid)`; the player is then
//!    unregistered and removed together.
//!
//! Everything runs on the tick loop, one event at a time.
//!
//! # Failure policy
//!
//! Nothing a client sends can stop the loop. A malformed record is dropped
//! at `debug` and the rest of its message still applies. A repeated
//! connect is refused before anything is sent, so the duplicate produces
//! no traffic. An unknown connection or player means the registry and the
//! world disagree; that operation is abandoned and logged at `error`, and
//! the server keeps serving everyone else.

use areserver_protocol::{BinaryCodec, ClientRecord, Codec, PlayerId, Record};
use areserver_session::{ConnectionRegistry, SessionError};
use areserver_transport::{ConnectionId, Outbox, TransportEvent};
use areserver_world::{Player, WorldMap, WorldState};

use crate::ServerError;

/// Owns the world and the registry, and keeps them in step.
///
/// A connection is registered exactly when its player is in the world.
/// Every method that changes one changes the other in the same call, and
/// rolls back if the second half fails.
pub struct Dispatcher<C: Codec = BinaryCodec> {
    world: WorldState,
    registry: ConnectionRegistry,
    codec: C,
}

impl<C: Codec> Dispatcher<C> {
    /// Takes ownership of `world`, starting with no connections.
    ///
    /// Players already in `world` have no connection and are only ever
    /// introduced to newcomers, so callers normally pass an empty one.
    pub fn new(world: WorldState, codec: C) -> Self {
        Self {
            world,
            registry: ConnectionRegistry::new(),
            codec,
        }
    }

    /// Read access to the world, e.g. for the admin `players` listing.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Read access to the connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// The active player with this uid.
    ///
    /// # Errors
    /// [`SessionError::UnknownPlayer`] if no registered connection owns it.
    pub fn lookup_by_uid(&self, uid: PlayerId) -> Result<&Player, ServerError> {
        self.registry.lookup_by_uid(uid)?;
        Ok(self.world.player(uid)?)
    }

    // -----------------------------------------------------------------------
    // Event entry point
    // -----------------------------------------------------------------------

    /// Handles one transport event. Failures are logged here and never
    /// escape: one bad connection must not stop the loop.
    pub fn handle_event(&mut self, event: TransportEvent, out: &impl Outbox) {
        match event {
            TransportEvent::Connected(conn) => {
                if let Err(e) = self.on_connect(conn, out) {
                    log_failure(conn, "connect", &e);
                }
            }
            TransportEvent::Data(conn, data) => match self.on_data(conn, &data, out) {
                Ok(_) => {}
                Err(ServerError::Session(SessionError::UnknownConnection(_))) => {
                    tracing::warn!(conn_id = %conn, "data from inactive connection ignored");
                }
                Err(e) => log_failure(conn, "data", &e),
            },
            TransportEvent::Disconnected(conn) => {
                if let Err(e) = self.on_disconnect(conn, out) {
                    log_failure(conn, "disconnect", &e);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Connect
    // -----------------------------------------------------------------------

    /// Runs the connect sequence and returns the new player's uid.
    ///
    /// # Errors
    /// [`SessionError::DuplicateConnection`] if `conn` is already active.
    /// Nothing is sent in that case.
    pub fn on_connect(
        &mut self,
        conn: ConnectionId,
        out: &impl Outbox,
    ) -> Result<PlayerId, ServerError> {
        if self.registry.contains(conn) {
            return Err(SessionError::DuplicateConnection(conn).into());
        }
        let uid = ConnectionRegistry::uid_for(conn);

        let join = self.codec.encode(&[Record::Join { uid }])?;
        let batch = self.onboarding_batch()?;

        out.send_to_all_except(Some(conn), &join);
        out.send_to(conn, &batch);

        self.admit(conn)?;
        tracing::info!(conn_id = %conn, %uid, players = self.world.player_count(), "player joined");
        Ok(uid)
    }

    fn onboarding_batch(&self) -> Result<Vec<u8>, ServerError> {
        let records: Vec<Record> = std::iter::once(Record::MultiOn)
            .chain(self.world.snapshot_onboarding())
            .chain(std::iter::once(Record::MultiOff))
            .collect();
        Ok(self.codec.encode(&records)?)
    }

    /// Registers and inserts as one step.
    fn admit(&mut self, conn: ConnectionId) -> Result<(), ServerError> {
        let player = self.registry.register(conn)?;
        let uid = player.uid();
        if let Err(e) = self.world.insert_player(player) {
            self.registry.unregister(conn)?;
            tracing::error!(conn_id = %conn, %uid, "player already in world, registration rolled back");
            return Err(e.into());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Data
    // -----------------------------------------------------------------------

    /// Applies and echoes every request in one inbound message. Returns how
    /// many were applied.
    ///
    /// Malformed records are logged and dropped. Because records carry no
    /// length of their own, nothing after a malformed record in the same
    /// message can be read.
    ///
    /// # Errors
    /// [`SessionError::UnknownConnection`] if `conn` is not active. A world
    /// error aborts the rest of the message.
    pub fn on_data(
        &mut self,
        conn: ConnectionId,
        data: &[u8],
        out: &impl Outbox,
    ) -> Result<usize, ServerError> {
        let uid = self.registry.uid_of(conn)?;
        let mut applied = 0;

        for decoded in self.codec.decode::<ClientRecord>(data) {
            let request = match decoded {
                Ok(request) => request,
                Err(e) => {
                    tracing::debug!(conn_id = %conn, %uid, error = %e, "malformed record dropped");
                    continue;
                }
            };
            self.apply(uid, &request)?;
            let echo = self.codec.encode(&[request.echo(uid)])?;
            out.send_to_all_except(None, &echo);
            applied += 1;
        }

        Ok(applied)
    }

    fn apply(&mut self, uid: PlayerId, request: &ClientRecord) -> Result<(), ServerError> {
        match request {
            ClientRecord::Pos { x, y, z } => {
                tracing::trace!(%uid, x, y, z, "POS");
                self.world.apply_position(uid, *x, *y, *z)?;
            }
            ClientRecord::Life { hp } => {
                tracing::info!(%uid, hp, "LIFE");
                self.world.apply_life(uid, *hp)?;
            }
            ClientRecord::Name { name } => {
                let old = &self.world.player(uid)?.actor().name;
                tracing::info!(%uid, old = %old, new = %name, "NAME");
                self.world.apply_name(uid, name.clone())?;
            }
            ClientRecord::Chat { text } => {
                // Chat has no state; the sender still has to be active.
                self.world.player(uid)?;
                tracing::info!(%uid, %text, "CHAT");
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Disconnect
    // -----------------------------------------------------------------------

    /// Announces the departure and drops the player. Returns its uid.
    ///
    /// # Errors
    /// [`SessionError::UnknownConnection`] if `conn` was never active.
    /// Nothing is sent in that case.
    pub fn on_disconnect(
        &mut self,
        conn: ConnectionId,
        out: &impl Outbox,
    ) -> Result<PlayerId, ServerError> {
        let uid = self.registry.uid_of(conn)?;

        let part = self.codec.encode(&[Record::Part { uid }])?;
        out.send_to_all_except(Some(conn), &part);

        self.registry.unregister(conn)?;
        self.world.remove_player(uid)?;
        tracing::info!(conn_id = %conn, %uid, players = self.world.player_count(), "player left");
        Ok(uid)
    }

    // -----------------------------------------------------------------------
    // Admin
    // -----------------------------------------------------------------------

    /// Swaps in a new map and sends every active connection a map-only
    /// batch (`MULTI_ON`, tiles and walls, `MULTI_OFF`).
    ///
    /// # Errors
    /// [`WorldError::ShapeMismatch`](areserver_world::WorldError::ShapeMismatch)
    /// if the new map has different dimensions; nothing changes or is sent.
    pub fn regenerate_map(&mut self, map: WorldMap, out: &impl Outbox) -> Result<(), ServerError> {
        self.world.regenerate_map(map)?;
        let records: Vec<Record> = std::iter::once(Record::MultiOn)
            .chain(self.world.map_records())
            .chain(std::iter::once(Record::MultiOff))
            .collect();
        out.send_to_all_except(None, &self.codec.encode(&records)?);
        Ok(())
    }
}

/// Logs a failed operation at a level matching how bad it is.
fn log_failure(conn: ConnectionId, operation: &'static str, error: &ServerError) {
    match error {
        ServerError::Session(SessionError::DuplicateConnection(_)) => {
            tracing::warn!(conn_id = %conn, operation, error = %error, "transport reported a repeated connect");
        }
        e if e.is_desync() => {
            tracing::error!(conn_id = %conn, operation, error = %error, "registry and world out of step, operation aborted");
        }
        _ => {
            tracing::warn!(conn_id = %conn, operation, error = %error, "operation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use areserver_world::{MapConfig, WorldError};

    use super::*;

    /// Counts sends without decoding them.
    #[derive(Default)]
    struct CountingOutbox {
        sends: RefCell<usize>,
    }

    impl Outbox for CountingOutbox {
        fn send_to(&self, _conn: ConnectionId, _data: &[u8]) {
            *self.sends.borrow_mut() += 1;
        }

        fn send_to_all_except(&self, _exclude: Option<ConnectionId>, _data: &[u8]) {
            *self.sends.borrow_mut() += 1;
        }
    }

    fn dispatcher() -> Dispatcher {
        let map = WorldMap::empty(MapConfig {
            width: 1,
            height: 1,
            depth: 1,
        })
        .unwrap();
        Dispatcher::new(WorldState::new(map), BinaryCodec)
    }

    #[test]
    fn test_admit_rolls_back_registration_when_world_rejects() {
        let mut d = dispatcher();
        d.world.insert_player(Player::new(PlayerId(5))).unwrap();

        let err = d.admit(ConnectionId::new(5)).unwrap_err();

        assert!(matches!(err, ServerError::World(WorldError::DuplicatePlayer(_))));
        assert!(!d.registry.contains(ConnectionId::new(5)));
    }

    #[test]
    fn test_duplicate_connect_sends_nothing() {
        let mut d = dispatcher();
        let out = CountingOutbox::default();
        d.on_connect(ConnectionId::new(1), &out).unwrap();
        let after_first = *out.sends.borrow();

        let err = d.on_connect(ConnectionId::new(1), &out).unwrap_err();

        assert!(matches!(err, ServerError::Session(SessionError::DuplicateConnection(_))));
        assert_eq!(*out.sends.borrow(), after_first);
    }

    #[test]
    fn test_disconnect_unknown_sends_nothing() {
        let mut d = dispatcher();
        let out = CountingOutbox::default();
        let err = d.on_disconnect(ConnectionId::new(9), &out).unwrap_err();
        assert!(err.is_desync());
        assert_eq!(*out.sends.borrow(), 0);
    }
}
