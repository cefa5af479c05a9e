//! The connection registry.
//!
//! The transport speaks in [`ConnectionId`]s and the wire speaks in
//! [`PlayerId`]s. The registry is the only place the two meet, so every
//! "who sent this" and "where does this go" question is answered here.
//!
//! It owns identity only. The [`Player`] record itself lives in the world
//! state: [`ConnectionRegistry::register`] hands a fresh one back for the
//! caller to insert, and [`ConnectionRegistry::unregister`] returns just the
//! uid so the caller can remove the player from the world in the same step.
//!
//! Not thread-safe on its own: it is a pair of plain `HashMap`s owned by
//! the dispatcher, which runs on the single tick loop.

use std::collections::HashMap;

use areserver_protocol::PlayerId;
use areserver_transport::ConnectionId;
use areserver_world::Player;

use crate::SessionError;

/// Bijective map between connections and player uids.
///
/// The two maps are always updated together, so `by_connection[c] == u`
/// exactly when `by_uid[u] == c`.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_connection: HashMap<ConnectionId, PlayerId>,
    by_uid: HashMap<PlayerId, ConnectionId>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The uid a connection is (or would be) known by.
    ///
    /// Uids come straight from the transport's connection id, so they are
    /// unique among open connections and may recur after one closes.
    pub fn uid_for(conn: ConnectionId) -> PlayerId {
        PlayerId(conn.into_inner())
    }

    /// Records a new connection and allocates its player with default
    /// actor fields.
    ///
    /// # Errors
    /// [`SessionError::DuplicateConnection`] if `conn` is already
    /// registered. Nothing changes in that case.
    pub fn register(&mut self, conn: ConnectionId) -> Result<Player, SessionError> {
        if self.by_connection.contains_key(&conn) {
            return Err(SessionError::DuplicateConnection(conn));
        }
        let uid = Self::uid_for(conn);
        self.by_connection.insert(conn, uid);
        self.by_uid.insert(uid, conn);
        tracing::debug!(conn_id = %conn, %uid, "connection registered");
        Ok(Player::new(uid))
    }

    /// Forgets a connection and returns the uid it owned.
    ///
    /// # Errors
    /// [`SessionError::UnknownConnection`] if `conn` is not registered.
    pub fn unregister(&mut self, conn: ConnectionId) -> Result<PlayerId, SessionError> {
        let uid = self
            .by_connection
            .remove(&conn)
            .ok_or(SessionError::UnknownConnection(conn))?;
        self.by_uid.remove(&uid);
        tracing::debug!(conn_id = %conn, %uid, "connection unregistered");
        Ok(uid)
    }

    /// The uid owned by a registered connection.
    ///
    /// # Errors
    /// [`SessionError::UnknownConnection`] if `conn` is not registered.
    pub fn uid_of(&self, conn: ConnectionId) -> Result<PlayerId, SessionError> {
        self.by_connection
            .get(&conn)
            .copied()
            .ok_or(SessionError::UnknownConnection(conn))
    }

    /// The connection that owns `uid`.
    ///
    /// # Errors
    /// [`SessionError::UnknownPlayer`] if no registered connection owns it.
    pub fn lookup_by_uid(&self, uid: PlayerId) -> Result<ConnectionId, SessionError> {
        self.by_uid
            .get(&uid)
            .copied()
            .ok_or(SessionError::UnknownPlayer(uid))
    }

    /// Whether `conn` is registered, i.e. its player is active.
    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.by_connection.contains_key(&conn)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }

    /// Registered connections with their uids, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, PlayerId)> + '_ {
        self.by_connection.iter().map(|(c, u)| (*c, *u))
    }
}
