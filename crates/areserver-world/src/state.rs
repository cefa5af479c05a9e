//! The world state store: the map plus every active player.

use areserver_protocol::{PlayerId, Record};

use crate::{Player, WorldError, WorldMap};

/// The canonical world.
///
/// Owned by the dispatcher and touched only from the tick loop, so it needs
/// no locking. Players are kept in join order, which is the order
/// snapshots list them in.
#[derive(Debug)]
pub struct WorldState {
    map: WorldMap,
    players: Vec<Player>,
}

impl WorldState {
    /// Creates a world with `map` and no players.
    pub fn new(map: WorldMap) -> Self {
        Self {
            map,
            players: Vec::new(),
        }
    }

    /// The current map. Replaced wholesale by [`regenerate_map`](Self::regenerate_map).
    pub fn map(&self) -> &WorldMap {
        &self.map
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    /// Adds a player.
    ///
    /// # Errors
    /// [`WorldError::DuplicatePlayer`] if the uid is already active.
    pub fn insert_player(&mut self, player: Player) -> Result<(), WorldError> {
        if self.contains(player.uid()) {
            return Err(WorldError::DuplicatePlayer(player.uid()));
        }
        tracing::debug!(uid = %player.uid(), "player inserted");
        self.players.push(player);
        Ok(())
    }

    /// Removes and returns a player.
    pub fn remove_player(&mut self, uid: PlayerId) -> Result<Player, WorldError> {
        let index = self.position(uid)?;
        tracing::debug!(%uid, "player removed");
        Ok(self.players.remove(index))
    }

    /// The active player with this uid.
    ///
    /// # Errors
    /// [`WorldError::UnknownPlayer`] if `uid` is not active.
    pub fn player(&self, uid: PlayerId) -> Result<&Player, WorldError> {
        self.players
            .iter()
            .find(|p| p.uid() == uid)
            .ok_or(WorldError::UnknownPlayer(uid))
    }

    pub fn contains(&self, uid: PlayerId) -> bool {
        self.players.iter().any(|p| p.uid() == uid)
    }

    /// Active players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> + '_ {
        self.players.iter()
    }

    /// Number of active players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    fn position(&self, uid: PlayerId) -> Result<usize, WorldError> {
        self.players
            .iter()
            .position(|p| p.uid() == uid)
            .ok_or(WorldError::UnknownPlayer(uid))
    }

    fn player_mut(&mut self, uid: PlayerId) -> Result<&mut Player, WorldError> {
        let index = self.position(uid)?;
        Ok(&mut self.players[index])
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Overwrites a player's position. No bounds check against the map.
    pub fn apply_position(
        &mut self,
        uid: PlayerId,
        x: i32,
        y: i32,
        z: i32,
    ) -> Result<(), WorldError> {
        self.player_mut(uid)?.apply_position(x, y, z);
        Ok(())
    }

    /// Overwrites a player's life. No clamping.
    pub fn apply_life(&mut self, uid: PlayerId, hp: i32) -> Result<(), WorldError> {
        self.player_mut(uid)?.apply_life(hp);
        Ok(())
    }

    /// Overwrites a player's name. No validation.
    pub fn apply_name(
        &mut self,
        uid: PlayerId,
        name: impl Into<String>,
    ) -> Result<(), WorldError> {
        self.player_mut(uid)?.apply_name(name);
        Ok(())
    }

    /// Replaces the whole map.
    ///
    /// # Errors
    /// [`WorldError::ShapeMismatch`] if the new map's dimensions differ from
    /// the current ones; grids keep their shape for the life of the process.
    pub fn regenerate_map(&mut self, map: WorldMap) -> Result<(), WorldError> {
        let expected = self.map.tiles().dims();
        let got = map.tiles().dims();
        if expected != got {
            return Err(WorldError::ShapeMismatch { expected, got });
        }
        self.map = map;
        tracing::info!(records = self.map.record_count(), "map regenerated");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Everything a newcomer needs, lazily, in order: `JOIN`, `NAME`, `LIFE`
    /// for each player present now, then every map record.
    ///
    /// Callers take the snapshot before inserting the newcomer, so it never
    /// sees itself.
    pub fn snapshot_onboarding(&self) -> impl Iterator<Item = Record> + '_ {
        self.players
            .iter()
            .flat_map(Player::introduction)
            .chain(self.map.records())
    }

    /// Map records only, for rebroadcasting after regeneration.
    pub fn map_records(&self) -> impl Iterator<Item = Record> + '_ {
        self.map.records()
    }
}
