//! Versioned game storage with a publish channel per game
//!
//! Each game is kept as a serialized JSON document together with a version
//! token. Writers read a snapshot and its version, compute the new state
//! from that snapshot, and commit with [`GameStore::compare_and_swap`],
//! which only succeeds if nobody else committed in between. A losing
//! writer gets [`GameError::Conflict`]; nothing here retries on its own.
//!
//! Documents are replaced whole under the write lock, so a reader always
//! sees a fully written state.

use log::{debug, warn};
use shared::{Envelope, GameError, GameId, GameState, PlayerHandle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};

/// Token identifying one committed write of a game.
pub type Version = u64;

const CHANNEL_CAPACITY: usize = 256;

struct Entry {
    version: Version,
    document: String,
}

pub struct GameStore {
    /// `game:<id>`
    games: RwLock<HashMap<GameId, Entry>>,
    /// `disconnect:<id>`, handle to disconnect time in milliseconds
    disconnects: RwLock<HashMap<GameId, HashMap<PlayerHandle, u64>>>,
    /// `game_updates:<id>`
    channels: RwLock<HashMap<GameId, broadcast::Sender<String>>>,
    next_version: AtomicU64,
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStore {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            disconnects: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            next_version: AtomicU64::new(1),
        }
    }

    fn bump(&self) -> Version {
        self.next_version.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the current state of a game and the version it was read at.
    pub async fn read(&self, id: &GameId) -> Result<(GameState, Version), GameError> {
        let games = self.games.read().await;
        let entry = games.get(id).ok_or(GameError::NotFound)?;
        let game = serde_json::from_str(&entry.document)?;
        Ok((game, entry.version))
    }

    pub async fn contains(&self, id: &GameId) -> bool {
        self.games.read().await.contains_key(id)
    }

    /// Stores a new game. Fails with `Conflict` if the id is already taken.
    pub async fn insert(&self, id: &GameId, game: &GameState) -> Result<Version, GameError> {
        let document = serde_json::to_string(game)?;
        let mut games = self.games.write().await;
        if games.contains_key(id) {
            return Err(GameError::Conflict);
        }

        let version = self.bump();
        games.insert(id.clone(), Entry { version, document });
        Ok(version)
    }

    /// Commits `game` only if the stored version is still `expected`.
    pub async fn compare_and_swap(
        &self,
        id: &GameId,
        expected: Version,
        game: &GameState,
    ) -> Result<Version, GameError> {
        let document = serde_json::to_string(game)?;
        let mut games = self.games.write().await;
        let entry = games.get_mut(id).ok_or(GameError::NotFound)?;
        if entry.version != expected {
            debug!(
                "CAS conflict on game {}: expected version {}, found {}",
                id, expected, entry.version
            );
            return Err(GameError::Conflict);
        }

        let version = self.bump();
        *entry = Entry { version, document };
        Ok(version)
    }

    /// Reads, applies `mutate` to the snapshot and commits the result in one
    /// attempt. Errors from `mutate` abort before anything is written.
    pub async fn transact<T, F>(&self, id: &GameId, mutate: F) -> Result<(GameState, T), GameError>
    where
        F: FnOnce(&mut GameState) -> Result<T, GameError>,
    {
        let (mut game, version) = self.read(id).await?;
        let output = mutate(&mut game)?;
        self.compare_and_swap(id, version, &game).await?;
        Ok((game, output))
    }

    /// Removes a game, its disconnect record and its channel. Subscribers
    /// of the channel observe it closing.
    pub async fn delete(&self, id: &GameId) -> bool {
        let existed = self.games.write().await.remove(id).is_some();
        self.remove_side_records(id).await;
        existed
    }

    /// Deletes a game only if the stored version is still `expected`, so a
    /// write committed after the caller's read keeps the game alive.
    pub async fn delete_if_version(&self, id: &GameId, expected: Version) -> Result<(), GameError> {
        {
            let mut games = self.games.write().await;
            let entry = games.get(id).ok_or(GameError::NotFound)?;
            if entry.version != expected {
                debug!(
                    "Delete of game {} skipped: expected version {}, found {}",
                    id, expected, entry.version
                );
                return Err(GameError::Conflict);
            }
            games.remove(id);
        }
        self.remove_side_records(id).await;
        Ok(())
    }

    async fn remove_side_records(&self, id: &GameId) {
        self.disconnects.write().await.remove(id);
        self.channels.write().await.remove(id);
    }

    pub async fn game_ids(&self) -> Vec<GameId> {
        self.games.read().await.keys().cloned().collect()
    }

    pub async fn set_disconnect(&self, id: &GameId, handle: &PlayerHandle, at_ms: u64) {
        self.disconnects
            .write()
            .await
            .entry(id.clone())
            .or_default()
            .insert(handle.clone(), at_ms);
    }

    /// Returns true if a marker was present.
    pub async fn clear_disconnect(&self, id: &GameId, handle: &PlayerHandle) -> bool {
        let mut disconnects = self.disconnects.write().await;
        let Some(markers) = disconnects.get_mut(id) else {
            return false;
        };
        let removed = markers.remove(handle).is_some();
        if markers.is_empty() {
            disconnects.remove(id);
        }
        removed
    }

    pub async fn disconnects(&self, id: &GameId) -> HashMap<PlayerHandle, u64> {
        self.disconnects
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Games that currently have a disconnect record.
    pub async fn disconnect_ids(&self) -> Vec<GameId> {
        self.disconnects.read().await.keys().cloned().collect()
    }

    pub async fn remove_disconnects(&self, id: &GameId) -> bool {
        self.disconnects.write().await.remove(id).is_some()
    }

    /// Publishes an envelope to everyone subscribed to the game.
    ///
    /// Returns the number of subscribers reached; zero when nobody listens.
    pub async fn publish(&self, id: &GameId, envelope: &Envelope) -> Result<usize, GameError> {
        let text = envelope.to_json()?;
        let channels = self.channels.read().await;
        let Some(sender) = channels.get(id) else {
            return Ok(0);
        };

        match sender.send(text) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                warn!("No live subscribers for {} on game {}", envelope.kind(), id);
                Ok(0)
            }
        }
    }

    /// Subscribes to the game's channel, creating it on first use.
    pub async fn subscribe(&self, id: &GameId) -> broadcast::Receiver<String> {
        let mut channels = self.channels.write().await;
        channels
            .entry(id.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}
