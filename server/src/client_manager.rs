//! Registry of live game streams for this server process
//!
//! This module tracks every connection attached to a game, including:
//! - Which game and which participant each connection belongs to
//! - Whether the participant is a player or a read-only spectator
//! - The outbound queue used to reach the connection's socket
//! - Capacity limits on concurrently attached streams
//!
//! The registry only knows about connections in this process. Fan-out of
//! published updates is driven by the session router, which asks the
//! registry for the outbound queues of a game.

use log::info;
use shared::{GameId, PlayerHandle, Role, ServerPacket};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc;

pub type ConnectionId = u64;

/// A connection attached to a game stream
///
/// Each connection keeps:
/// - Its participant handle and role within the game
/// - The sending half of its outbound packet queue
/// - When it attached, for monitoring
#[derive(Debug)]
pub struct Connection {
    /// Unique connection identifier assigned by the registry
    pub id: ConnectionId,
    pub handle: PlayerHandle,
    pub role: Role,
    /// Queue drained by the connection's socket writer
    pub sender: mpsc::Sender<ServerPacket>,
    pub connected_at: Instant,
}

/// Manages every attached connection, grouped by game
pub struct ClientManager {
    /// Connections indexed by game, then by connection ID
    games: HashMap<GameId, HashMap<ConnectionId, Connection>>,
    /// Next available connection ID
    next_connection_id: ConnectionId,
    /// Maximum number of concurrently attached connections
    max_connections: usize,
}

impl ClientManager {
    /// Creates an empty registry with the given capacity limit
    pub fn new(max_connections: usize) -> Self {
        Self {
            games: HashMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    /// Registers a connection for a game's fan-out
    ///
    /// Returns `Some(connection_id)` on success, `None` when the server is
    /// at capacity.
    pub fn add_connection(
        &mut self,
        game_id: &GameId,
        handle: PlayerHandle,
        role: Role,
        sender: mpsc::Sender<ServerPacket>,
    ) -> Option<ConnectionId> {
        if self.len() >= self.max_connections {
            return None;
        }

        let id = self.next_connection_id;
        self.next_connection_id += 1;

        info!(
            "Connection {} attached to game {} as {:?} {}",
            id, game_id, role, handle
        );
        self.games.entry(game_id.clone()).or_default().insert(
            id,
            Connection {
                id,
                handle,
                role,
                sender,
                connected_at: Instant::now(),
            },
        );

        Some(id)
    }

    /// Removes a connection, dropping the game's entry once it is empty
    pub fn remove_connection(
        &mut self,
        game_id: &GameId,
        connection_id: ConnectionId,
    ) -> Option<Connection> {
        let connections = self.games.get_mut(game_id)?;
        let removed = connections.remove(&connection_id);
        if connections.is_empty() {
            self.games.remove(game_id);
        }

        if let Some(connection) = &removed {
            info!(
                "Connection {} left game {} after {:.1}s",
                connection.id,
                game_id,
                connection.connected_at.elapsed().as_secs_f32()
            );
        }
        removed
    }

    /// Forgets every connection attached to a game, returning how many
    pub fn remove_game(&mut self, game_id: &GameId) -> usize {
        let removed = self.games.remove(game_id).map_or(0, |connections| connections.len());
        if removed > 0 {
            info!("Released {} connections of deleted game {}", removed, game_id);
        }
        removed
    }

    /// Forgets every connection, dropping their outbound queues
    pub fn clear(&mut self) -> usize {
        let removed = self.len();
        self.games.clear();
        removed
    }

    /// Outbound queues of every connection attached to a game
    pub fn senders(&self, game_id: &GameId) -> Vec<(ConnectionId, mpsc::Sender<ServerPacket>)> {
        self.games
            .get(game_id)
            .map(|connections| {
                connections
                    .values()
                    .map(|connection| (connection.id, connection.sender.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True if the participant still has another stream open to the game
    pub fn is_handle_connected(&self, game_id: &GameId, handle: &PlayerHandle) -> bool {
        self.games.get(game_id).is_some_and(|connections| {
            connections
                .values()
                .any(|connection| &connection.handle == handle)
        })
    }

    pub fn connection_count(&self, game_id: &GameId) -> usize {
        self.games.get(game_id).map_or(0, HashMap::len)
    }

    /// Returns the number of attached connections across all games
    pub fn len(&self) -> usize {
        self.games.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> (mpsc::Sender<ServerPacket>, mpsc::Receiver<ServerPacket>) {
        mpsc::channel(8)
    }

    #[test]
    fn test_add_and_remove_connection() {
        let mut manager = ClientManager::new(4);
        let game = GameId::new("g1");
        let (tx, _rx) = queue();

        let id = manager
            .add_connection(&game, "p1".into(), Role::Player, tx)
            .unwrap();
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.connection_count(&game), 1);
        assert!(manager.is_handle_connected(&game, &"p1".into()));

        let removed = manager.remove_connection(&game, id).unwrap();
        assert_eq!(removed.handle, PlayerHandle::new("p1"));
        assert!(manager.is_empty());
        assert!(manager.remove_connection(&game, id).is_none());
    }

    #[test]
    fn test_capacity_limit() {
        let mut manager = ClientManager::new(1);
        let game = GameId::new("g1");
        let (tx, _rx) = queue();

        assert!(manager
            .add_connection(&game, "p1".into(), Role::Player, tx.clone())
            .is_some());
        assert!(manager
            .add_connection(&game, "p2".into(), Role::Spectator, tx)
            .is_none());
    }

    #[test]
    fn test_unique_connection_ids() {
        let mut manager = ClientManager::new(8);
        let game = GameId::new("g1");
        let (tx, _rx) = queue();

        let a = manager
            .add_connection(&game, "p1".into(), Role::Player, tx.clone())
            .unwrap();
        let b = manager
            .add_connection(&game, "p1".into(), Role::Player, tx)
            .unwrap();
        assert_ne!(a, b);

        // The same player on two sockets stays connected until both leave
        manager.remove_connection(&game, a);
        assert!(manager.is_handle_connected(&game, &"p1".into()));
    }

    #[test]
    fn test_senders_are_per_game() {
        let mut manager = ClientManager::new(8);
        let (tx, _rx) = queue();
        manager.add_connection(&"g1".into(), "p1".into(), Role::Player, tx.clone());
        manager.add_connection(&"g1".into(), "s1".into(), Role::Spectator, tx.clone());
        manager.add_connection(&"g2".into(), "p2".into(), Role::Player, tx);

        assert_eq!(manager.senders(&"g1".into()).len(), 2);
        assert_eq!(manager.senders(&"g2".into()).len(), 1);
        assert!(manager.senders(&"g3".into()).is_empty());
    }

    #[test]
    fn test_remove_game_and_clear() {
        let mut manager = ClientManager::new(8);
        let (tx, _rx) = queue();
        manager.add_connection(&"g1".into(), "p1".into(), Role::Player, tx.clone());
        manager.add_connection(&"g1".into(), "s1".into(), Role::Spectator, tx.clone());
        manager.add_connection(&"g2".into(), "p2".into(), Role::Player, tx);

        assert_eq!(manager.remove_game(&"g1".into()), 2);
        assert_eq!(manager.remove_game(&"g1".into()), 0);
        assert_eq!(manager.len(), 1);

        assert_eq!(manager.clear(), 1);
        assert!(manager.is_empty());
    }
}
