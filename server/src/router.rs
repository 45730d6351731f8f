//! Session broadcast router
//!
//! Attaches sockets to game streams and forwards every envelope published
//! on a game's channel to each connection registered for that game in this
//! process. One subscriber task runs per game while it has connections.
//! The subscriber counts the sessions holding it, so the last detach and a
//! concurrent attach agree on whether it keeps running. When a game is
//! deleted its subscriber sees the channel close, drops its own registry
//! entry and forgets the connections still attached to that game.
//!
//! Delivery is best effort: a connection whose outbound queue is full or
//! closed misses the update, and nothing is retried.

use crate::chat::{prepare_message, ChatFilter};
use crate::client_manager::{ClientManager, ConnectionId};
use crate::lifecycle::LifecycleSupervisor;
use crate::orchestrator::GameService;
use crate::store::GameStore;
use crate::utils::{generate_source_id, get_timestamp};
use log::{debug, info, warn};
use shared::{ClientPacket, Envelope, GameError, GameId, PlayerHandle, Role, ServerPacket};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

/// A connection that has been attached to a game stream.
#[derive(Debug, Clone)]
pub struct Session {
    pub game_id: GameId,
    pub handle: PlayerHandle,
    pub role: Role,
    pub connection_id: ConnectionId,
    /// Tags chat sent from this connection.
    pub source: String,
    /// Generation of the subscriber this session holds.
    subscription: u64,
}

struct Subscriber {
    generation: u64,
    sessions: usize,
    task: JoinHandle<()>,
}

type Subscribers = Mutex<HashMap<GameId, Subscriber>>;

pub struct SessionRouter {
    store: Arc<GameStore>,
    lifecycle: Arc<LifecycleSupervisor>,
    service: Arc<GameService>,
    clients: Arc<RwLock<ClientManager>>,
    subscribers: Arc<Subscribers>,
    next_generation: AtomicU64,
    chat_filter: Arc<dyn ChatFilter>,
    disconnect_grace: Duration,
}

impl SessionRouter {
    pub fn new(
        service: Arc<GameService>,
        lifecycle: Arc<LifecycleSupervisor>,
        chat_filter: Arc<dyn ChatFilter>,
        max_connections: usize,
        disconnect_grace: Duration,
    ) -> Self {
        Self {
            store: Arc::clone(service.store()),
            lifecycle,
            service,
            clients: Arc::new(RwLock::new(ClientManager::new(max_connections))),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
            chat_filter,
            disconnect_grace,
        }
    }

    pub async fn connection_count(&self, game_id: &GameId) -> usize {
        self.clients.read().await.connection_count(game_id)
    }

    /// Attaches a socket's outbound queue to a game.
    ///
    /// A player clears its disconnect marker and a reconnect notice is
    /// published. The socket then receives an `Attached` acknowledgement
    /// and the full current state before it is registered for fan-out.
    pub async fn attach(
        &self,
        game_id: GameId,
        handle: PlayerHandle,
        role: Role,
        sender: mpsc::Sender<ServerPacket>,
    ) -> Result<Session, GameError> {
        let (game, _) = self.store.read(&game_id).await?;
        if role == Role::Player && game.color_of(&handle).is_none() {
            return Err(GameError::Forbidden(format!(
                "{} is not seated in game {}",
                handle, game_id
            )));
        }

        if role == Role::Player {
            self.store.clear_disconnect(&game_id, &handle).await;
            let notice = Envelope::ReconnectNotice {
                player: handle.clone(),
            };
            if let Err(e) = self.store.publish(&game_id, &notice).await {
                warn!("Failed to publish reconnect for game {}: {}", game_id, e);
            }
        }

        let subscription = self.acquire_subscriber(&game_id).await;

        let source = generate_source_id();
        let snapshot = Envelope::state(&game).to_json()?;
        let greeting = [
            ServerPacket::Attached {
                game_id: game_id.clone(),
                role,
                source: source.clone(),
            },
            ServerPacket::Update(snapshot),
        ];
        for packet in greeting {
            if sender.send(packet).await.is_err() {
                self.release_subscriber(&game_id, subscription).await;
                return Err(GameError::Internal("connection closed".to_string()));
            }
        }

        let added = self
            .clients
            .write()
            .await
            .add_connection(&game_id, handle.clone(), role, sender);
        let Some(connection_id) = added else {
            self.release_subscriber(&game_id, subscription).await;
            return Err(GameError::Forbidden("too many connections".to_string()));
        };

        self.lifecycle.start_ticking(&game_id).await;

        Ok(Session {
            game_id,
            handle,
            role,
            connection_id,
            source,
            subscription,
        })
    }

    /// Deregisters a connection. A player whose last stream to a live game
    /// closed gets a disconnect marker and a disconnect notice is published.
    pub async fn detach(&self, session: &Session) {
        let still_connected = {
            let mut clients = self.clients.write().await;
            clients.remove_connection(&session.game_id, session.connection_id);
            clients.is_handle_connected(&session.game_id, &session.handle)
        };

        if session.role == Role::Player
            && !still_connected
            && self.store.contains(&session.game_id).await
        {
            self.store
                .set_disconnect(&session.game_id, &session.handle, get_timestamp())
                .await;
            let notice = Envelope::DisconnectNotice {
                player: session.handle.clone(),
                timeout: self.disconnect_grace.as_secs(),
            };
            if let Err(e) = self.store.publish(&session.game_id, &notice).await {
                warn!(
                    "Failed to publish disconnect for game {}: {}",
                    session.game_id, e
                );
            }
        }

        self.release_subscriber(&session.game_id, session.subscription)
            .await;
    }

    /// Stops every subscriber and forgets every attached connection.
    pub async fn shutdown(&self) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .await
            .drain()
            .map(|(_, subscriber)| subscriber)
            .collect();

        info!("Stopping {} session subscribers", subscribers.len());
        for subscriber in &subscribers {
            subscriber.task.abort();
        }
        for subscriber in subscribers {
            let _ = subscriber.task.await;
        }

        let dropped = self.clients.write().await.clear();
        debug!("Released {} attached connections", dropped);
    }

    /// Applies an inbound stream message. Spectators are read-only, so
    /// their messages are dropped.
    pub async fn handle_message(
        &self,
        session: &Session,
        packet: ClientPacket,
    ) -> Result<(), GameError> {
        if session.role == Role::Spectator {
            debug!(
                "Ignoring message from spectator {} on game {}",
                session.handle, session.game_id
            );
            return Ok(());
        }

        match packet {
            ClientPacket::ToggleDeadStone { index } => {
                self.service
                    .toggle_dead_stone(&session.game_id, &session.handle, index)
                    .await?;
            }
            ClientPacket::FinalizeScore => {
                self.service
                    .finalize_score(&session.game_id, &session.handle)
                    .await?;
            }
            ClientPacket::Chat { text } => {
                let Some(text) = prepare_message(&text) else {
                    return Ok(());
                };
                let envelope = Envelope::Chat {
                    source: session.source.clone(),
                    sender: session.handle.clone(),
                    text: self.chat_filter.clean(&text),
                };
                self.store.publish(&session.game_id, &envelope).await?;
            }
            other => {
                return Err(GameError::InvalidRequest(format!(
                    "{:?} is not a stream message",
                    other
                )));
            }
        }
        Ok(())
    }

    /// Takes a share of the game's subscriber, starting one if none is
    /// running. Returns the subscriber's generation.
    async fn acquire_subscriber(&self, game_id: &GameId) -> u64 {
        let mut subscribers = self.subscribers.lock().await;
        if let Some(subscriber) = subscribers.get_mut(game_id) {
            if !subscriber.task.is_finished() {
                subscriber.sessions += 1;
                return subscriber.generation;
            }
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut updates = self.store.subscribe(game_id).await;
        let clients = Arc::clone(&self.clients);
        let registry = Arc::clone(&self.subscribers);
        let id = game_id.clone();
        let task = tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(envelope) => fan_out(&clients, &id, envelope).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Subscriber for game {} skipped {} updates", id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            {
                let mut subscribers = registry.lock().await;
                if subscribers
                    .get(&id)
                    .is_some_and(|subscriber| subscriber.generation == generation)
                {
                    subscribers.remove(&id);
                }
            }
            let dropped = clients.write().await.remove_game(&id);
            debug!(
                "Channel for game {} closed, released {} connections",
                id, dropped
            );
        });

        debug!("Started subscriber for game {}", game_id);
        subscribers.insert(
            game_id.clone(),
            Subscriber {
                generation,
                sessions: 1,
                task,
            },
        );
        generation
    }

    /// Gives back a session's share; the last one stops the subscriber.
    async fn release_subscriber(&self, game_id: &GameId, generation: u64) {
        let mut subscribers = self.subscribers.lock().await;
        let Some(subscriber) = subscribers.get_mut(game_id) else {
            return;
        };
        if subscriber.generation != generation {
            return;
        }

        subscriber.sessions = subscriber.sessions.saturating_sub(1);
        if subscriber.sessions == 0 {
            if let Some(subscriber) = subscribers.remove(game_id) {
                subscriber.task.abort();
                debug!("Stopped subscriber for game {}", game_id);
            }
        }
    }
}

async fn fan_out(clients: &RwLock<ClientManager>, game_id: &GameId, envelope: String) {
    let senders = clients.read().await.senders(game_id);
    for (connection_id, sender) in senders {
        if let Err(e) = sender.try_send(ServerPacket::Update(envelope.clone())) {
            warn!(
                "Dropped update for connection {} on game {}: {}",
                connection_id, game_id, e
            );
        }
    }
}
