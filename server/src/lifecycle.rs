//! Per-game background tasks: the one-second lifecycle tick and the join
//! timeout
//!
//! The supervisor guarantees at most one tick task and at most one join
//! timeout per game id. Tasks are cancelled cooperatively through a
//! `watch` channel and remove their own registry entry when they exit,
//! guarded by a generation number so a task that lost its slot to a newer
//! one never removes the newer entry.
//!
//! Each tick runs the same read, mutate, compare-and-swap, publish cycle
//! as a player request. A tick whose write loses a race is skipped; the
//! next tick starts from fresh state.

use crate::store::GameStore;
use crate::utils::get_timestamp;
use log::{debug, info, warn};
use shared::game::ClockOutcome;
use shared::{Envelope, GameError, GameId, Move, PlayerHandle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub tick_interval: Duration,
    pub disconnect_grace: Duration,
    pub join_timeout: Duration,
}

impl From<&crate::config::ServerConfig> for LifecycleConfig {
    fn from(config: &crate::config::ServerConfig) -> Self {
        Self {
            tick_interval: config.tick_interval,
            disconnect_grace: config.disconnect_grace,
            join_timeout: config.join_timeout,
        }
    }
}

/// Whether the tick loop should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Continue,
    Stop,
}

struct RunningTask {
    generation: u64,
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

type Registry = Mutex<HashMap<GameId, RunningTask>>;

pub struct LifecycleSupervisor {
    store: Arc<GameStore>,
    config: LifecycleConfig,
    ticks: Registry,
    join_timeouts: Registry,
    next_generation: AtomicU64,
}

impl LifecycleSupervisor {
    pub fn new(store: Arc<GameStore>, config: LifecycleConfig) -> Self {
        Self {
            store,
            config,
            ticks: Mutex::new(HashMap::new()),
            join_timeouts: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Starts the per-second tick for a game unless one is already running.
    pub async fn start_ticking(self: &Arc<Self>, id: &GameId) {
        let mut ticks = self.ticks.lock().await;
        if ticks.get(id).is_some_and(|task| !task.handle.is_finished()) {
            return;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (cancel, cancelled) = watch::channel(false);
        let supervisor = Arc::clone(self);
        let game_id = id.clone();
        let handle = tokio::spawn(async move {
            supervisor.run_ticks(&game_id, cancelled).await;
            supervisor
                .deregister(&supervisor.ticks, &game_id, generation)
                .await;
        });

        debug!("Started lifecycle tick for game {}", id);
        ticks.insert(
            id.clone(),
            RunningTask {
                generation,
                cancel,
                handle,
            },
        );
    }

    /// Starts the join timeout for a freshly created game.
    pub async fn start_join_timeout(self: &Arc<Self>, id: &GameId) {
        let mut timeouts = self.join_timeouts.lock().await;
        if timeouts.contains_key(id) {
            return;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (cancel, cancelled) = watch::channel(false);
        let supervisor = Arc::clone(self);
        let game_id = id.clone();
        let handle = tokio::spawn(async move {
            supervisor.run_join_timeout(&game_id, cancelled).await;
            supervisor
                .deregister(&supervisor.join_timeouts, &game_id, generation)
                .await;
        });

        timeouts.insert(
            id.clone(),
            RunningTask {
                generation,
                cancel,
                handle,
            },
        );
    }

    pub async fn cancel_join_timeout(&self, id: &GameId) -> bool {
        let task = self.join_timeouts.lock().await.remove(id);
        match task {
            Some(task) => {
                let _ = task.cancel.send(true);
                debug!("Cancelled join timeout for game {}", id);
                true
            }
            None => false,
        }
    }

    /// Cancels every task belonging to a game.
    pub async fn stop(&self, id: &GameId) {
        self.cancel_join_timeout(id).await;
        if let Some(task) = self.ticks.lock().await.remove(id) {
            let _ = task.cancel.send(true);
        }
    }

    pub async fn is_ticking(&self, id: &GameId) -> bool {
        self.ticks.lock().await.contains_key(id)
    }

    pub async fn has_join_timeout(&self, id: &GameId) -> bool {
        self.join_timeouts.lock().await.contains_key(id)
    }

    /// Cancels all tasks and waits for them to exit.
    pub async fn shutdown(&self) {
        let mut tasks: Vec<RunningTask> = self
            .ticks
            .lock()
            .await
            .drain()
            .map(|(_, task)| task)
            .collect();
        tasks.extend(self.join_timeouts.lock().await.drain().map(|(_, task)| task));

        info!("Stopping {} lifecycle tasks", tasks.len());
        for task in &tasks {
            let _ = task.cancel.send(true);
        }
        for task in tasks {
            let _ = task.handle.await;
        }
    }

    async fn deregister(&self, registry: &Registry, id: &GameId, generation: u64) {
        let mut tasks = registry.lock().await;
        if tasks.get(id).is_some_and(|task| task.generation == generation) {
            tasks.remove(id);
        }
    }

    async fn run_ticks(&self, id: &GameId, mut cancelled: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancelled.changed() => break,
                _ = ticker.tick() => {
                    if self.tick_once(id, get_timestamp()).await == TickStatus::Stop {
                        break;
                    }
                }
            }
        }

        debug!("Lifecycle tick for game {} exited", id);
    }

    async fn run_join_timeout(&self, id: &GameId, mut cancelled: watch::Receiver<bool>) {
        tokio::select! {
            _ = cancelled.changed() => return,
            _ = sleep(self.config.join_timeout) => {}
        }

        let version = match self.store.read(id).await {
            Ok((game, version)) if game.players.is_empty() => version,
            Ok(_) | Err(GameError::NotFound) => return,
            Err(e) => {
                warn!("Join timeout check failed for game {}: {}", id, e);
                return;
            }
        };

        match self.store.delete_if_version(id, version).await {
            Ok(()) => {
                if let Some(task) = self.ticks.lock().await.remove(id) {
                    let _ = task.cancel.send(true);
                }
                info!("Game {} expired without players", id);
            }
            Err(GameError::Conflict) => {
                debug!("Game {} changed as its join timeout fired, keeping it", id);
            }
            Err(GameError::NotFound) => {}
            Err(e) => warn!("Join timeout delete failed for game {}: {}", id, e),
        }
    }

    /// Runs one lifecycle step for a game at time `now_ms`.
    ///
    /// In order: cancels a pending join timeout once someone has joined,
    /// purges a finished game whose players have all been gone longer than
    /// the grace period, resigns a player whose disconnect outlasted the
    /// grace period, and advances the mover's clock.
    pub async fn tick_once(&self, id: &GameId, now_ms: u64) -> TickStatus {
        let (mut game, version) = match self.store.read(id).await {
            Ok(snapshot) => snapshot,
            Err(GameError::NotFound) => return TickStatus::Stop,
            Err(e) => {
                warn!("Tick for game {} could not read state: {}", id, e);
                return TickStatus::Continue;
            }
        };

        if !game.players.is_empty() {
            self.cancel_join_timeout(id).await;
        }

        let grace_ms = self.config.disconnect_grace.as_millis() as u64;
        let markers = self.store.disconnects(id).await;
        let gone_for = |handle: &PlayerHandle| {
            markers
                .get(handle)
                .map(|&at| now_ms.saturating_sub(at))
        };

        if game.game_over
            && !game.in_scoring_phase
            && !game.players.is_empty()
            && game
                .players
                .keys()
                .all(|handle| gone_for(handle).is_some_and(|ms| ms > grace_ms))
        {
            return match self.store.delete_if_version(id, version).await {
                Ok(()) => {
                    info!("Purged finished game {}", id);
                    TickStatus::Stop
                }
                Err(GameError::NotFound) => TickStatus::Stop,
                Err(e) => {
                    debug!("Purge of game {} deferred: {}", id, e);
                    TickStatus::Continue
                }
            };
        }

        let mut changed = false;

        if !game.game_over {
            let expired = game
                .players
                .iter()
                .find(|(handle, _)| gone_for(*handle).is_some_and(|ms| ms > grace_ms))
                .map(|(handle, color)| (handle.clone(), *color));

            if let Some((handle, color)) = expired {
                if game.apply(Move::Resign, color).is_ok() {
                    game.record_move(Move::Resign, color, now_ms);
                    changed = true;
                    info!(
                        "Player {} resigned game {} after disconnect timeout",
                        handle, id
                    );
                }
            }
        }

        match game.tick_clock() {
            ClockOutcome::Idle => {}
            ClockOutcome::Running | ClockOutcome::PeriodUsed => changed = true,
            ClockOutcome::TimedOut(handle) => {
                info!("Player {} lost game {} on time", handle, id);
                changed = true;
            }
        }

        if !changed {
            return TickStatus::Continue;
        }

        match self.store.compare_and_swap(id, version, &game).await {
            Ok(_) => {
                if let Err(e) = self.store.publish(id, &Envelope::state(&game)).await {
                    warn!("Failed to publish tick update for game {}: {}", id, e);
                }
                TickStatus::Continue
            }
            Err(GameError::Conflict) => {
                debug!("Tick for game {} lost a write race, retrying next tick", id);
                TickStatus::Continue
            }
            Err(GameError::NotFound) => TickStatus::Stop,
            Err(e) => {
                warn!("Tick for game {} failed to write: {}", id, e);
                TickStatus::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::game::GameOverReason;
    use shared::{Color, GameSettings, GameState, TimeControl};

    const GRACE_MS: u64 = 60_000;

    fn supervisor(store: &Arc<GameStore>) -> Arc<LifecycleSupervisor> {
        Arc::new(LifecycleSupervisor::new(
            Arc::clone(store),
            LifecycleConfig {
                tick_interval: Duration::from_millis(20),
                disconnect_grace: Duration::from_millis(GRACE_MS),
                join_timeout: Duration::from_millis(50),
            },
        ))
    }

    async fn seeded(store: &GameStore, settings: GameSettings, players: &[&str]) -> GameId {
        let mut game = GameState::new(&settings, 0).unwrap();
        for &handle in players {
            game.join(handle.into(), None, Color::Black).unwrap();
        }
        let id = GameId::new("g1");
        store.insert(&id, &game).await.unwrap();
        id
    }

    fn black_first() -> GameSettings {
        GameSettings {
            board_size: 9,
            color_preference: shared::ColorPreference::Black,
            ..GameSettings::default()
        }
    }

    #[tokio::test]
    async fn test_missing_game_stops_tick() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let status = lifecycle.tick_once(&GameId::new("nope"), 0).await;
        assert_eq!(status, TickStatus::Stop);
    }

    #[tokio::test]
    async fn test_disconnect_timeout_resigns_once() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let id = seeded(&store, black_first(), &["b", "w"]).await;
        let mut updates = store.subscribe(&id).await;

        store.set_disconnect(&id, &"w".into(), 1_000).await;

        // Inside the grace period nothing happens
        lifecycle.tick_once(&id, 1_000 + GRACE_MS).await;
        assert!(!store.read(&id).await.unwrap().0.game_over);

        lifecycle.tick_once(&id, 2_000 + GRACE_MS).await;
        lifecycle.tick_once(&id, 3_000 + GRACE_MS).await;

        let (game, _) = store.read(&id).await.unwrap();
        assert_eq!(game.game_over_reason, Some(GameOverReason::Resign));
        assert_eq!(game.winner, Some("b".into()));
        assert_eq!(game.resigned_player, Some("w".into()));
        let resignations = game
            .move_log
            .iter()
            .filter(|record| record.index == Move::RESIGN_INDEX)
            .count();
        assert_eq!(resignations, 1);

        let published = Envelope::from_json(&updates.recv().await.unwrap()).unwrap();
        assert_eq!(published.kind(), "game_state");
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_ticks_resign_once() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let id = seeded(&store, black_first(), &["b", "w"]).await;
        let mut updates = store.subscribe(&id).await;
        store.set_disconnect(&id, &"w".into(), 0).await;

        let ticks: Vec<_> = (0..2)
            .map(|_| {
                let lifecycle = Arc::clone(&lifecycle);
                let id = id.clone();
                tokio::spawn(async move { lifecycle.tick_once(&id, GRACE_MS * 2).await })
            })
            .collect();
        for tick in ticks {
            assert_eq!(tick.await.unwrap(), TickStatus::Continue);
        }

        let (game, _) = store.read(&id).await.unwrap();
        assert_eq!(game.resigned_player, Some("w".into()));
        let resignations = game
            .move_log
            .iter()
            .filter(|record| record.index == Move::RESIGN_INDEX)
            .count();
        assert_eq!(resignations, 1);

        let published = Envelope::from_json(&updates.recv().await.unwrap()).unwrap();
        assert_eq!(published.kind(), "game_state");
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_purge_after_everyone_left() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let id = seeded(&store, black_first(), &["b", "w"]).await;
        store
            .transact(&id, |game| game.resign(&"b".into()))
            .await
            .unwrap();

        store.set_disconnect(&id, &"b".into(), 0).await;
        assert_eq!(
            lifecycle.tick_once(&id, GRACE_MS * 2).await,
            TickStatus::Continue
        );
        assert!(store.contains(&id).await);

        store.set_disconnect(&id, &"w".into(), 0).await;
        assert_eq!(lifecycle.tick_once(&id, GRACE_MS * 2).await, TickStatus::Stop);
        assert!(!store.contains(&id).await);
        assert!(store.disconnects(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_scoring_phase_is_not_purged() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let id = seeded(&store, black_first(), &["b", "w"]).await;
        store
            .transact(&id, |game| {
                game.apply(Move::Pass, Color::Black)?;
                game.apply(Move::Pass, Color::White)?;
                Ok(())
            })
            .await
            .unwrap();

        store.set_disconnect(&id, &"b".into(), 0).await;
        store.set_disconnect(&id, &"w".into(), 0).await;
        lifecycle.tick_once(&id, GRACE_MS * 2).await;

        // A disconnected player resigns instead; the game survives
        let (game, _) = store.read(&id).await.unwrap();
        assert!(game.game_over);
        assert_eq!(game.game_over_reason, Some(GameOverReason::Resign));
    }

    #[tokio::test]
    async fn test_clock_ticks_and_times_out() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let settings = GameSettings {
            time_control: TimeControl::MainTime(2),
            ..black_first()
        };
        let id = seeded(&store, settings, &["b", "w"]).await;

        lifecycle.tick_once(&id, 0).await;
        let (game, _) = store.read(&id).await.unwrap();
        assert_eq!(game.clocks[&PlayerHandle::from("b")].time_left, 1);
        assert_eq!(game.clocks[&PlayerHandle::from("w")].time_left, 2);

        lifecycle.tick_once(&id, 0).await;
        let (game, _) = store.read(&id).await.unwrap();
        assert_eq!(game.game_over_reason, Some(GameOverReason::Timeout));
        assert_eq!(game.winner, Some("w".into()));
    }

    #[tokio::test]
    async fn test_clock_idle_while_waiting_for_opponent() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let settings = GameSettings {
            time_control: TimeControl::MainTime(2),
            ..black_first()
        };
        let id = seeded(&store, settings, &["b"]).await;
        let (_, before) = store.read(&id).await.unwrap();

        lifecycle.tick_once(&id, 0).await;
        let (_, after) = store.read(&id).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_join_timeout_deletes_empty_game() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let id = seeded(&store, black_first(), &[]).await;

        lifecycle.start_join_timeout(&id).await;
        assert!(lifecycle.has_join_timeout(&id).await);

        sleep(Duration::from_millis(200)).await;
        assert!(!store.contains(&id).await);
        assert!(!lifecycle.has_join_timeout(&id).await);
    }

    #[tokio::test]
    async fn test_join_timeout_cancelled() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let id = seeded(&store, black_first(), &[]).await;

        lifecycle.start_join_timeout(&id).await;
        assert!(lifecycle.cancel_join_timeout(&id).await);
        assert!(!lifecycle.cancel_join_timeout(&id).await);

        sleep(Duration::from_millis(200)).await;
        assert!(store.contains(&id).await);
    }

    #[tokio::test]
    async fn test_tick_cancels_join_timeout_once_joined() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let id = seeded(&store, black_first(), &["b"]).await;

        lifecycle.start_join_timeout(&id).await;
        lifecycle.tick_once(&id, 0).await;
        assert!(!lifecycle.has_join_timeout(&id).await);
    }

    #[tokio::test]
    async fn test_single_tick_task_per_game() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let id = seeded(&store, black_first(), &["b", "w"]).await;

        lifecycle.start_ticking(&id).await;
        lifecycle.start_ticking(&id).await;
        assert_eq!(lifecycle.ticks.lock().await.len(), 1);

        lifecycle.stop(&id).await;
        assert!(!lifecycle.is_ticking(&id).await);
    }

    #[tokio::test]
    async fn test_tick_task_exits_when_game_deleted() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let id = seeded(&store, black_first(), &["b", "w"]).await;

        lifecycle.start_ticking(&id).await;
        store.delete(&id).await;

        sleep(Duration::from_millis(200)).await;
        assert!(!lifecycle.is_ticking(&id).await);
    }

    #[tokio::test]
    async fn test_shutdown_clears_registries() {
        let store = Arc::new(GameStore::new());
        let lifecycle = supervisor(&store);
        let id = seeded(&store, black_first(), &[]).await;

        lifecycle.start_ticking(&id).await;
        lifecycle.start_join_timeout(&id).await;
        lifecycle.shutdown().await;

        assert!(!lifecycle.is_ticking(&id).await);
        assert!(!lifecycle.has_join_timeout(&id).await);
        assert!(store.contains(&id).await);
    }
}
