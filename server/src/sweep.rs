//! Periodic cleanup of abandoned games

use crate::lifecycle::LifecycleSupervisor;
use crate::store::GameStore;
use crate::utils::get_unix_seconds;
use log::{debug, info, warn};
use shared::GameError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed_games: usize,
    pub removed_disconnects: usize,
}

/// Deletes games created more than `stale_after` before `now_secs`, along
/// with games whose stored document can no longer be read, then drops
/// disconnect records left behind by deleted games.
pub async fn sweep_once(
    store: &GameStore,
    lifecycle: &LifecycleSupervisor,
    now_secs: u64,
    stale_after: Duration,
) -> SweepReport {
    let mut report = SweepReport::default();

    for id in store.game_ids().await {
        let stale = match store.read(&id).await {
            Ok((game, _)) => now_secs.saturating_sub(game.created_at) > stale_after.as_secs(),
            Err(GameError::NotFound) => false,
            Err(e) => {
                warn!("Removing unreadable game {}: {}", id, e);
                true
            }
        };
        if stale && store.delete(&id).await {
            lifecycle.stop(&id).await;
            report.removed_games += 1;
            debug!("Swept game {}", id);
        }
    }

    for id in store.disconnect_ids().await {
        if !store.contains(&id).await && store.remove_disconnects(&id).await {
            report.removed_disconnects += 1;
        }
    }

    report
}

/// Runs [`sweep_once`] every `period` until `shutdown` flips to true.
pub async fn run_sweeper(
    store: Arc<GameStore>,
    lifecycle: Arc<LifecycleSupervisor>,
    period: Duration,
    stale_after: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let report = sweep_once(&store, &lifecycle, get_unix_seconds(), stale_after).await;
                if report != SweepReport::default() {
                    info!(
                        "Sweep removed {} games and {} disconnect records",
                        report.removed_games, report.removed_disconnects
                    );
                }
            }
        }
    }
}
