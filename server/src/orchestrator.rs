//! User-facing game operations built from the rules engine and the store
//!
//! Every mutating operation is a single compare-and-swap attempt. A lost
//! race comes back to the caller as [`GameError::Conflict`] to retry.

use crate::lifecycle::LifecycleSupervisor;
use crate::store::GameStore;
use crate::utils::{
    generate_game_id, generate_handle, get_timestamp, get_unix_seconds, random_color,
};
use log::{debug, info, warn};
use shared::game::FinalizeOutcome;
use shared::{
    Color, CreateGameRequest, Envelope, GameError, GameId, GameState, Move, PlayerHandle, Rank,
};
use std::sync::Arc;

pub struct GameService {
    store: Arc<GameStore>,
    lifecycle: Arc<LifecycleSupervisor>,
}

impl GameService {
    pub fn new(store: Arc<GameStore>, lifecycle: Arc<LifecycleSupervisor>) -> Self {
        Self { store, lifecycle }
    }

    pub fn store(&self) -> &Arc<GameStore> {
        &self.store
    }

    async fn publish(&self, id: &GameId, envelope: &Envelope) {
        if let Err(e) = self.store.publish(id, envelope).await {
            warn!("Failed to publish {} for game {}: {}", envelope.kind(), id, e);
        }
    }

    /// Creates a game and starts its join timeout.
    ///
    /// The creator is not seated yet; the returned handle is meant to be
    /// passed to [`GameService::join`]. A creator rank is remembered for
    /// the handicap calculation.
    pub async fn create(
        &self,
        request: CreateGameRequest,
    ) -> Result<(GameId, PlayerHandle), GameError> {
        let mut game = GameState::new(&request.settings, get_unix_seconds())?;
        let creator = request.creator.unwrap_or_else(generate_handle);
        if let Some(rank) = request.creator_rank.filter(|_| game.allow_handicaps) {
            game.estimated_ranks.insert(creator.clone(), rank);
        }

        let id = generate_game_id();
        self.store.insert(&id, &game).await?;
        self.lifecycle.start_join_timeout(&id).await;

        info!(
            "Created game {} ({}x{}, {:?}, komi {})",
            id, game.board_size, game.board_size, game.rule_set, game.komi
        );
        Ok((id, creator))
    }

    /// Seats a player, or recognizes a returning one.
    pub async fn join(
        &self,
        id: &GameId,
        handle: Option<PlayerHandle>,
        rank: Option<Rank>,
    ) -> Result<(PlayerHandle, Color), GameError> {
        let handle = handle.unwrap_or_else(generate_handle);

        let (current, _) = self.store.read(id).await?;
        if let Some(color) = current.color_of(&handle) {
            debug!("Player {} rejoined game {}", handle, id);
            return Ok((handle, color));
        }

        let seat_color = random_color();
        let (game, outcome) = self
            .store
            .transact(id, |game| game.join(handle.clone(), rank, seat_color))
            .await?;

        self.lifecycle.cancel_join_timeout(id).await;
        self.publish(id, &Envelope::state(&game)).await;
        info!("Player {} joined game {} as {}", handle, id, outcome.color);
        Ok((handle, outcome.color))
    }

    /// Validates and applies a move by a seated player. Returns the number
    /// of stones captured.
    pub async fn make_move(
        &self,
        id: &GameId,
        handle: &PlayerHandle,
        index: i64,
    ) -> Result<usize, GameError> {
        let mv = Move::from_index(index)?;
        let now = get_timestamp();

        let (game, captured) = self
            .store
            .transact(id, |game| {
                let color = game
                    .color_of(handle)
                    .ok_or_else(|| GameError::Forbidden(format!("{} is not seated", handle)))?;
                if mv != Move::Resign && !game.is_full() {
                    return Err(GameError::Forbidden(
                        "waiting for an opponent to join".to_string(),
                    ));
                }

                let captured = game.apply(mv, color)?;
                game.record_move(mv, color, now);
                if let Move::Place(_) = mv {
                    game.reset_byo_yomi(handle);
                }
                Ok(captured)
            })
            .await?;

        self.publish(id, &Envelope::state(&game)).await;
        if game.game_over {
            info!("Game {} over: {:?}", id, game.game_over_reason);
        }
        Ok(captured)
    }

    pub async fn get_state(&self, id: &GameId) -> Result<GameState, GameError> {
        self.store.read(id).await.map(|(game, _)| game)
    }

    /// Flips a group in the player's dead-stone proposal.
    pub async fn toggle_dead_stone(
        &self,
        id: &GameId,
        handle: &PlayerHandle,
        index: usize,
    ) -> Result<Vec<usize>, GameError> {
        let (game, points) = self
            .store
            .transact(id, |game| game.toggle_dead(handle, index))
            .await?;

        let envelope = Envelope::ToggleDeadStone {
            player: handle.clone(),
            points: points.clone(),
            dead_black: game.dead_black.clone(),
            dead_white: game.dead_white.clone(),
        };
        self.publish(id, &envelope).await;
        Ok(points)
    }

    /// Confirms the player's proposal; scores the game once both agree.
    pub async fn finalize_score(
        &self,
        id: &GameId,
        handle: &PlayerHandle,
    ) -> Result<FinalizeOutcome, GameError> {
        let (game, outcome) = self
            .store
            .transact(id, |game| game.finalize(handle))
            .await?;

        match outcome {
            FinalizeOutcome::Scored => {
                info!(
                    "Game {} scored: {:?}, winner {:?}",
                    id, game.final_score, game.winner
                );
            }
            FinalizeOutcome::Mismatch => {
                debug!("Dead stone proposals for game {} differ", id);
            }
            FinalizeOutcome::Waiting => {}
        }
        self.publish(id, &Envelope::state(&game)).await;
        Ok(outcome)
    }
}
