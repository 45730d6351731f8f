//! The game aggregate and the rules state machine
//!
//! [`GameState`] is the single unit of consistency for a game. It is read
//! from the store as an immutable snapshot, mutated here through the rules
//! entry points ([`GameState::apply`], [`GameState::join`],
//! [`GameState::toggle_dead`], [`GameState::finalize`],
//! [`GameState::tick_clock`]) and written back as a whole.
//!
//! ## Phases
//!
//! ```text
//! Setup -> AwaitingOpponent -> Playing -> ScoringProposal -> Finished
//!                                 |                            ^
//!                                 +---- resign / timeout ------+
//! ```
//!
//! Two consecutive passes never finish a game directly: both players first
//! agree on the dead stones and confirm, and only then is the position
//! scored.

use crate::board::{Board, Cell, Color, BOARD_SIZES};
use crate::error::{GameError, MoveError};
use crate::handicap;
use crate::rank::{handicap_between, Rank};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Stable identity of a participant, independent of any connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerHandle(String);

impl PlayerHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of a game in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A player action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Move {
    Place(usize),
    Pass,
    Resign,
}

impl Move {
    pub const PASS_INDEX: i64 = -1;
    pub const RESIGN_INDEX: i64 = -2;

    /// Decodes the flat index convention: `-1` passes, `-2` resigns.
    pub fn from_index(index: i64) -> Result<Move, GameError> {
        match index {
            Self::RESIGN_INDEX => Ok(Move::Resign),
            Self::PASS_INDEX => Ok(Move::Pass),
            i if i >= 0 => Ok(Move::Place(i as usize)),
            other => Err(GameError::InvalidRequest(format!(
                "move index {} is not a point, pass or resignation",
                other
            ))),
        }
    }

    pub fn index(self) -> i64 {
        match self {
            Move::Place(index) => index as i64,
            Move::Pass => Self::PASS_INDEX,
            Move::Resign => Self::RESIGN_INDEX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSet {
    #[default]
    Japanese,
    Chinese,
}

impl FromStr for RuleSet {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "japanese" => Ok(RuleSet::Japanese),
            "chinese" => Ok(RuleSet::Chinese),
            other => Err(GameError::InvalidRequest(format!(
                "unknown rule set: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreference {
    Black,
    White,
    #[default]
    Random,
}

impl FromStr for ColorPreference {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "black" => Ok(ColorPreference::Black),
            "white" => Ok(ColorPreference::White),
            "random" | "" => Ok(ColorPreference::Random),
            other => Err(GameError::InvalidRequest(format!(
                "unknown color preference: {}",
                other
            ))),
        }
    }
}

/// Main time per player. The textual form is `"none"` or a number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeControl {
    #[default]
    Unlimited,
    MainTime(u32),
}

impl TimeControl {
    pub fn is_enabled(self) -> bool {
        matches!(self, TimeControl::MainTime(_))
    }
}

impl FromStr for TimeControl {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(TimeControl::Unlimited);
        }
        match s.parse::<u32>() {
            Ok(seconds) if seconds > 0 => Ok(TimeControl::MainTime(seconds)),
            _ => Err(GameError::InvalidRequest(format!(
                "time control must be \"none\" or a positive number of seconds, got {:?}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Setup,
    AwaitingOpponent,
    Playing,
    ScoringProposal,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Resign,
    Timeout,
    DoublePass,
    Scored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub index: i64,
    pub color: Color,
    pub timestamp: u64,
}

/// Remaining time for one player, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerClock {
    pub time_left: u32,
    pub periods_left: u32,
    pub byo_yomi_time_left: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub black: f64,
    pub white: f64,
}

impl Score {
    /// Strict comparison; equal scores have no winner.
    pub fn leader(&self) -> Option<Color> {
        if self.black > self.white {
            Some(Color::Black)
        } else if self.white > self.black {
            Some(Color::White)
        } else {
            None
        }
    }
}

/// Result of one clock tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockOutcome {
    /// No clock applies in the current phase.
    Idle,
    Running,
    /// Main time is gone and a byo-yomi period was consumed.
    PeriodUsed,
    TimedOut(PlayerHandle),
}

/// Result of a player confirming their dead-stone proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizeOutcome {
    /// The opponent has not confirmed yet.
    Waiting,
    /// Both confirmed different proposals; confirmations were cleared.
    Mismatch,
    Scored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub color: Color,
    pub reconnected: bool,
}

/// Parameters fixed at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    pub board_size: usize,
    pub time_control: TimeControl,
    pub komi: f64,
    pub rule_set: RuleSet,
    pub color_preference: ColorPreference,
    pub allow_handicaps: bool,
    pub byo_yomi_periods: u32,
    pub byo_yomi_time: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            board_size: 19,
            time_control: TimeControl::Unlimited,
            komi: 6.5,
            rule_set: RuleSet::Japanese,
            color_preference: ColorPreference::Random,
            allow_handicaps: false,
            byo_yomi_periods: 0,
            byo_yomi_time: 0,
        }
    }
}

impl GameSettings {
    pub fn validate(&self) -> Result<(), GameError> {
        if !BOARD_SIZES.contains(&self.board_size) {
            return Err(GameError::InvalidRequest(format!(
                "board size must be one of {:?}, got {}",
                BOARD_SIZES, self.board_size
            )));
        }
        if !self.komi.is_finite() || self.komi.abs() > 100.0 {
            return Err(GameError::InvalidRequest(format!(
                "komi out of range: {}",
                self.komi
            )));
        }
        if self.byo_yomi_periods > 0 && self.byo_yomi_time == 0 {
            return Err(GameError::InvalidRequest(
                "byo-yomi periods need a non-zero period length".to_string(),
            ));
        }
        Ok(())
    }
}

/// Authoritative state of one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub board_size: usize,
    pub board: Board,
    pub previous_board: Board,
    pub two_plies_ago_board: Board,
    pub players: BTreeMap<PlayerHandle, Color>,
    pub current_turn: Color,
    pub consecutive_passes: u8,
    /// Black stones taken off the board; White's prisoners.
    pub captured_black: u32,
    /// White stones taken off the board; Black's prisoners.
    pub captured_white: u32,
    pub move_log: Vec<MoveRecord>,
    pub game_over: bool,
    pub in_scoring_phase: bool,
    pub dead_black: BTreeSet<usize>,
    pub dead_white: BTreeSet<usize>,
    pub finalized_players: BTreeSet<PlayerHandle>,
    pub excluded_points: BTreeSet<usize>,
    pub time_control: TimeControl,
    pub komi: f64,
    pub rule_set: RuleSet,
    pub color_preference: ColorPreference,
    pub byo_yomi_periods: u32,
    pub byo_yomi_time: u32,
    pub clocks: BTreeMap<PlayerHandle, PlayerClock>,
    pub allow_handicaps: bool,
    pub estimated_ranks: BTreeMap<PlayerHandle, Rank>,
    pub handicap_stones: u8,
    pub handicap_placements: Vec<usize>,
    pub winner: Option<PlayerHandle>,
    pub final_score: Option<Score>,
    pub game_over_reason: Option<GameOverReason>,
    pub resigned_player: Option<PlayerHandle>,
    /// Unix seconds.
    pub created_at: u64,
}

impl GameState {
    pub fn new(settings: &GameSettings, created_at: u64) -> Result<Self, GameError> {
        settings.validate()?;
        let board = Board::new(settings.board_size);

        Ok(Self {
            board_size: settings.board_size,
            previous_board: board.clone(),
            two_plies_ago_board: board.clone(),
            board,
            players: BTreeMap::new(),
            current_turn: Color::Black,
            consecutive_passes: 0,
            captured_black: 0,
            captured_white: 0,
            move_log: Vec::new(),
            game_over: false,
            in_scoring_phase: false,
            dead_black: BTreeSet::new(),
            dead_white: BTreeSet::new(),
            finalized_players: BTreeSet::new(),
            excluded_points: BTreeSet::new(),
            time_control: settings.time_control,
            komi: settings.komi,
            rule_set: settings.rule_set,
            color_preference: settings.color_preference,
            byo_yomi_periods: settings.byo_yomi_periods,
            byo_yomi_time: settings.byo_yomi_time,
            clocks: BTreeMap::new(),
            allow_handicaps: settings.allow_handicaps,
            estimated_ranks: BTreeMap::new(),
            handicap_stones: 0,
            handicap_placements: Vec::new(),
            winner: None,
            final_score: None,
            game_over_reason: None,
            resigned_player: None,
            created_at,
        })
    }

    pub fn phase(&self) -> Phase {
        if self.game_over {
            Phase::Finished
        } else if self.in_scoring_phase {
            Phase::ScoringProposal
        } else {
            match self.players.len() {
                0 => Phase::Setup,
                1 => Phase::AwaitingOpponent,
                _ => Phase::Playing,
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= 2
    }

    pub fn color_of(&self, handle: &PlayerHandle) -> Option<Color> {
        self.players.get(handle).copied()
    }

    pub fn player_with(&self, color: Color) -> Option<&PlayerHandle> {
        self.players
            .iter()
            .find(|(_, c)| **c == color)
            .map(|(handle, _)| handle)
    }

    /// Seats `handle`, or recognizes it as already seated.
    ///
    /// `random_color` is used for the first seat when the creator asked for
    /// a random color. Once both seats are filled, handicap stones and
    /// clocks are set up.
    pub fn join(
        &mut self,
        handle: PlayerHandle,
        rank: Option<Rank>,
        random_color: Color,
    ) -> Result<JoinOutcome, GameError> {
        if let Some(color) = self.color_of(&handle) {
            return Ok(JoinOutcome {
                color,
                reconnected: true,
            });
        }
        if self.is_full() {
            return Err(GameError::InvalidRequest("game is full".to_string()));
        }

        let color = match self.players.values().next() {
            Some(existing) => existing.opposite(),
            None => match self.color_preference {
                ColorPreference::Black => Color::Black,
                ColorPreference::White => Color::White,
                ColorPreference::Random => random_color,
            },
        };

        if self.allow_handicaps {
            if let Some(rank) = rank {
                self.estimated_ranks.insert(handle.clone(), rank);
            }
        }
        self.players.insert(handle.clone(), color);

        if self.is_full() {
            if self.allow_handicaps {
                self.apply_handicap();
            }
            if self.time_control.is_enabled() {
                self.start_clocks();
            }
        }

        Ok(JoinOutcome {
            color: self.color_of(&handle).unwrap_or(color),
            reconnected: false,
        })
    }

    /// Gives the weaker seated player Black and places the stones.
    ///
    /// Does nothing until both seated players have a known rank.
    fn apply_handicap(&mut self) {
        let ranked: Vec<(PlayerHandle, Rank)> = self
            .players
            .keys()
            .filter_map(|h| self.estimated_ranks.get(h).map(|r| (h.clone(), *r)))
            .collect();
        let [(first, first_rank), (second, second_rank)] = ranked.as_slice() else {
            return;
        };

        if first_rank.value() != second_rank.value() {
            let (weaker, stronger) = if first_rank.value() < second_rank.value() {
                (first, second)
            } else {
                (second, first)
            };
            self.players.insert(weaker.clone(), Color::Black);
            self.players.insert(stronger.clone(), Color::White);
        }

        self.handicap_stones = handicap_between(*first_rank, *second_rank);
        self.handicap_placements = handicap::place(&mut self.board, self.handicap_stones);
        if !self.handicap_placements.is_empty() {
            self.current_turn = Color::White;
            self.previous_board = self.board.clone();
            self.two_plies_ago_board = self.board.clone();
        }
    }

    fn start_clocks(&mut self) {
        let TimeControl::MainTime(main_time) = self.time_control else {
            return;
        };
        let clock = PlayerClock {
            time_left: main_time,
            periods_left: self.byo_yomi_periods,
            byo_yomi_time_left: self.byo_yomi_time,
        };
        for handle in self.players.keys() {
            self.clocks.insert(handle.clone(), clock);
        }
    }

    /// Checks a move without mutating anything.
    pub fn check(&self, mv: Move, color: Color) -> Result<(), MoveError> {
        if self.game_over {
            return Err(MoveError::GameOver);
        }
        let index = match mv {
            Move::Resign => return Ok(()),
            _ if self.in_scoring_phase => return Err(MoveError::ScoringInProgress),
            _ if color != self.current_turn => return Err(MoveError::NotYourTurn),
            Move::Pass => return Ok(()),
            Move::Place(index) => index,
        };

        if !self.board.contains(index) {
            return Err(MoveError::OutOfBounds);
        }
        if !self.board.get(index).is_some_and(Cell::is_empty) {
            return Err(MoveError::Occupied);
        }

        let mut next = self.board.clone();
        let captured = next.place_and_capture(index, color);
        let liberties = next.group_at(index).map_or(0, |group| group.liberties);
        if captured == 0 && liberties == 0 {
            return Err(MoveError::Suicide);
        }

        // `previous_board` is the position two plies before the candidate
        if !self.board.is_empty() && next == self.previous_board {
            return Err(MoveError::Ko);
        }

        Ok(())
    }

    pub fn is_legal(&self, mv: Move, color: Color) -> bool {
        self.check(mv, color).is_ok()
    }

    /// Validates and applies a move. Returns the number of stones captured.
    pub fn apply(&mut self, mv: Move, color: Color) -> Result<usize, MoveError> {
        self.check(mv, color)?;

        match mv {
            Move::Resign => {
                self.end_by_resignation(color);
                Ok(0)
            }
            Move::Pass => {
                self.consecutive_passes = (self.consecutive_passes + 1).min(2);
                if self.consecutive_passes >= 2 {
                    self.enter_scoring();
                }
                self.current_turn = color.opposite();
                Ok(0)
            }
            Move::Place(index) => {
                self.two_plies_ago_board =
                    std::mem::replace(&mut self.previous_board, self.board.clone());
                let captured = self.board.place_and_capture(index, color);
                match color {
                    Color::Black => self.captured_white += captured as u32,
                    Color::White => self.captured_black += captured as u32,
                }
                self.consecutive_passes = 0;
                self.current_turn = color.opposite();
                Ok(captured)
            }
        }
    }

    pub fn record_move(&mut self, mv: Move, color: Color, timestamp: u64) {
        self.move_log.push(MoveRecord {
            index: mv.index(),
            color,
            timestamp,
        });
    }

    fn enter_scoring(&mut self) {
        self.in_scoring_phase = true;
        self.dead_black.clear();
        self.dead_white.clear();
        self.finalized_players.clear();
    }

    fn finish(&mut self, reason: GameOverReason) {
        self.game_over = true;
        self.in_scoring_phase = false;
        self.game_over_reason = Some(reason);
    }

    fn end_by_resignation(&mut self, color: Color) {
        self.resigned_player = self.player_with(color).cloned();
        self.winner = self.player_with(color.opposite()).cloned();
        self.finish(GameOverReason::Resign);
    }

    /// Resigns on behalf of `handle`, e.g. after a disconnect grace period.
    pub fn resign(&mut self, handle: &PlayerHandle) -> Result<(), GameError> {
        let color = self
            .color_of(handle)
            .ok_or_else(|| GameError::Forbidden(format!("{} is not seated", handle)))?;
        self.apply(Move::Resign, color)?;
        Ok(())
    }

    fn end_by_timeout(&mut self, handle: &PlayerHandle) {
        if let Some(color) = self.color_of(handle) {
            self.winner = self.player_with(color.opposite()).cloned();
        }
        self.resigned_player = Some(handle.clone());
        self.finish(GameOverReason::Timeout);
    }

    /// Advances the mover's clock by one second.
    pub fn tick_clock(&mut self) -> ClockOutcome {
        if self.phase() != Phase::Playing || !self.time_control.is_enabled() {
            return ClockOutcome::Idle;
        }
        let Some(mover) = self.player_with(self.current_turn).cloned() else {
            return ClockOutcome::Idle;
        };

        let periods = self.byo_yomi_periods;
        let period_length = self.byo_yomi_time;
        let main_time = match self.time_control {
            TimeControl::MainTime(seconds) => seconds,
            TimeControl::Unlimited => 0,
        };
        let clock = self.clocks.entry(mover.clone()).or_insert(PlayerClock {
            time_left: main_time,
            periods_left: periods,
            byo_yomi_time_left: period_length,
        });

        let outcome = if clock.time_left > 0 {
            clock.time_left -= 1;
            if clock.time_left == 0 && periods == 0 {
                ClockOutcome::TimedOut(mover.clone())
            } else {
                ClockOutcome::Running
            }
        } else {
            clock.byo_yomi_time_left = clock.byo_yomi_time_left.saturating_sub(1);
            if clock.byo_yomi_time_left > 0 {
                ClockOutcome::Running
            } else {
                clock.periods_left = clock.periods_left.saturating_sub(1);
                if clock.periods_left == 0 {
                    ClockOutcome::TimedOut(mover.clone())
                } else {
                    clock.byo_yomi_time_left = period_length;
                    ClockOutcome::PeriodUsed
                }
            }
        };

        if let ClockOutcome::TimedOut(handle) = &outcome {
            self.end_by_timeout(handle);
        }
        outcome
    }

    /// Refills the byo-yomi period of `handle` after a stone is played.
    pub fn reset_byo_yomi(&mut self, handle: &PlayerHandle) {
        let period_length = self.byo_yomi_time;
        if let Some(clock) = self.clocks.get_mut(handle) {
            clock.byo_yomi_time_left = period_length;
        }
    }

    /// Territory plus prisoners (Japanese) or territory plus stones on the
    /// board (Chinese), with komi added to White.
    ///
    /// `excluded` points never count as territory; they are ignored under
    /// Chinese rules.
    pub fn score(&self, excluded: &BTreeSet<usize>) -> Score {
        let mut black_territory = 0usize;
        let mut white_territory = 0usize;

        for region in self.board.empty_regions() {
            let counted = match self.rule_set {
                RuleSet::Japanese => region
                    .points
                    .iter()
                    .filter(|point| !excluded.contains(point))
                    .count(),
                RuleSet::Chinese => region.points.len(),
            };
            match region.owner {
                Some(Color::Black) => black_territory += counted,
                Some(Color::White) => white_territory += counted,
                None => {}
            }
        }

        let (black, white) = match self.rule_set {
            RuleSet::Japanese => (
                black_territory + self.captured_white as usize,
                white_territory + self.captured_black as usize,
            ),
            RuleSet::Chinese => (
                black_territory + self.board.stone_count(Color::Black),
                white_territory + self.board.stone_count(Color::White),
            ),
        };

        Score {
            black: black as f64,
            white: white as f64 + self.komi,
        }
    }

    /// Toggles the group at `index` in `handle`'s dead-stone proposal.
    ///
    /// An empty point toggles on its own (used to mark seki). Any change
    /// withdraws both players' confirmations. Returns the toggled points.
    pub fn toggle_dead(
        &mut self,
        handle: &PlayerHandle,
        index: usize,
    ) -> Result<Vec<usize>, GameError> {
        let color = self
            .color_of(handle)
            .ok_or_else(|| GameError::Forbidden(format!("{} is not seated", handle)))?;
        if self.game_over {
            return Err(MoveError::GameOver.into());
        }
        if !self.in_scoring_phase {
            return Err(MoveError::NotInScoring.into());
        }
        if !self.board.contains(index) {
            return Err(MoveError::OutOfBounds.into());
        }

        let points = self
            .board
            .group_at(index)
            .map_or_else(|| vec![index], |group| group.stones);
        let proposal = match color {
            Color::Black => &mut self.dead_black,
            Color::White => &mut self.dead_white,
        };

        if points.iter().all(|point| proposal.contains(point)) {
            for point in &points {
                proposal.remove(point);
            }
        } else {
            proposal.extend(points.iter().copied());
        }
        self.finalized_players.clear();

        Ok(points)
    }

    /// Records `handle`'s confirmation and scores the game once both
    /// players confirmed identical proposals.
    pub fn finalize(&mut self, handle: &PlayerHandle) -> Result<FinalizeOutcome, GameError> {
        if self.color_of(handle).is_none() {
            return Err(GameError::Forbidden(format!("{} is not seated", handle)));
        }
        if self.game_over {
            return Err(MoveError::GameOver.into());
        }
        if !self.in_scoring_phase {
            return Err(MoveError::NotInScoring.into());
        }

        self.finalized_players.insert(handle.clone());
        if self.finalized_players.len() < 2 {
            return Ok(FinalizeOutcome::Waiting);
        }
        if self.dead_black != self.dead_white {
            self.finalized_players.clear();
            return Ok(FinalizeOutcome::Mismatch);
        }

        self.settle_dead_stones();
        let excluded = match self.rule_set {
            RuleSet::Japanese => self.excluded_points.clone(),
            RuleSet::Chinese => BTreeSet::new(),
        };
        let score = self.score(&excluded);
        self.winner = score
            .leader()
            .and_then(|color| self.player_with(color).cloned());
        self.final_score = Some(score);
        self.finish(GameOverReason::Scored);

        Ok(FinalizeOutcome::Scored)
    }

    /// Removes agreed dead stones as prisoners and sets agreed empty points
    /// aside as excluded from territory.
    fn settle_dead_stones(&mut self) {
        let agreed: Vec<usize> = self.dead_black.iter().copied().collect();
        for index in agreed {
            match self.board.get(index) {
                Some(Cell::Stone(Color::Black)) => self.captured_black += 1,
                Some(Cell::Stone(Color::White)) => self.captured_white += 1,
                Some(Cell::Empty) => {
                    self.excluded_points.insert(index);
                    continue;
                }
                None => continue,
            }
            self.board.set(index, Cell::Empty);
        }
    }
}
