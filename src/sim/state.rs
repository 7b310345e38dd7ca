//! Session state and core game types
//!
//! Everything a single play-through mutates lives here. The engine is the
//! only writer.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::board::{Board, BoardView, Position};
use crate::error::GameError;
use crate::settings::GameConfig;

/// Where the matching state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No card is waiting for a partner
    Idle,
    /// One unmatched card is face up, waiting for the second tap
    AwaitingPartner(Position),
    /// A mismatched pair is face up until the revert fires
    RevertPending(Position, Position),
    /// Every pair is matched
    Won,
}

/// One-shot cues for sound and visual feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    Flip,
    Success,
    Failure,
    Win,
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn to_rng(&self) -> Pcg32 {
        Pcg32::seed_from_u64(self.seed)
    }
}

/// Complete state of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub board: Board,
    /// Card face identifier for each pair id
    pub faces: Vec<String>,
    /// Background identifier picked for this session
    pub background: String,
    pub score: i64,
    pub moves: u32,
    pub phase: Phase,
    pub paused: bool,
    /// A reset is waiting for confirmation
    pub reset_requested: bool,
    /// Timer value (seconds) at the previous scoring event
    pub last_scoring_secs: u64,
}

impl GameState {
    /// Fresh session over an already-built board
    pub fn new(board: Board, faces: Vec<String>, background: String) -> Self {
        Self {
            board,
            faces,
            background,
            score: 0,
            moves: 0,
            phase: Phase::Idle,
            paused: false,
            reset_requested: false,
            last_scoring_secs: 0,
        }
    }

    /// Build a shuffled board from a validated configuration, binding a random
    /// subset of the selected cards to the pair ids.
    pub fn from_config<R: Rng + ?Sized>(
        config: &GameConfig,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        let board = Board::build(config.width, config.height, config.pair_count, rng)?;

        if config.cards.len() < config.pair_count {
            return Err(GameError::configuration(format!(
                "{} cards selected, {} pairs needed",
                config.cards.len(),
                config.pair_count
            )));
        }
        let mut faces = config.cards.clone();
        faces.shuffle(rng);
        faces.truncate(config.pair_count);

        let background = config
            .backgrounds
            .choose(rng)
            .cloned()
            .ok_or_else(|| GameError::configuration("no background selected"))?;

        Ok(Self::new(board, faces, background))
    }

    pub fn won(&self) -> bool {
        self.phase == Phase::Won
    }

    pub fn revert_pending(&self) -> bool {
        matches!(self.phase, Phase::RevertPending(..))
    }

    pub fn view(&self) -> BoardView {
        self.board.view(&self.faces)
    }
}
