//! Memory Tiles - A tile-matching memory game
//!
//! Core modules:
//! - `sim`: Pure game rules (board, turn state machine, scoring)
//! - `timer`: Whole-second session timer
//! - `engine`: Async session driver with timed reverts and observables
//! - `persistence`: Settings and score ranking over a key-value backend
//! - `audio`: Sound cue dispatch

pub mod audio;
pub mod engine;
pub mod error;
pub mod highscores;
pub mod persistence;
pub mod platform;
pub mod settings;
pub mod sim;
pub mod timer;

pub use engine::GameEngine;
pub use error::{GameError, PersistenceError};
pub use highscores::{Ranking, ScoreEntry};
pub use persistence::RankingStore;
pub use settings::{GameConfig, Settings};

/// Game configuration constants
pub mod consts {
    /// Ranking keeps this many entries
    pub const MAX_RANKING_ENTRIES: usize = 10;

    /// Delay before a mismatched pair turns back face down
    pub const REVERT_DELAY_MS: u64 = 1400;

    /// Buffered one-shot events per subscriber
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;

    /// Card faces are named card_01 ..= card_24
    pub const AVAILABLE_CARD_COUNT: usize = 24;
    pub const AVAILABLE_BACKGROUND_COUNT: usize = 6;

    pub const DEFAULT_PLAYER_NAME: &str = "Player";
    pub const MAX_PLAYER_NAME_LEN: usize = 20;

    /// Board defaults and bounds (cells)
    pub const DEFAULT_BOARD_WIDTH: usize = 4;
    pub const DEFAULT_BOARD_HEIGHT: usize = 5;
    pub const MIN_BOARD_SIZE: usize = 2;
    pub const MAX_BOARD_WIDTH: usize = 6;
    pub const MAX_BOARD_HEIGHT: usize = 8;
}
