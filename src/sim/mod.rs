//! Game rules
//!
//! Everything here is pure and synchronous:
//! - Seeded RNG only
//! - Time is passed in as whole seconds
//! - No scheduling, persistence, or platform dependencies

pub mod board;
pub mod scoring;
pub mod state;
pub mod turn;

pub use board::{Board, BoardView, Card, CellView, Position};
pub use scoring::ScoringRule;
pub use state::{GameEvent, GameState, Phase, RngState};
pub use turn::{TapOutcome, finish_revert, tap, toggle_pause};
