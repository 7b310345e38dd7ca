//! Player settings and the validated game configuration
//!
//! Settings are persisted field by field through the ranking store.
//! `GameConfig` is the checked snapshot a session is built from.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::GameError;

/// Identifiers of every card face shipped with the game
pub fn available_cards() -> BTreeSet<String> {
    (1..=AVAILABLE_CARD_COUNT)
        .map(|i| format!("card_{i:02}"))
        .collect()
}

/// Identifiers of every background shipped with the game
pub fn available_backgrounds() -> BTreeSet<String> {
    (1..=AVAILABLE_BACKGROUND_COUNT)
        .map(|i| format!("background_{i:02}"))
        .collect()
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Name recorded with new scores
    pub player_name: String,
    /// Backgrounds a session may pick from (never empty)
    pub selected_backgrounds: BTreeSet<String>,
    /// Card faces a session may pick from
    pub selected_cards: BTreeSet<String>,
    pub board_width: usize,
    pub board_height: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_name: DEFAULT_PLAYER_NAME.to_string(),
            selected_backgrounds: ["background_01".to_string()].into_iter().collect(),
            selected_cards: available_cards(),
            board_width: DEFAULT_BOARD_WIDTH,
            board_height: DEFAULT_BOARD_HEIGHT,
        }
    }
}

impl Settings {
    /// Pairs needed for the configured board
    pub fn pair_count(&self) -> usize {
        self.board_width * self.board_height / 2
    }
}

/// Trim and cap a player name; blank names fall back to the default.
pub fn sanitize_player_name(name: &str) -> String {
    let trimmed: String = name.trim().chars().take(MAX_PLAYER_NAME_LEN).collect();
    let trimmed = trimmed.trim_end();
    if trimmed.is_empty() {
        DEFAULT_PLAYER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Checked configuration for building one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    pub pair_count: usize,
    pub cards: Vec<String>,
    pub backgrounds: Vec<String>,
}

impl GameConfig {
    /// Validate settings into a buildable configuration
    pub fn from_settings(settings: &Settings) -> Result<Self, GameError> {
        let (width, height) = (settings.board_width, settings.board_height);
        if !(MIN_BOARD_SIZE..=MAX_BOARD_WIDTH).contains(&width) {
            return Err(GameError::configuration(format!(
                "board width {width} outside {MIN_BOARD_SIZE}..={MAX_BOARD_WIDTH}"
            )));
        }
        if !(MIN_BOARD_SIZE..=MAX_BOARD_HEIGHT).contains(&height) {
            return Err(GameError::configuration(format!(
                "board height {height} outside {MIN_BOARD_SIZE}..={MAX_BOARD_HEIGHT}"
            )));
        }
        if (width * height) % 2 != 0 {
            return Err(GameError::configuration(format!(
                "{width}x{height} board has an odd number of cells"
            )));
        }

        let pair_count = settings.pair_count();
        if settings.selected_cards.len() < pair_count {
            return Err(GameError::configuration(format!(
                "{} cards selected, {pair_count} needed for a {width}x{height} board",
                settings.selected_cards.len()
            )));
        }
        if settings.selected_backgrounds.is_empty() {
            return Err(GameError::configuration("no background selected"));
        }

        Ok(Self {
            width,
            height,
            pair_count,
            cards: settings.selected_cards.iter().cloned().collect(),
            backgrounds: settings.selected_backgrounds.iter().cloned().collect(),
        })
    }
}
