//! Reactive settings and score ranking store
//!
//! Every persisted field is mirrored in a `watch` channel so consumers always
//! see the latest value. Values start at their defaults; `data_loaded` flips
//! to true once every field has been read from the backend.
//!
//! Ranking updates are read-modify-write over the backend and run under
//! `ranking_lock`, so concurrent `save_score` calls never drop an entry.
//! Other fields are independent single-key upserts and take no lock.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};

use super::{KeyValueStore, PersistenceError};
use crate::error::GameError;
use crate::highscores::{Ranking, ScoreEntry};
use crate::platform::{Clock, SystemClock};
use crate::settings::{GameConfig, Settings, sanitize_player_name};

const PLAYER_NAME_KEY: &str = "player_name";
const BACKGROUNDS_KEY: &str = "selected_backgrounds";
const CARDS_KEY: &str = "selected_cards";
const BOARD_SIZE_KEY: &str = "board_size";
const RANKING_KEY: &str = "ranking";
const LAST_ENTRY_KEY: &str = "last_entry";

/// Board dimensions, persisted together so they always change as one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct BoardSize {
    width: usize,
    height: usize,
}

/// Result of recording a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedScore {
    pub entry: ScoreEntry,
    /// Position in the ranking (1-indexed), None if it did not make the cut
    pub rank: Option<usize>,
}

pub struct RankingStore {
    backend: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ranking_lock: Mutex<()>,
    player_name: watch::Sender<String>,
    selected_backgrounds: watch::Sender<BTreeSet<String>>,
    selected_cards: watch::Sender<BTreeSet<String>>,
    board_width: watch::Sender<usize>,
    board_height: watch::Sender<usize>,
    ranking: watch::Sender<Ranking>,
    last_entry: watch::Sender<Option<ScoreEntry>>,
    data_loaded: watch::Sender<bool>,
}

impl RankingStore {
    /// Create a store holding defaults. Call `load` before trusting values.
    pub fn new(backend: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let defaults = Settings::default();
        Self {
            backend,
            clock,
            ranking_lock: Mutex::new(()),
            player_name: watch::channel(defaults.player_name).0,
            selected_backgrounds: watch::channel(defaults.selected_backgrounds).0,
            selected_cards: watch::channel(defaults.selected_cards).0,
            board_width: watch::channel(defaults.board_width).0,
            board_height: watch::channel(defaults.board_height).0,
            ranking: watch::channel(Ranking::new()).0,
            last_entry: watch::channel(None).0,
            data_loaded: watch::channel(false).0,
        }
    }

    /// Create and load a store backed by the system clock
    pub async fn open(backend: Arc<dyn KeyValueStore>) -> Arc<Self> {
        let store = Arc::new(Self::new(backend, Arc::new(SystemClock)));
        store.load().await;
        store
    }

    /// Read every field from the backend, then raise `data_loaded`.
    ///
    /// Unreadable or undecodable fields keep their defaults.
    pub async fn load(&self) {
        let defaults = Settings::default();

        let name = self
            .read::<String>(PLAYER_NAME_KEY)
            .await
            .unwrap_or(defaults.player_name);
        self.player_name.send_replace(name);

        let backgrounds = self
            .read(BACKGROUNDS_KEY)
            .await
            .unwrap_or(defaults.selected_backgrounds);
        self.selected_backgrounds.send_replace(backgrounds);

        let cards = self
            .read(CARDS_KEY)
            .await
            .unwrap_or(defaults.selected_cards);
        self.selected_cards.send_replace(cards);

        let size = self.read(BOARD_SIZE_KEY).await.unwrap_or(BoardSize {
            width: defaults.board_width,
            height: defaults.board_height,
        });
        self.board_width.send_replace(size.width);
        self.board_height.send_replace(size.height);

        let entries: Vec<ScoreEntry> = self.read(RANKING_KEY).await.unwrap_or_default();
        self.ranking.send_replace(Ranking::from_entries(entries));

        let last = self.read::<ScoreEntry>(LAST_ENTRY_KEY).await;
        self.last_entry.send_replace(last);

        self.data_loaded.send_replace(true);
        log::info!(
            "Loaded settings and {} ranking entries",
            self.current_ranking().len()
        );
    }

    /// Wait until `load` has completed
    pub async fn wait_until_loaded(&self) {
        let mut rx = self.data_loaded.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|loaded| *loaded).await;
    }

    /// Fetch and decode one key; failures are logged and read as absent
    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(source) => {
                    let err = PersistenceError::Decode {
                        key: key.to_string(),
                        source,
                    };
                    log::warn!("{err}; treating as absent");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("{e}; using default");
                None
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(value).map_err(|source| PersistenceError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.backend
            .put(key, &raw)
            .await
            .inspect_err(|e| log::error!("{e}"))
    }

    // === Observables ===

    pub fn player_name(&self) -> watch::Receiver<String> {
        self.player_name.subscribe()
    }

    pub fn selected_backgrounds(&self) -> watch::Receiver<BTreeSet<String>> {
        self.selected_backgrounds.subscribe()
    }

    pub fn selected_cards(&self) -> watch::Receiver<BTreeSet<String>> {
        self.selected_cards.subscribe()
    }

    pub fn board_width(&self) -> watch::Receiver<usize> {
        self.board_width.subscribe()
    }

    pub fn board_height(&self) -> watch::Receiver<usize> {
        self.board_height.subscribe()
    }

    pub fn top_ranking(&self) -> watch::Receiver<Ranking> {
        self.ranking.subscribe()
    }

    pub fn last_entry(&self) -> watch::Receiver<Option<ScoreEntry>> {
        self.last_entry.subscribe()
    }

    pub fn data_loaded(&self) -> watch::Receiver<bool> {
        self.data_loaded.subscribe()
    }

    pub fn current_ranking(&self) -> Ranking {
        self.ranking.borrow().clone()
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> Settings {
        Settings {
            player_name: self.player_name.borrow().clone(),
            selected_backgrounds: self.selected_backgrounds.borrow().clone(),
            selected_cards: self.selected_cards.borrow().clone(),
            board_width: *self.board_width.borrow(),
            board_height: *self.board_height.borrow(),
        }
    }

    /// Validated configuration for the next session
    pub fn game_config(&self) -> Result<GameConfig, GameError> {
        GameConfig::from_settings(&self.settings())
    }

    // === Field updates ===
    //
    // Each value is published only after it has been persisted.

    pub async fn save_player_name(&self, name: &str) -> Result<(), PersistenceError> {
        let name = sanitize_player_name(name);
        self.write(PLAYER_NAME_KEY, &name).await?;
        self.player_name.send_replace(name);
        Ok(())
    }

    pub async fn save_selected_backgrounds(
        &self,
        backgrounds: BTreeSet<String>,
    ) -> Result<(), PersistenceError> {
        self.write(BACKGROUNDS_KEY, &backgrounds).await?;
        self.selected_backgrounds.send_replace(backgrounds);
        Ok(())
    }

    pub async fn save_selected_cards(
        &self,
        cards: BTreeSet<String>,
    ) -> Result<(), PersistenceError> {
        self.write(CARDS_KEY, &cards).await?;
        self.selected_cards.send_replace(cards);
        Ok(())
    }

    /// Both dimensions are written as one value, then published together
    pub async fn save_board_dimensions(
        &self,
        width: usize,
        height: usize,
    ) -> Result<(), PersistenceError> {
        self.write(BOARD_SIZE_KEY, &BoardSize { width, height }).await?;
        self.board_width.send_replace(width);
        self.board_height.send_replace(height);
        Ok(())
    }

    /// Record a finished session.
    ///
    /// Overwrites the last-played entry, then inserts into the ranking. Both
    /// writes are attempted; the first failure is returned.
    pub async fn save_score(
        &self,
        player_name: &str,
        score: i64,
    ) -> Result<SavedScore, PersistenceError> {
        let entry = ScoreEntry {
            player_name: sanitize_player_name(player_name),
            score,
            timestamp: self.clock.now_millis(),
        };

        let last = self.write(LAST_ENTRY_KEY, &entry).await;
        if last.is_ok() {
            self.last_entry.send_replace(Some(entry.clone()));
        }

        let ranked = self.insert_ranked(entry.clone()).await;
        last?;
        let rank = ranked?;

        log::info!(
            "Saved score {} for {} (rank {:?})",
            entry.score,
            entry.player_name,
            rank
        );
        Ok(SavedScore { entry, rank })
    }

    /// Read ranking, insert, write back; serialized by `ranking_lock`
    async fn insert_ranked(&self, entry: ScoreEntry) -> Result<Option<usize>, PersistenceError> {
        let _guard = self.ranking_lock.lock().await;

        let mut ranking = match self.backend.get(RANKING_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ScoreEntry>>(&raw) {
                Ok(entries) => Ranking::from_entries(entries),
                Err(source) => {
                    let err = PersistenceError::Decode {
                        key: RANKING_KEY.to_string(),
                        source,
                    };
                    log::warn!("{err}; starting a fresh ranking");
                    Ranking::new()
                }
            },
            Ok(None) => Ranking::new(),
            Err(e) => {
                // Keep what we last saw rather than wiping the stored list
                log::warn!("{e}; using last known ranking");
                self.current_ranking()
            }
        };

        let rank = ranking.insert(entry);
        self.write(RANKING_KEY, &ranking).await?;
        self.ranking.send_replace(ranking);
        Ok(rank)
    }
}
