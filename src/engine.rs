//! Game engine
//!
//! Runs one session at a time on top of the pure state machine in `sim`.
//! All transitions (taps, pause, reset, revert completion) go through the
//! session mutex, so they never interleave. The mismatch revert and the
//! timer tick are the only work scheduled in the background; the revert
//! re-enters through the same mutex before touching the board.

use std::sync::Arc;
use std::time::Duration;

use rand_pcg::Pcg32;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::consts::{EVENT_CHANNEL_CAPACITY, REVERT_DELAY_MS};
use crate::error::GameError;
use crate::persistence::RankingStore;
use crate::sim::{BoardView, GameEvent, GameState, Position, RngState, TapOutcome, turn};
use crate::timer::SessionTimer;

struct Session {
    state: GameState,
    timer: SessionTimer,
    rng: Pcg32,
    /// Bumped on every rebuild so stale background work can tell
    generation: u64,
    /// Cancelled when the session is rebuilt or torn down
    cancel: CancellationToken,
    revert_task: Option<JoinHandle<()>>,
}

/// Observable outputs for the rendering side
struct Channels {
    score: watch::Sender<i64>,
    moves: watch::Sender<u32>,
    board: watch::Sender<BoardView>,
    paused: watch::Sender<bool>,
    won: watch::Sender<bool>,
    reset_requested: watch::Sender<bool>,
    background: watch::Sender<String>,
    events: broadcast::Sender<GameEvent>,
}

fn set<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            return false;
        }
        *current = value;
        true
    });
}

impl Channels {
    fn new(state: &GameState) -> Self {
        Self {
            score: watch::channel(state.score).0,
            moves: watch::channel(state.moves).0,
            board: watch::channel(state.view()).0,
            paused: watch::channel(state.paused).0,
            won: watch::channel(state.won()).0,
            reset_requested: watch::channel(state.reset_requested).0,
            background: watch::channel(state.background.clone()).0,
            events: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
        }
    }

    fn publish(&self, state: &GameState) {
        set(&self.score, state.score);
        set(&self.moves, state.moves);
        set(&self.board, state.view());
        set(&self.paused, state.paused);
        set(&self.won, state.won());
        set(&self.reset_requested, state.reset_requested);
        set(&self.background, state.background.clone());
    }

    fn emit(&self, events: &[GameEvent]) {
        for event in events {
            // No subscribers is fine
            let _ = self.events.send(*event);
        }
    }
}

pub struct GameEngine {
    session: Arc<Mutex<Session>>,
    channels: Arc<Channels>,
    elapsed: watch::Receiver<u64>,
    store: Arc<RankingStore>,
}

impl GameEngine {
    /// Start a session from the store's current settings.
    ///
    /// Waits for the store to finish loading so defaults are never mistaken
    /// for saved settings.
    pub async fn start(store: Arc<RankingStore>, seed: u64) -> Result<Self, GameError> {
        store.wait_until_loaded().await;
        let config = store
            .game_config()
            .inspect_err(|e| log::error!("Cannot start session: {e}"))?;

        let mut rng = RngState::new(seed).to_rng();
        let state = GameState::from_config(&config, &mut rng)?;
        log::info!(
            "Session started: {}x{} board, {} pairs, seed {}",
            config.width,
            config.height,
            config.pair_count,
            seed
        );
        Ok(Self::launch(store, state, rng))
    }

    /// Start a session over a prepared state (fixed layouts, restored runs).
    /// Must be called inside a tokio runtime.
    pub fn start_with_state(store: Arc<RankingStore>, state: GameState, seed: u64) -> Self {
        Self::launch(store, state, RngState::new(seed).to_rng())
    }

    fn launch(store: Arc<RankingStore>, state: GameState, rng: Pcg32) -> Self {
        let mut timer = SessionTimer::new();
        let elapsed = timer.subscribe();
        if !state.paused {
            timer.start();
        }
        let channels = Arc::new(Channels::new(&state));
        Self {
            session: Arc::new(Mutex::new(Session {
                state,
                timer,
                rng,
                generation: 0,
                cancel: CancellationToken::new(),
                revert_task: None,
            })),
            channels,
            elapsed,
            store,
        }
    }

    // === Observables ===

    pub fn score(&self) -> watch::Receiver<i64> {
        self.channels.score.subscribe()
    }

    pub fn moves(&self) -> watch::Receiver<u32> {
        self.channels.moves.subscribe()
    }

    pub fn elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed.clone()
    }

    pub fn board(&self) -> watch::Receiver<BoardView> {
        self.channels.board.subscribe()
    }

    pub fn paused(&self) -> watch::Receiver<bool> {
        self.channels.paused.subscribe()
    }

    pub fn won(&self) -> watch::Receiver<bool> {
        self.channels.won.subscribe()
    }

    pub fn reset_requested(&self) -> watch::Receiver<bool> {
        self.channels.reset_requested.subscribe()
    }

    pub fn background(&self) -> watch::Receiver<String> {
        self.channels.background.subscribe()
    }

    /// One-shot cues; each occurrence is delivered once per subscriber
    pub fn events(&self) -> broadcast::Receiver<GameEvent> {
        self.channels.events.subscribe()
    }

    // === Input ===

    /// Handle a tap on `pos`.
    ///
    /// Ignored taps return an outcome with `accepted == false`. On the winning
    /// tap the timer stops and the score is saved to the ranking.
    pub async fn on_tap(&self, pos: Position) -> Result<TapOutcome, GameError> {
        let mut session = self.session.lock().await;
        let elapsed = session.timer.elapsed_secs();
        let outcome = turn::tap(&mut session.state, pos, elapsed)
            .inspect_err(|e| log::error!("Rejected tap: {e}"))?;
        if !outcome.accepted {
            log::debug!("Ignored tap at ({}, {})", pos.col, pos.row);
            return Ok(outcome);
        }

        if let Some((first, second)) = outcome.revert {
            self.schedule_revert(&mut session, first, second);
        }
        let final_score = if outcome.won() {
            session.timer.stop().await;
            Some(session.state.score)
        } else {
            None
        };

        self.channels.publish(&session.state);
        self.channels.emit(&outcome.events);
        drop(session);

        if let Some(score) = final_score {
            self.record_score(score).await;
        }
        Ok(outcome)
    }

    fn schedule_revert(&self, session: &mut Session, first: Position, second: Position) {
        let generation = session.generation;
        let cancel = session.cancel.clone();
        let shared = self.session.clone();
        let channels = self.channels.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = time::sleep(Duration::from_millis(REVERT_DELAY_MS)) => {
                    let mut session = shared.lock().await;
                    if session.generation != generation || cancel.is_cancelled() {
                        return;
                    }
                    match turn::finish_revert(&mut session.state, first, second) {
                        Ok(true) => channels.publish(&session.state),
                        Ok(false) => {}
                        Err(e) => log::error!("Revert failed: {e}"),
                    }
                }
            }
        });
        session.revert_task = Some(handle);
    }

    async fn record_score(&self, score: i64) {
        let name = self.store.settings().player_name;
        match self.store.save_score(&name, score).await {
            Ok(saved) => log::info!(
                "Session won by {} with {} points (rank {:?})",
                saved.entry.player_name,
                saved.entry.score,
                saved.rank
            ),
            Err(e) => log::error!("Failed to save score {score} for {name}: {e}"),
        }
    }

    /// Toggle pause, stopping or resuming the session timer.
    ///
    /// Returns the new pause flag, or `None` once the session is won. A
    /// pending revert keeps running either way.
    pub async fn request_pause(&self) -> Option<bool> {
        let mut session = self.session.lock().await;
        let paused = turn::toggle_pause(&mut session.state)?;
        if paused {
            session.timer.pause().await;
        } else {
            session.timer.resume();
        }
        self.channels.publish(&session.state);
        log::debug!("Paused: {paused}");
        Some(paused)
    }

    /// Ask for a reset; nothing changes until `confirm_reset`
    pub async fn request_reset(&self) {
        let mut session = self.session.lock().await;
        session.state.reset_requested = true;
        self.channels.publish(&session.state);
    }

    pub async fn cancel_reset(&self) {
        let mut session = self.session.lock().await;
        session.state.reset_requested = false;
        self.channels.publish(&session.state);
    }

    /// Rebuild the session from the store's current settings.
    ///
    /// Returns `Ok(false)` if no reset was requested. A configuration error
    /// leaves the running session untouched.
    pub async fn confirm_reset(&self) -> Result<bool, GameError> {
        let stale = {
            let mut session = self.session.lock().await;
            if !session.state.reset_requested {
                return Ok(false);
            }

            let config = self
                .store
                .game_config()
                .inspect_err(|e| log::error!("Cannot rebuild session: {e}"))?;
            let state = GameState::from_config(&config, &mut session.rng)?;

            // Outstanding reverts belong to the old board
            session.cancel.cancel();
            session.cancel = CancellationToken::new();
            session.generation += 1;
            let stale = session.revert_task.take();

            session.state = state;
            session.timer.reset().await;
            session.timer.start();
            self.channels.publish(&session.state);
            log::info!(
                "Session reset: {}x{} board, {} pairs",
                config.width,
                config.height,
                config.pair_count
            );
            stale
        };
        // The old revert may be queued on the session lock, so wait outside it
        join_revert(stale).await;
        Ok(true)
    }

    /// Tear the session down, waiting for background work to finish
    pub async fn shutdown(&self) {
        let revert = {
            let mut session = self.session.lock().await;
            session.cancel.cancel();
            session.timer.stop().await;
            session.revert_task.take()
        };
        join_revert(revert).await;
        log::info!("Session shut down");
    }
}

async fn join_revert(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        if let Err(e) = handle.await {
            log::warn!("Revert task ended abnormally: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::platform::FixedClock;
    use crate::sim::{Board, Phase};
    use tokio::sync::broadcast::error::TryRecvError;

    async fn loaded_store() -> Arc<RankingStore> {
        let store = Arc::new(RankingStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FixedClock::new(1_000, 1)),
        ));
        store.load().await;
        store
    }

    async fn engine_with(width: usize, height: usize, ids: &[u32]) -> GameEngine {
        let board = Board::from_pair_ids(width, height, ids).unwrap();
        let faces = (0..board.pair_count())
            .map(|i| format!("card_{i:02}"))
            .collect();
        let state = GameState::new(board, faces, "background_01".to_string());
        GameEngine::start_with_state(loaded_store().await, state, 7)
    }

    fn drain(rx: &mut broadcast::Receiver<GameEvent>) -> Vec<GameEvent> {
        let mut out = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Empty) => return out,
                Err(e) => panic!("unexpected receive error: {e}"),
            }
        }
    }

    fn p(col: usize, row: usize) -> Position {
        Position::new(col, row)
    }

    async fn phase(engine: &GameEngine) -> Phase {
        engine.session.lock().await.state.phase
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_from_store_settings() {
        let engine = GameEngine::start(loaded_store().await, 99).await.unwrap();
        let board = engine.board().borrow().clone();
        assert_eq!((board.width, board.height), (4, 5));
        assert!(board.cells.iter().all(|c| !c.face_up && c.face.is_none()));
        assert_eq!(*engine.background().borrow(), "background_01");
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_invalid_settings() {
        let store = loaded_store().await;
        store.save_board_dimensions(3, 3).await.unwrap();
        let err = GameEngine::start(store, 1).await.err().unwrap();
        assert!(matches!(err, GameError::Configuration { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_pair() {
        let engine = engine_with(2, 2, &[0, 0, 1, 1]).await;
        let mut events = engine.events();
        time::advance(Duration::from_secs(5)).await;

        engine.on_tap(p(0, 0)).await.unwrap();
        engine.on_tap(p(1, 0)).await.unwrap();

        assert_eq!(
            drain(&mut events),
            vec![GameEvent::Flip, GameEvent::Flip, GameEvent::Success]
        );
        let board = engine.board().borrow().clone();
        assert!(board.cell(p(0, 0)).unwrap().matched);
        assert!(board.cell(p(1, 0)).unwrap().matched);
        assert_eq!(
            board.cell(p(0, 0)).unwrap().face.as_deref(),
            Some("card_00")
        );
        assert_eq!(*engine.moves().borrow(), 2);
        assert_eq!(*engine.score().borrow(), 12 - 1);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reselecting_pending_card() {
        let engine = engine_with(2, 2, &[0, 0, 1, 1]).await;
        time::advance(Duration::from_secs(4)).await;

        engine.on_tap(p(0, 0)).await.unwrap();
        engine.on_tap(p(0, 0)).await.unwrap();

        assert!(!engine.board().borrow().cell(p(0, 0)).unwrap().face_up);
        assert_eq!(*engine.moves().borrow(), 2);
        assert_eq!(*engine.score().borrow(), -(1 + 2));
        assert_eq!(phase(&engine).await, Phase::Idle);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatch_reverts_after_delay() {
        let ids: Vec<u32> = (0..10).flat_map(|id| [id, id]).collect();
        let engine = engine_with(4, 5, &ids).await;
        let mut events = engine.events();
        let mut board = engine.board();

        engine.on_tap(p(0, 0)).await.unwrap();
        let outcome = engine.on_tap(p(2, 0)).await.unwrap();
        assert_eq!(outcome.revert, Some((p(0, 0), p(2, 0))));
        assert_eq!(
            drain(&mut events),
            vec![GameEvent::Flip, GameEvent::Flip, GameEvent::Failure]
        );
        let score = *engine.score().borrow();
        assert_eq!(score, -3);

        // Taps during the revert change nothing
        let ignored = engine.on_tap(p(1, 1)).await.unwrap();
        assert!(!ignored.accepted);
        assert_eq!(*engine.moves().borrow(), 2);

        time::advance(Duration::from_millis(REVERT_DELAY_MS - 1)).await;
        assert!(board.borrow().cell(p(0, 0)).unwrap().face_up);
        assert!(board.borrow().cell(p(2, 0)).unwrap().face_up);

        time::advance(Duration::from_millis(1)).await;
        board
            .wait_for(|b| !b.cell(p(0, 0)).unwrap().face_up)
            .await
            .unwrap();
        assert!(!board.borrow().cell(p(2, 0)).unwrap().face_up);
        assert_eq!(phase(&engine).await, Phase::Idle);
        assert_eq!(*engine.score().borrow(), score);
        assert!(drain(&mut events).is_empty());
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_does_not_cancel_revert() {
        let engine = engine_with(2, 2, &[0, 1, 0, 1]).await;
        engine.on_tap(p(0, 0)).await.unwrap();
        engine.on_tap(p(1, 0)).await.unwrap();
        assert_eq!(engine.request_pause().await, Some(true));

        let mut board = engine.board();
        time::advance(Duration::from_millis(REVERT_DELAY_MS)).await;
        board
            .wait_for(|b| b.cells.iter().all(|c| !c.face_up))
            .await
            .unwrap();
        assert!(*engine.paused().borrow());
        assert_eq!(phase(&engine).await, Phase::Idle);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_taps_ignored_while_paused() {
        let engine = engine_with(2, 2, &[0, 0, 1, 1]).await;
        engine.request_pause().await;
        let outcome = engine.on_tap(p(0, 0)).await.unwrap();
        assert!(!outcome.accepted);
        assert_eq!(*engine.moves().borrow(), 0);
        assert!(!engine.board().borrow().cell(p(0, 0)).unwrap().face_up);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_pause_resumes_without_drift() {
        let engine = engine_with(2, 2, &[0, 0, 1, 1]).await;
        time::advance(Duration::from_secs(3)).await;

        assert_eq!(engine.request_pause().await, Some(true));
        time::advance(Duration::from_secs(20)).await;
        assert_eq!(*engine.elapsed().borrow(), 3);

        assert_eq!(engine.request_pause().await, Some(false));
        assert!(!*engine.paused().borrow());
        time::advance(Duration::from_secs(1)).await;
        // Scoring sees 4 seconds, not 24
        engine.on_tap(p(0, 0)).await.unwrap();
        engine.on_tap(p(1, 0)).await.unwrap();
        assert_eq!(*engine.score().borrow(), 12);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_win_fires_once_and_saves_score() {
        let store = loaded_store().await;
        store.save_player_name("Ada").await.unwrap();
        let board = Board::from_pair_ids(2, 2, &[0, 1, 0, 1]).unwrap();
        let faces = vec!["sun".to_string(), "moon".to_string()];
        let state = GameState::new(board, faces, "bg".to_string());
        let engine = GameEngine::start_with_state(store.clone(), state, 3);
        let mut events = engine.events();

        engine.on_tap(p(0, 0)).await.unwrap();
        engine.on_tap(p(0, 1)).await.unwrap();
        assert!(!*engine.won().borrow());
        engine.on_tap(p(1, 0)).await.unwrap();
        let last = engine.on_tap(p(1, 1)).await.unwrap();
        assert!(last.won());

        let wins = drain(&mut events)
            .into_iter()
            .filter(|e| *e == GameEvent::Win)
            .count();
        assert_eq!(wins, 1);
        assert!(*engine.won().borrow());
        assert!(*engine.paused().borrow());
        assert_eq!(engine.request_pause().await, None);

        let ranking = store.current_ranking();
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking.entries()[0].player_name, "Ada");
        assert_eq!(ranking.entries()[0].score, *engine.score().borrow());
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_needs_confirmation() {
        let engine = engine_with(2, 2, &[0, 0, 1, 1]).await;
        time::advance(Duration::from_secs(2)).await;
        engine.on_tap(p(0, 0)).await.unwrap();
        engine.on_tap(p(0, 0)).await.unwrap();

        assert_eq!(engine.confirm_reset().await, Ok(false));
        assert_eq!(*engine.moves().borrow(), 2);

        engine.request_reset().await;
        assert!(*engine.reset_requested().borrow());
        engine.cancel_reset().await;
        assert!(!*engine.reset_requested().borrow());
        assert_eq!(*engine.moves().borrow(), 2);

        engine.request_reset().await;
        assert_eq!(engine.confirm_reset().await, Ok(true));
        assert_eq!(*engine.moves().borrow(), 0);
        assert_eq!(*engine.score().borrow(), 0);
        assert_eq!(*engine.elapsed().borrow(), 0);
        assert!(!*engine.reset_requested().borrow());
        // Rebuilt from the store's 4x5 default
        let board = engine.board().borrow().clone();
        assert_eq!((board.width, board.height), (4, 5));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_discards_pending_revert() {
        let engine = engine_with(2, 2, &[0, 1, 0, 1]).await;
        engine.on_tap(p(0, 0)).await.unwrap();
        engine.on_tap(p(1, 0)).await.unwrap();
        // The pending revert holds a handle on the session until it ends
        assert_eq!(Arc::strong_count(&engine.session), 2);
        engine.request_reset().await;
        engine.confirm_reset().await.unwrap();
        assert_eq!(Arc::strong_count(&engine.session), 1);

        engine.on_tap(p(3, 4)).await.unwrap();
        time::advance(Duration::from_millis(REVERT_DELAY_MS * 2)).await;
        tokio::task::yield_now().await;
        // The stale revert must not flip the new board's pending card
        assert!(engine.board().borrow().cell(p(3, 4)).unwrap().face_up);
        assert_eq!(phase(&engine).await, Phase::AwaitingPartner(p(3, 4)));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_with_bad_settings_keeps_session() {
        let store = loaded_store().await;
        let board = Board::from_pair_ids(2, 2, &[0, 0, 1, 1]).unwrap();
        let state = GameState::new(board, vec!["a".into(), "b".into()], "bg".into());
        let engine = GameEngine::start_with_state(store.clone(), state, 1);
        engine.on_tap(p(0, 0)).await.unwrap();

        store
            .save_selected_cards(["a".to_string()].into_iter().collect())
            .await
            .unwrap();
        engine.request_reset().await;
        let err = engine.confirm_reset().await.unwrap_err();
        assert!(matches!(err, GameError::Configuration { .. }));
        assert_eq!(*engine.moves().borrow(), 1);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_tap_is_an_error() {
        let engine = engine_with(2, 2, &[0, 0, 1, 1]).await;
        let err = engine.on_tap(p(9, 9)).await.unwrap_err();
        assert!(matches!(err, GameError::Index { .. }));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_background_work() {
        let engine = engine_with(2, 2, &[0, 1, 0, 1]).await;
        engine.on_tap(p(0, 0)).await.unwrap();
        engine.on_tap(p(1, 0)).await.unwrap();
        engine.shutdown().await;

        let session = engine.session.lock().await;
        assert!(!session.timer.is_running());
        assert!(session.revert_task.is_none());
        // Cancelled before it fired
        assert!(session.state.revert_pending());
    }
}
