//! Memory Tiles - headless demo
//!
//! Plays one session against the saved settings with a bot that remembers
//! every face it has seen, then prints the ranking.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use memory_tiles::audio::{AudioManager, LogSoundPlayer, spawn_cue_dispatcher};
use memory_tiles::highscores::format_date;
use memory_tiles::persistence::FileStore;
use memory_tiles::platform::{self, Clock, SystemClock};
use memory_tiles::sim::{BoardView, Position};
use memory_tiles::{GameEngine, GameError, RankingStore};

#[tokio::main]
async fn main() {
    env_logger::init();
    log::info!("Memory Tiles (headless) starting...");

    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SystemClock.now_millis() as u64);

    let dir = platform::data_dir().unwrap_or_else(|| PathBuf::from("."));
    log::info!("Data directory: {}", dir.display());
    let store = RankingStore::open(Arc::new(FileStore::new(dir))).await;

    if let Err(e) = run(store.clone(), seed).await {
        log::error!("Session aborted: {e}");
        std::process::exit(1);
    }

    let now = SystemClock.now_millis();
    println!("\nTop scores:");
    for (i, entry) in store.current_ranking().entries().iter().enumerate() {
        println!(
            "{:>2}. {:<20} {:>6}  {}",
            i + 1,
            entry.player_name,
            entry.score,
            format_date(entry.timestamp, now)
        );
    }
}

async fn run(store: Arc<RankingStore>, seed: u64) -> Result<(), GameError> {
    let engine = GameEngine::start(store, seed).await?;
    let cues = spawn_cue_dispatcher(engine.events(), AudioManager::new(Arc::new(LogSoundPlayer)));

    let mut board = engine.board();
    let mut seen: HashMap<String, Vec<Position>> = HashMap::new();
    let layout = board.borrow().clone();
    let mut unseen: Vec<Position> = positions(&layout).collect();
    unseen.reverse();

    while !*engine.won().borrow() {
        // A pair we already know about
        if let Some(pair) = seen.values().find(|p| p.len() == 2).cloned() {
            seen.retain(|_, p| p.len() < 2);
            engine.on_tap(pair[0]).await?;
            engine.on_tap(pair[1]).await?;
            continue;
        }

        let Some(first) = unseen.pop() else { break };
        engine.on_tap(first).await?;
        let face = face_at(&board.borrow(), first);
        if let Some(partner) = seen.remove(&face).and_then(|p| p.first().copied()) {
            engine.on_tap(partner).await?;
            continue;
        }

        let Some(second) = unseen.pop() else { break };
        let outcome = engine.on_tap(second).await?;
        let second_face = face_at(&board.borrow(), second);
        if outcome.revert.is_some() {
            seen.entry(face).or_default().push(first);
            seen.entry(second_face).or_default().push(second);
            // Wait for the mismatched pair to turn back down
            let _ = board
                .wait_for(|b| b.cells.iter().all(|c| c.matched || !c.face_up))
                .await;
        }
    }

    log::info!(
        "Finished: score {}, {} moves, {}s",
        *engine.score().borrow(),
        *engine.moves().borrow(),
        *engine.elapsed().borrow()
    );
    engine.shutdown().await;
    drop(engine);
    let _ = cues.await;
    Ok(())
}

fn positions(view: &BoardView) -> impl Iterator<Item = Position> + '_ {
    (0..view.height)
        .flat_map(move |row| (0..view.width).map(move |col| Position::new(col, row)))
}

fn face_at(view: &BoardView, pos: Position) -> String {
    view.cell(pos)
        .and_then(|c| c.face.clone())
        .unwrap_or_default()
}
