//! Session timer
//!
//! Whole-second elapsed counter for one session. Reads are computed from the
//! tokio clock, so they never depend on when the background task last ran;
//! the task only publishes the value once per second for observers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

/// Background publisher for a running timer
struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SessionTimer {
    /// Whole seconds accumulated by previous runs
    banked_secs: u64,
    /// Start of the current run, `None` while stopped
    started_at: Option<Instant>,
    ticker: Option<Ticker>,
    elapsed: Arc<watch::Sender<u64>>,
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTimer {
    /// A stopped timer at zero
    pub fn new() -> Self {
        Self {
            banked_secs: 0,
            started_at: None,
            ticker: None,
            elapsed: Arc::new(watch::channel(0).0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.banked_secs
            + self
                .started_at
                .map(|since| since.elapsed().as_secs())
                .unwrap_or(0)
    }

    /// Elapsed seconds, updated every second while running
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.elapsed.subscribe()
    }

    /// Start or resume counting from the current value. Must be called
    /// inside a tokio runtime.
    pub fn start(&mut self) {
        if self.started_at.is_some() {
            return;
        }
        let since = Instant::now();
        self.started_at = Some(since);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_ticker(
            self.banked_secs,
            since,
            self.elapsed.clone(),
            cancel.clone(),
        ));
        self.ticker = Some(Ticker { cancel, handle });
    }

    /// Stop counting and freeze the value.
    ///
    /// Returns only after the background task has finished, so no tick from
    /// this run can land afterwards.
    pub async fn stop(&mut self) {
        let Some(since) = self.started_at.take() else {
            return;
        };
        self.banked_secs += since.elapsed().as_secs();

        if let Some(ticker) = self.ticker.take() {
            ticker.cancel.cancel();
            if let Err(e) = ticker.handle.await {
                log::warn!("Session timer task ended abnormally: {e}");
            }
        }
        self.elapsed.send_replace(self.banked_secs);
    }

    pub async fn pause(&mut self) {
        self.stop().await;
    }

    /// Continue from the value held at the last pause
    pub fn resume(&mut self) {
        self.start();
    }

    /// Stop and return to zero
    pub async fn reset(&mut self) {
        self.stop().await;
        self.banked_secs = 0;
        self.elapsed.send_replace(0);
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel.cancel();
        }
    }
}

async fn run_ticker(
    base_secs: u64,
    since: Instant,
    elapsed: Arc<watch::Sender<u64>>,
    cancel: CancellationToken,
) {
    let mut interval = time::interval_at(since + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                elapsed.send_replace(base_secs + since.elapsed().as_secs());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_counts_while_running() {
        let mut timer = SessionTimer::new();
        assert_eq!(timer.elapsed_secs(), 0);
        assert!(!timer.is_running());

        timer.start();
        time::advance(Duration::from_millis(3_500)).await;
        assert_eq!(timer.elapsed_secs(), 3);

        let mut rx = timer.subscribe();
        rx.wait_for(|secs| *secs >= 3).await.unwrap();
        timer.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_has_no_drift() {
        let mut timer = SessionTimer::new();
        timer.start();
        time::advance(Duration::from_millis(2_700)).await;
        timer.stop().await;
        assert_eq!(timer.elapsed_secs(), 2);

        // Frozen while stopped
        time::advance(Duration::from_secs(30)).await;
        assert_eq!(timer.elapsed_secs(), 2);
        assert_eq!(*timer.subscribe().borrow(), 2);

        timer.start();
        time::advance(Duration::from_millis(999)).await;
        assert_eq!(timer.elapsed_secs(), 2);
        time::advance(Duration::from_millis(1)).await;
        assert_eq!(timer.elapsed_secs(), 3);
        timer.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_then_start_sees_no_stale_tick() {
        let mut timer = SessionTimer::new();
        timer.start();
        time::advance(Duration::from_secs(5)).await;

        timer.reset().await;
        assert_eq!(timer.elapsed_secs(), 0);
        let rx = timer.subscribe();
        assert_eq!(*rx.borrow(), 0);

        timer.start();
        time::advance(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert_eq!(*rx.borrow(), 0);
        assert_eq!(timer.elapsed_secs(), 0);
        timer.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let mut timer = SessionTimer::new();
        timer.start();
        time::advance(Duration::from_secs(2)).await;
        timer.start();
        time::advance(Duration::from_secs(1)).await;
        assert_eq!(timer.elapsed_secs(), 3);
        timer.stop().await;
        timer.stop().await;
        assert_eq!(timer.elapsed_secs(), 3);
    }
}
