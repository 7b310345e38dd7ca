//! Platform abstraction layer
//!
//! Handles host differences for:
//! - Wall-clock time (score timestamps)
//! - Where native builds keep their data

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// The host clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
            Err(e) => {
                log::warn!("System clock is before the Unix epoch: {e}");
                0
            }
        }
    }
}

/// Manually driven clock; every read advances it by `step` ms
#[derive(Debug)]
pub struct FixedClock {
    now: AtomicI64,
    step: i64,
}

impl FixedClock {
    pub fn new(start: i64, step: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
            step,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

/// Directory for persisted game data on native hosts.
///
/// `MEMORY_TILES_DATA_DIR` overrides the default `$HOME/.config/memory-tiles`.
pub fn data_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("MEMORY_TILES_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join("memory-tiles"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_steps() {
        let clock = FixedClock::new(1_000, 5);
        assert_eq!(clock.now_millis(), 1_000);
        assert_eq!(clock.now_millis(), 1_005);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
