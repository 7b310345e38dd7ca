//! Persistence for settings and the score ranking
//!
//! Features:
//! - Abstract async key-value backend (`KeyValueStore`)
//! - In-memory backend for tests, JSON file backend for native builds
//! - `RankingStore`: reactive settings/ranking values with serialized ranking updates

pub mod file;
pub mod memory;
pub mod store;

use async_trait::async_trait;

pub use crate::error::PersistenceError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{RankingStore, SavedScore};

/// Persistent string key-value storage.
///
/// Each `put` is an atomic upsert of one key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Load a value by key.
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Save a value by key.
    async fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}
