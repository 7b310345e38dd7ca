//! Error types for the game engine and the persistence layer

/// Errors raised while building or playing a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Board or card selection violates the pairing invariant. Fatal for the (re)build.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    /// A position outside the board was addressed.
    #[error("position ({col}, {row}) is outside the {width}x{height} board")]
    Index {
        col: usize,
        row: usize,
        width: usize,
        height: usize,
    },
}

impl GameError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        GameError::Configuration {
            reason: reason.into(),
        }
    }
}

/// Errors raised by a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read key {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("failed to write key {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("failed to decode key {key}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode key {key}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
