//! Error types for mixtube-playback
//!
//! Precondition violations (`InvalidState`, `InvalidInput`,
//! `UnsupportedProvider`, `ForeignObject`) are programmer errors and are
//! never retried. `Load` failures are recovered by the sequencer, which moves
//! on to the next entry.

use thiserror::Error;

/// Main error type for mixtube-playback
///
/// `Clone` so a single memoized load outcome can be handed to every caller
/// awaiting it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operation called in a lifecycle state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No player can be built for this provider
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Object released to a pool that never handed it out
    #[error("Foreign object: {0}")]
    ForeignObject(String),

    /// A player rejected a video
    #[error("Load failed for {video}: {reason}")]
    Load { video: String, reason: String },

    /// Player backend failure outside of loading
    #[error("Player error: {0}")]
    Player(String),

    /// Pool went away while a caller was waiting for an object
    #[error("Pool closed: {0}")]
    PoolClosed(String),

    /// Settings error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<mixtube_common::Error> for Error {
    fn from(err: mixtube_common::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Convenience Result type using mixtube-playback Error
pub type Result<T> = std::result::Result<T, Error>;
