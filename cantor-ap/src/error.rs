//! Error types for cantor-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use cantor_common::FailureKind;
use thiserror::Error;

/// Main error type for cantor-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Neither audio nor text present for a content item (caller bug)
    #[error("Resolution exhausted: {0}")]
    ResolutionExhausted(String),

    /// Socket, connect or timeout failure during synthesis
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Synthesis signalled success but produced no audio
    #[error("Synthesis returned no audio")]
    EmptySynthesis,

    /// Malformed frame or message from the voice service
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Cache entry could not be written (disk full, permissions)
    #[error("Cache write failed: {0}")]
    CacheWrite(String),

    /// Player or on-device synthesizer reported an error
    #[error("Playback error: {0}")]
    Playback(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Errors from cantor-common
    #[error(transparent)]
    Common(#[from] cantor_common::Error),
}

impl Error {
    /// True when playback can recover by demoting to a lower tier
    ///
    /// Empty synthesis and protocol errors count as transport failures.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::EmptySynthesis | Error::Protocol(_) | Error::Playback(_)
        )
    }

    /// Category reported to event subscribers
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::ResolutionExhausted(_) => FailureKind::ResolutionExhausted,
            Error::Transport(_) | Error::Protocol(_) => FailureKind::TransportFailure,
            Error::EmptySynthesis => FailureKind::EmptySynthesis,
            Error::CacheWrite(_) => FailureKind::CacheWriteFailure,
            _ => FailureKind::PlaybackFailure,
        }
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

/// Convenience Result type using cantor-ap Error
pub type Result<T> = std::result::Result<T, Error>;
