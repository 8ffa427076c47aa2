//! Event types for the Cantor event system
//!
//! Provides shared event definitions and the EventBus used by the playback
//! coordinator to publish state to any number of subscribers.

mod session_types;

pub use session_types::{PlaybackMode, PlaybackSession};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::content::Tier;

/// Failure categories reported to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FailureKind {
    /// Neither audio nor text was available
    ResolutionExhausted,
    /// Socket, connect or timeout failure during synthesis
    TransportFailure,
    /// Zero-byte synthesis result despite a success signal
    EmptySynthesis,
    /// Cache could not be written (non-fatal)
    CacheWriteFailure,
    /// Player or on-device synthesizer reported an error
    PlaybackFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::ResolutionExhausted => write!(f, "ResolutionExhausted"),
            FailureKind::TransportFailure => write!(f, "TransportFailure"),
            FailureKind::EmptySynthesis => write!(f, "EmptySynthesis"),
            FailureKind::CacheWriteFailure => write!(f, "CacheWriteFailure"),
            FailureKind::PlaybackFailure => write!(f, "PlaybackFailure"),
        }
    }
}

/// Cantor event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so a
/// host can forward them over any transport without a UI-framework binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CantorEvent {
    /// Coordinator moved between modes (e.g. Streaming -> NeuralVoice)
    ModeChanged {
        old_mode: PlaybackMode,
        new_mode: PlaybackMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Snapshot of the playback session
    ///
    /// Emitted on every transition, on pause/resume/seek/speed changes, and on
    /// each progress sample while playing.
    SessionUpdated {
        session: PlaybackSession,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A tier started producing audio
    SourceStarted {
        content_id: String,
        tier: Tier,
        display_label: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback failed on one tier and was retried on a lower one
    FallbackOccurred {
        content_id: String,
        from_tier: Tier,
        to_tier: Tier,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Final frame or segment played; coordinator is Idle again.
    /// Whether to continue with another item is the caller's decision.
    Finished {
        content_id: String,
        tier: Tier,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Terminal, caller-visible failure; coordinator is Idle again
    PlaybackError {
        content_id: Option<String>,
        kind: FailureKind,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Cache entries removed to respect the size budget
    CacheEvicted {
        namespace: String,
        evicted_entries: usize,
        freed_bytes: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CantorEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            CantorEvent::ModeChanged { .. } => "ModeChanged",
            CantorEvent::SessionUpdated { .. } => "SessionUpdated",
            CantorEvent::SourceStarted { .. } => "SourceStarted",
            CantorEvent::FallbackOccurred { .. } => "FallbackOccurred",
            CantorEvent::Finished { .. } => "Finished",
            CantorEvent::PlaybackError { .. } => "PlaybackError",
            CantorEvent::CacheEvicted { .. } => "CacheEvicted",
        }
    }
}

/// Broadcast bus for [`CantorEvent`]s
///
/// Subscribers only see events emitted after they subscribe. Slow
/// subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CantorEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use cantor_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CantorEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CantorEvent,
    ) -> Result<usize, broadcast::error::SendError<CantorEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CantorEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
