//! Shared playback state
//!
//! Latest session snapshot plus the event bus. The coordinator task is the
//! only writer; any number of readers take snapshots or subscribe.

use cantor_common::{CantorEvent, EventBus, PlaybackSession};
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};

/// Shared state accessible by the coordinator and its handles
///
/// Uses RwLock for concurrent read access with rare writes
pub struct SharedState {
    session: RwLock<PlaybackSession>,

    /// Event broadcaster for subscribers
    events: EventBus,
}

impl SharedState {
    pub fn new(events: EventBus, speed_multiplier: f32) -> Self {
        Self {
            session: RwLock::new(PlaybackSession::idle(speed_multiplier)),
            events,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: CantorEvent) {
        // No receivers is OK
        self.events.emit_lossy(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CantorEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Latest session snapshot
    pub async fn get_session(&self) -> PlaybackSession {
        self.session.read().await.clone()
    }

    /// Store a new snapshot and broadcast it
    pub async fn publish_session(&self, session: PlaybackSession) {
        *self.session.write().await = session.clone();
        self.broadcast_event(CantorEvent::SessionUpdated {
            session,
            timestamp: Utc::now(),
        });
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(EventBus::new(100), 1.0)
    }
}
