//! Playback coordinator
//!
//! **Module Structure:**
//! - `core.rs`: task loop, source entry, demotion, idle transition
//! - `controls.rs`: pause, resume, stop, seek, speed
//! - `voice.rs`: neural voice synthesis and on-device segment playback
//!
//! The coordinator is a single tokio task owning the [`PlaybackSession`].
//! [`PlaybackCoordinator`] is a cheap handle; every method only enqueues a
//! command, so no call blocks the caller. Outcomes are observed through
//! [`PlaybackCoordinator::subscribe`] or [`PlaybackCoordinator::session`].

mod controls;
mod core;
mod voice;

use super::events::Command;
use super::traits::{MediaPlayer, OnDeviceSynthesizer};
use crate::cache::AudioCache;
use crate::error::{Error, Result};
use crate::markup::VoiceParams;
use crate::resolver::SourceResolver;
use crate::state::SharedState;
use crate::synthesis::NeuralVoicePipeline;
use cantor_common::{CantorEvent, ContentReference, EventBus, PlaybackSession, ResolvedSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;

pub(crate) use self::core::Coordinator;

/// Lowest accepted speed multiplier
pub const MIN_SPEED: f32 = 0.5;

/// Highest accepted speed multiplier
pub const MAX_SPEED: f32 = 2.0;

/// Everything the coordinator needs, injected by the host
pub struct CoordinatorDeps {
    pub player: Arc<dyn MediaPlayer>,
    pub on_device: Arc<dyn OnDeviceSynthesizer>,
    /// Neural voice path (markup, speech cache, remote service)
    pub neural_voice: Arc<NeuralVoicePipeline>,
    /// Cache consulted before streaming a URL (optional)
    pub stream_cache: Option<Arc<AudioCache>>,
    /// Used to pick the next tier on demotion
    pub resolver: SourceResolver,
    pub voice: VoiceParams,
    pub progress_interval: Duration,
    pub default_speed: f32,
    pub events: EventBus,
}

/// Handle to a running coordinator
#[derive(Clone)]
pub struct PlaybackCoordinator {
    tx: mpsc::UnboundedSender<Command>,
    state: Arc<SharedState>,
    resolver: SourceResolver,
}

impl PlaybackCoordinator {
    /// Spawn the coordinator task
    ///
    /// Must be called inside a tokio runtime. The task runs until
    /// [`shutdown`](Self::shutdown) is called.
    pub fn spawn(deps: CoordinatorDeps) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let speed = deps.default_speed.clamp(MIN_SPEED, MAX_SPEED);
        let state = Arc::new(SharedState::new(deps.events.clone(), speed));
        let resolver = deps.resolver.clone();

        let coordinator = Coordinator::new(deps, tx.clone(), state.clone(), speed);
        let task = tokio::spawn(coordinator.run(rx));

        (Self { tx, state, resolver }, task)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| Error::InvalidState("Playback coordinator has shut down".to_string()))
    }

    /// Play a resolved source, replacing whatever is playing
    pub fn play(&self, source: ResolvedSource) -> Result<()> {
        self.send(Command::Play(source))
    }

    /// Resolve `content` and play the best usable tier
    pub fn play_content(&self, content: ContentReference) -> Result<ResolvedSource> {
        let source = self.resolver.resolve_shared(Arc::new(content));
        self.play(source.clone())?;
        Ok(source)
    }

    /// No-op when idle or already paused
    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    /// No-op when idle or already playing
    pub fn resume(&self) -> Result<()> {
        self.send(Command::Resume)
    }

    /// Return to idle from any state and reset the session
    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Seek within the timeline; on the on-device voice `position` is a segment index
    pub fn seek(&self, position: u64) -> Result<()> {
        self.send(Command::Seek(position))
    }

    /// Set the speed multiplier, clamped to 0.5-2.0
    pub fn set_speed(&self, multiplier: f32) -> Result<()> {
        self.send(Command::SetSpeed(multiplier))
    }

    /// Stop playback and end the coordinator task
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    /// Latest session snapshot
    pub async fn session(&self) -> PlaybackSession {
        self.state.get_session().await
    }

    /// Receive every future event
    pub fn subscribe(&self) -> broadcast::Receiver<CantorEvent> {
        self.state.subscribe_events()
    }

    /// Future events as a `Stream`; lagging subscribers see an error item
    pub fn event_stream(&self) -> impl Stream<Item = std::result::Result<CantorEvent, BroadcastStreamRecvError>> {
        BroadcastStream::new(self.state.subscribe_events())
    }
}

pub(crate) fn clamp_speed(multiplier: f32) -> f32 {
    if multiplier.is_nan() {
        1.0
    } else {
        multiplier.clamp(MIN_SPEED, MAX_SPEED)
    }
}
