//! Coordinator wired to fakes, plus waiting helpers

use super::fakes::{CountingSpeechService, RecordingPlayer, ScriptedSynthesizer, SpeakBehavior};
use cantor_ap::cache::{AudioCache, SPEECH_NAMESPACE, STREAM_NAMESPACE};
use cantor_ap::markup::VoiceParams;
use cantor_ap::synthesis::NeuralVoicePipeline;
use cantor_ap::{CoordinatorDeps, PlaybackCoordinator, SourceResolver};
use cantor_common::{CantorEvent, EventBus, PlaybackSession};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

const CACHE_BUDGET: u64 = 1024 * 1024;

pub struct HarnessBuilder {
    speak: SpeakBehavior,
    service: Option<CountingSpeechService>,
    neural_voice_enabled: bool,
    progress_interval: Duration,
    default_speed: f32,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            speak: SpeakBehavior::Complete,
            service: None,
            neural_voice_enabled: true,
            progress_interval: Duration::from_millis(20),
            default_speed: 1.0,
        }
    }
}

impl HarnessBuilder {
    pub fn speak(mut self, behavior: SpeakBehavior) -> Self {
        self.speak = behavior;
        self
    }

    pub fn service(mut self, service: CountingSpeechService) -> Self {
        self.service = Some(service);
        self
    }

    pub fn neural_voice_enabled(mut self, enabled: bool) -> Self {
        self.neural_voice_enabled = enabled;
        self
    }

    pub fn default_speed(mut self, speed: f32) -> Self {
        self.default_speed = speed;
        self
    }

    pub async fn build(self) -> Harness {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let events = EventBus::new(1000);

        let speech_cache = Arc::new(
            AudioCache::open(SPEECH_NAMESPACE, dir.path().join(SPEECH_NAMESPACE), CACHE_BUDGET)
                .await
                .expect("Failed to open speech cache")
                .with_events(events.clone()),
        );
        let stream_cache = Arc::new(
            AudioCache::open(STREAM_NAMESPACE, dir.path().join(STREAM_NAMESPACE), CACHE_BUDGET)
                .await
                .expect("Failed to open stream cache"),
        );

        let player = Arc::new(RecordingPlayer::new());
        let synth = Arc::new(ScriptedSynthesizer::new(self.speak));
        let service = Arc::new(
            self.service
                .unwrap_or_else(|| CountingSpeechService::returning(b"ID3 neural audio")),
        );
        let pipeline = Arc::new(NeuralVoicePipeline::new(
            speech_cache.clone(),
            service.clone(),
            Duration::from_secs(2),
        ));

        let deps = CoordinatorDeps {
            player: player.clone(),
            on_device: synth.clone(),
            neural_voice: pipeline,
            stream_cache: Some(stream_cache.clone()),
            resolver: SourceResolver::new(self.neural_voice_enabled),
            voice: VoiceParams::new("hi-IN-MadhurNeural"),
            progress_interval: self.progress_interval,
            default_speed: self.default_speed,
            events,
        };
        let (coordinator, task) = PlaybackCoordinator::spawn(deps);
        let events = coordinator.subscribe();

        Harness {
            coordinator,
            task,
            events,
            player,
            synth,
            service,
            speech_cache,
            stream_cache,
            dir,
        }
    }
}

pub struct Harness {
    pub coordinator: PlaybackCoordinator,
    pub task: JoinHandle<()>,
    pub events: broadcast::Receiver<CantorEvent>,
    pub player: Arc<RecordingPlayer>,
    pub synth: Arc<ScriptedSynthesizer>,
    pub service: Arc<CountingSpeechService>,
    pub speech_cache: Arc<AudioCache>,
    pub stream_cache: Arc<AudioCache>,
    pub dir: TempDir,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Next event matching `predicate`
    pub async fn expect_event<F>(&mut self, predicate: F) -> CantorEvent
    where
        F: Fn(&CantorEvent) -> bool,
    {
        wait_for_event(&mut self.events, predicate, WAIT).await
    }

    /// Poll the session until `predicate` holds
    pub async fn expect_session<F>(&self, predicate: F) -> PlaybackSession
    where
        F: Fn(&PlaybackSession) -> bool,
    {
        wait_for_session(&self.coordinator, predicate, WAIT).await
    }

    pub async fn shutdown(self) {
        let _ = self.coordinator.shutdown();
        let _ = tokio::time::timeout(WAIT, self.task).await;
    }
}

/// Receive events until one matches; panics on timeout
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<CantorEvent>,
    predicate: F,
    timeout: Duration,
) -> CantorEvent
where
    F: Fn(&CantorEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(event)) if predicate(&event) => return event,
            Ok(Ok(_)) => {}
            Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                panic!("Event receiver lagged by {} events", n)
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => panic!("Event bus closed"),
            Err(_) => panic!("Timed out waiting for event"),
        }
    }
}

/// Poll the session snapshot until one matches; panics on timeout
pub async fn wait_for_session<F>(
    coordinator: &PlaybackCoordinator,
    predicate: F,
    timeout: Duration,
) -> PlaybackSession
where
    F: Fn(&PlaybackSession) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let session = coordinator.session().await;
        if predicate(&session) {
            return session;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("Timed out waiting for session, last: {:?}", session);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
