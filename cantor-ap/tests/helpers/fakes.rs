//! In-process fakes for the coordinator's collaborators

use async_trait::async_trait;
use cantor_ap::markup::Script;
use cantor_ap::playback::{MediaPlayer, OnDeviceSynthesizer, PlayerCallbacks, UtteranceCallbacks};
use cantor_ap::synthesis::{MediaSource, SpeechService};
use cantor_ap::{Error, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Player that records calls and lets the test fire callbacks
#[derive(Default)]
pub struct RecordingPlayer {
    plays: Mutex<Vec<MediaSource>>,
    calls: Mutex<Vec<String>>,
    callbacks: Mutex<Option<PlayerCallbacks>>,
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plays(&self) -> Vec<MediaSource> {
        self.plays.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_timeline(&self, position_ms: u64, duration_ms: u64) {
        self.position_ms.store(position_ms, Ordering::SeqCst);
        self.duration_ms.store(duration_ms, Ordering::SeqCst);
    }

    /// Report an error for the media currently loaded
    pub fn fail(&self, message: &str) {
        if let Some(callbacks) = self.callbacks.lock().unwrap().as_ref() {
            callbacks.failed(message);
        }
    }

    /// Report the end of the media currently loaded
    pub fn complete(&self) {
        if let Some(callbacks) = self.callbacks.lock().unwrap().as_ref() {
            callbacks.completed();
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MediaPlayer for RecordingPlayer {
    fn play(&self, media: MediaSource, callbacks: PlayerCallbacks) -> Result<()> {
        self.record(format!("play {}", media.describe()));
        self.plays.lock().unwrap().push(media);
        *self.callbacks.lock().unwrap() = Some(callbacks);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.record("pause".to_string());
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.record("resume".to_string());
        Ok(())
    }

    fn stop(&self) {
        self.record("stop".to_string());
    }

    fn seek(&self, position_ms: u64) -> Result<()> {
        self.record(format!("seek {}", position_ms));
        let duration_ms = self.duration_ms.load(Ordering::SeqCst);
        let landed = if duration_ms > 0 { position_ms.min(duration_ms) } else { position_ms };
        self.position_ms.store(landed, Ordering::SeqCst);
        Ok(())
    }

    fn set_speed(&self, multiplier: f32) -> Result<()> {
        self.record(format!("speed {}", multiplier));
        Ok(())
    }

    fn position_ms(&self) -> u64 {
        self.position_ms.load(Ordering::SeqCst)
    }

    fn duration_ms(&self) -> u64 {
        self.duration_ms.load(Ordering::SeqCst)
    }
}

/// How the scripted synthesizer answers `speak`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakBehavior {
    /// Report started and done immediately
    Complete,
    /// Report an error immediately
    Fail,
    /// Keep the callbacks; the test decides
    Hold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spoken {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
}

/// On-device synthesizer driven by a fixed behavior
pub struct ScriptedSynthesizer {
    behavior: SpeakBehavior,
    spoken: Mutex<Vec<Spoken>>,
    held: Mutex<Option<UtteranceCallbacks>>,
    stops: AtomicUsize,
}

impl ScriptedSynthesizer {
    pub fn new(behavior: SpeakBehavior) -> Self {
        Self {
            behavior,
            spoken: Mutex::new(Vec::new()),
            held: Mutex::new(None),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn spoken(&self) -> Vec<Spoken> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken().into_iter().map(|s| s.text).collect()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Finish the held utterance
    pub fn finish_held(&self) {
        if let Some(callbacks) = self.held.lock().unwrap().take() {
            callbacks.done();
        }
    }
}

impl OnDeviceSynthesizer for ScriptedSynthesizer {
    fn speak(&self, text: &str, rate: f32, pitch: f32, callbacks: UtteranceCallbacks) -> Result<()> {
        self.spoken.lock().unwrap().push(Spoken {
            text: text.to_string(),
            rate,
            pitch,
        });
        match self.behavior {
            SpeakBehavior::Complete => {
                callbacks.started();
                callbacks.done();
            }
            SpeakBehavior::Fail => callbacks.failed("speech engine unavailable"),
            SpeakBehavior::Hold => {
                callbacks.started();
                *self.held.lock().unwrap() = Some(callbacks);
            }
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Speech service counting its calls
pub struct CountingSpeechService {
    calls: AtomicUsize,
    audio: Option<Vec<u8>>,
    delay: Duration,
    scripts: Mutex<Vec<Script>>,
}

impl CountingSpeechService {
    /// Succeeds with `audio`
    pub fn returning(audio: &[u8]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            audio: Some(audio.to_vec()),
            delay: Duration::ZERO,
            scripts: Mutex::new(Vec::new()),
        }
    }

    /// Always fails with a transport error
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            audio: None,
            delay: Duration::ZERO,
            scripts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn scripts(&self) -> Vec<Script> {
        self.scripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechService for CountingSpeechService {
    async fn synthesize(&self, script: &Script, _timeout: Duration, cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scripts.lock().unwrap().push(script.clone());

        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = cancel.cancelled() => return Err(Error::Transport("cancelled".to_string())),
        }

        match &self.audio {
            Some(audio) => Ok(audio.clone()),
            None => Err(Error::Transport("connection refused".to_string())),
        }
    }
}
