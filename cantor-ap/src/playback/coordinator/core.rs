//! Coordinator task: lifecycle, source entry, demotion and idle transition

use super::CoordinatorDeps;
use crate::cache::{stream_key, AudioCache};
use crate::error::Error;
use crate::markup::{Prosody, SpokenUnit, VoiceParams};
use crate::playback::events::Command;
use crate::playback::monitor::start_progress_sampler;
use crate::playback::traits::{MediaPlayer, OnDeviceSynthesizer, PlayerCallbacks};
use crate::resolver::SourceResolver;
use crate::state::SharedState;
use crate::synthesis::{MediaSource, NeuralVoicePipeline};
use cantor_common::{CantorEvent, PlaybackMode, PlaybackSession, ResolvedSource, Tier};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What the active source is doing
pub(super) enum Phase {
    /// Player owns a continuous timeline
    Timeline,
    /// Waiting for neural voice audio
    Synthesizing { cancel: CancellationToken },
    /// Audio arrived while paused; playback starts on resume
    Ready(MediaSource),
    /// On-device voice speaking one segment at a time
    Segments(SegmentCursor),
}

pub(super) struct SegmentCursor {
    pub(super) units: Vec<SpokenUnit>,
    pub(super) prosody: Prosody,
    /// Segment being spoken, or due next while `gap` runs
    pub(super) index: usize,
    /// Silence timer after a finished segment
    pub(super) gap: Option<JoinHandle<()>>,
}

pub(super) struct Active {
    pub(super) source: ResolvedSource,
    pub(super) paused: bool,
    pub(super) phase: Phase,
}

/// State owned by the coordinator task
pub(crate) struct Coordinator {
    pub(super) player: Arc<dyn MediaPlayer>,
    pub(super) on_device: Arc<dyn OnDeviceSynthesizer>,
    pub(super) neural_voice: Arc<NeuralVoicePipeline>,
    pub(super) stream_cache: Option<Arc<AudioCache>>,
    pub(super) resolver: SourceResolver,
    pub(super) voice: VoiceParams,
    pub(super) progress_interval: Duration,

    /// Sender handed to callbacks and timers
    pub(super) tx: mpsc::UnboundedSender<Command>,
    pub(super) state: Arc<SharedState>,

    pub(super) session: PlaybackSession,
    /// Survives stop(); applied to every new source
    pub(super) preferred_speed: f32,
    pub(super) generation: u64,
    pub(super) active: Option<Active>,
    pub(super) sampler: Option<JoinHandle<()>>,
}

impl Coordinator {
    pub(crate) fn new(
        deps: CoordinatorDeps,
        tx: mpsc::UnboundedSender<Command>,
        state: Arc<SharedState>,
        speed: f32,
    ) -> Self {
        Self {
            player: deps.player,
            on_device: deps.on_device,
            neural_voice: deps.neural_voice,
            stream_cache: deps.stream_cache,
            resolver: deps.resolver,
            voice: deps.voice,
            progress_interval: deps.progress_interval,
            tx,
            state,
            session: PlaybackSession::idle(speed),
            preferred_speed: speed,
            generation: 0,
            active: None,
            sampler: None,
        }
    }

    /// Apply commands until shutdown
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!("Playback coordinator started");

        while let Some(command) = rx.recv().await {
            if let Some(generation) = command.generation() {
                if generation != self.generation {
                    debug!(generation, current = self.generation, "Dropping stale notification");
                    continue;
                }
            }

            match command {
                Command::Play(source) => self.play(source).await,
                Command::Pause => self.pause().await,
                Command::Resume => self.resume().await,
                Command::Stop => self.stop().await,
                Command::Seek(position) => self.seek(position).await,
                Command::SetSpeed(multiplier) => self.set_speed(multiplier).await,
                Command::Shutdown => {
                    self.go_idle().await;
                    break;
                }
                Command::PlayerCompleted { .. } => self.on_player_completed().await,
                Command::PlayerFailed { message, .. } => self.handle_failure(Error::Playback(message)).await,
                Command::UtteranceStarted { index, .. } => {
                    debug!(index, "Utterance started");
                }
                Command::UtteranceDone { index, .. } => self.on_utterance_done(index).await,
                Command::UtteranceFailed { index, message, .. } => {
                    warn!(index, "On-device utterance failed: {}", message);
                    self.handle_failure(Error::Playback(message)).await
                }
                Command::SynthesisFinished { result, .. } => self.on_synthesis_finished(result).await,
                Command::SegmentPauseElapsed { next_index, .. } => {
                    self.on_segment_pause_elapsed(next_index).await
                }
                Command::ProgressTick { .. } => self.sample_progress().await,
            }
        }

        info!("Playback coordinator stopped");
    }

    /// Fresh top-level play: demotion history starts over
    async fn play(&mut self, source: ResolvedSource) {
        info!(
            content_id = %source.content.id,
            tier = %source.tier,
            "Play requested: {}",
            source.display_label
        );
        self.session.demotions = 0;
        self.enter(source, false).await;
    }

    /// Abandon current output and start `source`
    pub(super) async fn enter(&mut self, source: ResolvedSource, paused: bool) {
        self.release_output();

        let new_mode = PlaybackMode::for_tier(source.tier);
        self.set_mode(new_mode);
        self.session.tier = Some(source.tier);
        self.session.content_id = Some(source.content.id.clone());
        self.session.speed_multiplier = self.preferred_speed;
        self.session.is_playing = !paused;
        self.session.current_segment_index = 0;
        self.session.set_timeline(0, 0);
        self.session.set_segment_progress(0, 0);

        match source.tier {
            Tier::Bundled | Tier::Downloaded | Tier::Stream => {
                let media = self.media_for(&source).await;
                self.active = Some(Active {
                    source,
                    paused,
                    phase: Phase::Timeline,
                });
                self.start_timeline(media);
            }
            Tier::NeuralVoice => self.start_synthesis(source, paused),
            Tier::OnDeviceVoice => self.start_segments(source, paused).await,
        }

        self.publish().await;
    }

    async fn media_for(&self, source: &ResolvedSource) -> MediaSource {
        match source.tier {
            Tier::Downloaded => MediaSource::File(PathBuf::from(&source.locator)),
            Tier::Stream => {
                if let Some(cache) = &self.stream_cache {
                    if let Some(path) = cache.get(&stream_key(&source.locator)).await {
                        debug!(url = %source.locator, "Playing stream from cache");
                        return MediaSource::File(path);
                    }
                }
                MediaSource::Uri(source.locator.clone())
            }
            _ => MediaSource::Uri(source.locator.clone()),
        }
    }

    /// Hand `media` to the player for the active source
    pub(super) fn start_timeline(&mut self, media: MediaSource) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.phase = Phase::Timeline;
        let paused = active.paused;
        let content_id = active.source.content.id.clone();
        let tier = active.source.tier;
        let display_label = active.source.display_label.clone();

        debug!(content_id = %content_id, "Starting player on {}", media.describe());
        let callbacks = PlayerCallbacks::new(self.tx.clone(), self.generation);
        if let Err(e) = self.player.play(media, callbacks) {
            // Applied in order by the task loop, which demotes
            let _ = self.tx.send(Command::PlayerFailed {
                generation: self.generation,
                message: e.to_string(),
            });
            return;
        }
        if let Err(e) = self.player.set_speed(self.preferred_speed) {
            warn!("Player rejected speed {}: {}", self.preferred_speed, e);
        }

        if paused {
            if let Err(e) = self.player.pause() {
                warn!("Failed to pause player: {}", e);
            }
        } else {
            self.start_sampler();
        }
        self.session.is_playing = !paused;

        self.state.broadcast_event(CantorEvent::SourceStarted {
            content_id,
            tier,
            display_label,
            timestamp: Utc::now(),
        });
    }

    /// Demote on recoverable failures above the on-device voice, else go idle
    pub(super) async fn handle_failure(&mut self, error: Error) {
        let Some(active) = self.active.as_ref() else {
            debug!("Ignoring failure while idle: {}", error);
            return;
        };
        let failed = active.source.tier;
        let paused = active.paused;
        let content = active.source.content.clone();

        if failed != Tier::OnDeviceVoice && error.is_recoverable() {
            if let Some(next) = self.resolver.resolve_below(content.clone(), failed) {
                warn!(
                    content_id = %content.id,
                    from = %failed,
                    to = %next.tier,
                    "Demoting after failure: {}",
                    error
                );
                self.state.broadcast_event(CantorEvent::FallbackOccurred {
                    content_id: content.id.clone(),
                    from_tier: failed,
                    to_tier: next.tier,
                    reason: error.to_string(),
                    timestamp: Utc::now(),
                });
                self.session.demotions += 1;
                self.enter(next, paused).await;
                return;
            }
        }

        self.fail_terminal(error).await;
    }

    /// Report a caller-visible failure and return to idle
    pub(super) async fn fail_terminal(&mut self, error: Error) {
        let content_id = self.session.content_id.clone();
        error!(content_id = ?content_id, "Playback failed: {}", error);
        self.state.broadcast_event(CantorEvent::PlaybackError {
            content_id,
            kind: error.failure_kind(),
            message: error.to_string(),
            timestamp: Utc::now(),
        });
        self.go_idle().await;
    }

    async fn on_player_completed(&mut self) {
        if matches!(self.active.as_ref().map(|a| &a.phase), Some(Phase::Timeline)) {
            self.finish().await;
        }
    }

    /// Last frame or segment played
    pub(super) async fn finish(&mut self) {
        if let Some(active) = &self.active {
            info!(content_id = %active.source.content.id, tier = %active.source.tier, "Playback finished");
            self.state.broadcast_event(CantorEvent::Finished {
                content_id: active.source.content.id.clone(),
                tier: active.source.tier,
                timestamp: Utc::now(),
            });
        }
        self.go_idle().await;
    }

    /// Release everything and reset the session, keeping the preferred speed
    pub(super) async fn go_idle(&mut self) {
        self.release_output();
        self.set_mode(PlaybackMode::Idle);
        self.session = PlaybackSession::idle(self.preferred_speed);
        self.publish().await;
    }

    /// Stop whatever produces audio and end the current generation
    pub(super) fn release_output(&mut self) {
        self.stop_sampler();
        if let Some(active) = self.active.take() {
            match active.phase {
                Phase::Timeline => self.player.stop(),
                Phase::Synthesizing { cancel } => cancel.cancel(),
                Phase::Ready(_) => {}
                Phase::Segments(cursor) => {
                    if let Some(gap) = cursor.gap {
                        gap.abort();
                    }
                    self.on_device.stop();
                }
            }
        }
        self.generation += 1;
    }

    fn set_mode(&mut self, new_mode: PlaybackMode) {
        let old_mode = self.session.mode;
        if old_mode == new_mode {
            return;
        }
        info!("Mode: {} -> {}", old_mode, new_mode);
        self.session.mode = new_mode;
        self.state.broadcast_event(CantorEvent::ModeChanged {
            old_mode,
            new_mode,
            timestamp: Utc::now(),
        });
    }

    async fn sample_progress(&mut self) {
        let sampling = matches!(
            self.active.as_ref(),
            Some(Active { phase: Phase::Timeline, paused: false, .. })
        );
        if !sampling {
            return;
        }
        let position_ms = self.player.position_ms();
        let duration_ms = self.player.duration_ms();
        self.session.set_timeline(position_ms, duration_ms);
        self.publish().await;
    }

    pub(super) fn start_sampler(&mut self) {
        self.stop_sampler();
        self.sampler = Some(start_progress_sampler(
            self.tx.clone(),
            self.generation,
            self.progress_interval,
        ));
    }

    pub(super) fn stop_sampler(&mut self) {
        if let Some(handle) = self.sampler.take() {
            handle.abort();
        }
    }

    pub(super) async fn publish(&self) {
        self.state.publish_session(self.session.clone()).await;
    }
}
