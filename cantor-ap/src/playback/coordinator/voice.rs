//! Synthesized tiers: neural voice audio and on-device segments

use super::core::{Active, Coordinator, Phase, SegmentCursor};
use crate::error::Error;
use crate::playback::events::Command;
use crate::playback::monitor::start_segment_pause;
use crate::playback::traits::UtteranceCallbacks;
use crate::synthesis::SynthesizedAudio;
use cantor_common::{CantorEvent, ResolvedSource};
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

impl Coordinator {
    /// Fetch neural voice audio off the task; the result arrives as a command
    pub(super) fn start_synthesis(&mut self, source: ResolvedSource, paused: bool) {
        let cancel = CancellationToken::new();
        let pipeline = self.neural_voice.clone();
        let content = source.content.clone();
        let voice = self.voice.clone();
        let tx = self.tx.clone();
        let generation = self.generation;
        let token = cancel.clone();

        tokio::spawn(async move {
            let result = pipeline.fetch(&content, &voice, &token).await;
            let _ = tx.send(Command::SynthesisFinished { generation, result });
        });

        self.active = Some(Active {
            source,
            paused,
            phase: Phase::Synthesizing { cancel },
        });
    }

    pub(super) async fn on_synthesis_finished(&mut self, result: Result<SynthesizedAudio, Error>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !matches!(active.phase, Phase::Synthesizing { .. }) {
            return;
        }

        match result {
            Ok(audio) => {
                info!(key = %audio.key, from_cache = audio.from_cache, "Neural voice audio ready");
                if active.paused {
                    active.phase = Phase::Ready(audio.media);
                } else {
                    self.start_timeline(audio.media);
                }
                self.publish().await;
            }
            Err(e) => self.handle_failure(e).await,
        }
    }

    /// Build the script and speak its first segment
    pub(super) async fn start_segments(&mut self, source: ResolvedSource, paused: bool) {
        let script = self.neural_voice.build_script(&source.content, &self.voice);
        let units = script.spoken_units();
        if units.is_empty() {
            self.fail_terminal(Error::ResolutionExhausted(format!(
                "No text to speak for {}",
                source.content.id
            )))
            .await;
            return;
        }

        info!(
            content_id = %source.content.id,
            segments = units.len(),
            "Speaking with on-device voice"
        );
        self.session.current_segment_index = 0;
        self.session.set_segment_progress(0, units.len());

        let started = CantorEvent::SourceStarted {
            content_id: source.content.id.clone(),
            tier: source.tier,
            display_label: source.display_label.clone(),
            timestamp: Utc::now(),
        };
        self.active = Some(Active {
            source,
            paused,
            phase: Phase::Segments(SegmentCursor {
                units,
                prosody: script.prosody,
                index: 0,
                gap: None,
            }),
        });
        if !paused {
            self.speak_current();
        }
        self.state.broadcast_event(started);
    }

    /// Speak the cursor's segment at the current speed
    pub(super) fn speak_current(&mut self) {
        let Some(Active {
            phase: Phase::Segments(cursor),
            ..
        }) = self.active.as_ref()
        else {
            return;
        };
        let index = cursor.index;
        let Some(unit) = cursor.units.get(index) else {
            return;
        };
        let rate = cursor.prosody.device_rate(self.preferred_speed);
        let pitch = cursor.prosody.device_pitch();

        self.session.current_segment_index = index;
        debug!(index, rate, "Speaking segment");
        let callbacks = UtteranceCallbacks::new(self.tx.clone(), self.generation, index);
        if let Err(e) = self.on_device.speak(&unit.text, rate, pitch, callbacks) {
            let _ = self.tx.send(Command::UtteranceFailed {
                generation: self.generation,
                index,
                message: e.to_string(),
            });
        }
    }

    pub(super) async fn on_utterance_done(&mut self, index: usize) {
        let Some(Active {
            phase: Phase::Segments(cursor),
            ..
        }) = self.active.as_mut()
        else {
            return;
        };
        // Duplicate or out-of-order report
        if index != cursor.index || cursor.gap.is_some() {
            return;
        }

        let completed = index + 1;
        let total = cursor.units.len();
        self.session.set_segment_progress(completed, total);
        if completed >= total {
            self.finish().await;
            return;
        }

        let pause_ms = cursor.units[index].pause_after_ms;
        cursor.index = completed;
        if pause_ms > 0 {
            cursor.gap = Some(start_segment_pause(
                self.tx.clone(),
                self.generation,
                completed,
                Duration::from_millis(u64::from(pause_ms)),
            ));
            self.session.current_segment_index = completed;
        } else {
            self.speak_current();
        }
        self.publish().await;
    }

    pub(super) async fn on_segment_pause_elapsed(&mut self, next_index: usize) {
        let Some(Active {
            phase: Phase::Segments(cursor),
            paused,
            ..
        }) = self.active.as_mut()
        else {
            return;
        };
        if cursor.index != next_index || cursor.gap.take().is_none() {
            return;
        }
        if *paused {
            return;
        }
        self.speak_current();
        self.publish().await;
    }
}
