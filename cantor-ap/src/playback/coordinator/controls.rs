//! Caller controls: pause, resume, stop, seek, speed

use super::clamp_speed;
use super::core::{Coordinator, Phase};
use crate::playback::events::Command;
use tracing::{debug, info, warn};

impl Coordinator {
    pub(super) async fn pause(&mut self) {
        if let Some(handle) = self.sampler.take() {
            handle.abort();
        }
        let Some(active) = self.active.as_mut() else {
            debug!("Pause ignored while idle");
            return;
        };
        if active.paused {
            return;
        }
        active.paused = true;

        match &mut active.phase {
            Phase::Timeline => {
                if let Err(e) = self.player.pause() {
                    warn!("Failed to pause player: {}", e);
                }
            }
            Phase::Synthesizing { .. } | Phase::Ready(_) => {
                debug!("Paused before audio is ready; start deferred until resume");
            }
            Phase::Segments(cursor) => {
                if let Some(gap) = cursor.gap.take() {
                    gap.abort();
                }
                // Interrupted utterance reports are from the old generation
                self.on_device.stop();
                self.generation += 1;
            }
        }

        info!("Paused");
        self.session.is_playing = false;
        self.publish().await;
    }

    pub(super) async fn resume(&mut self) {
        let Some(active) = self.active.as_mut() else {
            debug!("Resume ignored while idle");
            return;
        };
        if !active.paused {
            return;
        }
        active.paused = false;
        self.session.is_playing = true;
        info!("Resumed");

        match std::mem::replace(&mut active.phase, Phase::Timeline) {
            Phase::Timeline => {
                if let Err(e) = self.player.resume() {
                    let _ = self.tx.send(Command::PlayerFailed {
                        generation: self.generation,
                        message: e.to_string(),
                    });
                } else {
                    self.start_sampler();
                }
            }
            Phase::Synthesizing { cancel } => {
                active.phase = Phase::Synthesizing { cancel };
            }
            Phase::Ready(media) => self.start_timeline(media),
            segments @ Phase::Segments(_) => {
                active.phase = segments;
                // Restart the interrupted segment, or the one due after the gap
                self.speak_current();
            }
        }

        self.publish().await;
    }

    pub(super) async fn stop(&mut self) {
        info!("Stop requested");
        self.go_idle().await;
    }

    pub(super) async fn seek(&mut self, position: u64) {
        let Some(active) = self.active.as_mut() else {
            debug!("Seek ignored while idle");
            return;
        };
        let paused = active.paused;

        match &mut active.phase {
            Phase::Timeline => {
                if let Err(e) = self.player.seek(position) {
                    warn!("Seek to {}ms failed: {}", position, e);
                    return;
                }
                let duration_ms = self.player.duration_ms();
                let position = if duration_ms > 0 { position.min(duration_ms) } else { position };
                self.session.set_timeline(position, duration_ms);
            }
            Phase::Synthesizing { .. } | Phase::Ready(_) => {
                debug!("Seek ignored until neural voice audio is playing");
                return;
            }
            Phase::Segments(cursor) => {
                let last = cursor.units.len().saturating_sub(1);
                let index = (position as usize).min(last);
                if let Some(gap) = cursor.gap.take() {
                    gap.abort();
                }
                self.on_device.stop();
                self.generation += 1;
                cursor.index = index;
                let total = cursor.units.len();

                info!(index, "Jumping to segment");
                self.session.current_segment_index = index;
                self.session.set_segment_progress(index, total);
                if !paused {
                    self.speak_current();
                }
            }
        }

        self.publish().await;
    }

    pub(super) async fn set_speed(&mut self, multiplier: f32) {
        let speed = clamp_speed(multiplier);
        if speed != multiplier {
            debug!("Speed {} clamped to {}", multiplier, speed);
        }
        self.preferred_speed = speed;
        self.session.speed_multiplier = speed;

        // On-device voice picks the new rate up at the next segment
        if let Some(active) = &self.active {
            if matches!(active.phase, Phase::Timeline) {
                if let Err(e) = self.player.set_speed(speed) {
                    warn!("Player rejected speed {}: {}", speed, e);
                }
            }
        }

        self.publish().await;
    }
}
