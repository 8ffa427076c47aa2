//! Collaborators consumed by the coordinator
//!
//! The host supplies the actual audio player and on-device speech engine.
//! Both report asynchronous outcomes through callback handles that feed the
//! coordinator's command channel; calling a handle from any thread is safe.

use super::events::Command;
use crate::error::Result;
use crate::synthesis::MediaSource;
use tokio::sync::mpsc;

/// Audio player over a URI, file or in-memory buffer
///
/// Methods must not block; `play` starts playback and returns.
pub trait MediaPlayer: Send + Sync {
    /// Start playing `media`, replacing anything loaded
    fn play(&self, media: MediaSource, callbacks: PlayerCallbacks) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn resume(&self) -> Result<()>;
    /// Release the loaded media
    fn stop(&self);
    fn seek(&self, position_ms: u64) -> Result<()>;
    fn set_speed(&self, multiplier: f32) -> Result<()>;
    fn position_ms(&self) -> u64;
    fn duration_ms(&self) -> u64;
}

/// Local text-to-speech engine
pub trait OnDeviceSynthesizer: Send + Sync {
    /// Queue one utterance; outcome is reported through `callbacks`
    fn speak(&self, text: &str, rate: f32, pitch: f32, callbacks: UtteranceCallbacks) -> Result<()>;
    /// Interrupt the current utterance
    fn stop(&self);
}

/// Completion and error notifications for one `MediaPlayer::play` call
#[derive(Debug, Clone)]
pub struct PlayerCallbacks {
    tx: mpsc::UnboundedSender<Command>,
    generation: u64,
}

impl PlayerCallbacks {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>, generation: u64) -> Self {
        Self { tx, generation }
    }

    /// Media played to the end
    pub fn completed(&self) {
        let _ = self.tx.send(Command::PlayerCompleted {
            generation: self.generation,
        });
    }

    /// Playback failed (network, decoder, device)
    pub fn failed(&self, message: impl Into<String>) {
        let _ = self.tx.send(Command::PlayerFailed {
            generation: self.generation,
            message: message.into(),
        });
    }
}

/// Start, done and error notifications for one utterance
#[derive(Debug, Clone)]
pub struct UtteranceCallbacks {
    tx: mpsc::UnboundedSender<Command>,
    generation: u64,
    index: usize,
}

impl UtteranceCallbacks {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>, generation: u64, index: usize) -> Self {
        Self { tx, generation, index }
    }

    /// Segment index of the utterance
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn started(&self) {
        let _ = self.tx.send(Command::UtteranceStarted {
            generation: self.generation,
            index: self.index,
        });
    }

    pub fn done(&self) {
        let _ = self.tx.send(Command::UtteranceDone {
            generation: self.generation,
            index: self.index,
        });
    }

    pub fn failed(&self, message: impl Into<String>) {
        let _ = self.tx.send(Command::UtteranceFailed {
            generation: self.generation,
            index: self.index,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_callbacks_tag_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callbacks = PlayerCallbacks::new(tx, 4);
        callbacks.failed("decoder error");
        callbacks.completed();

        match rx.try_recv().unwrap() {
            Command::PlayerFailed { generation, message } => {
                assert_eq!(generation, 4);
                assert_eq!(message, "decoder error");
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(matches!(rx.try_recv().unwrap(), Command::PlayerCompleted { generation: 4 }));
    }

    #[test]
    fn test_callbacks_after_coordinator_gone_are_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let callbacks = UtteranceCallbacks::new(tx, 1, 0);
        callbacks.started();
        callbacks.done();
        callbacks.failed("late");
    }
}
