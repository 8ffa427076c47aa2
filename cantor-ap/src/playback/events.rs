//! Internal coordinator commands (not broadcast to subscribers)
//!
//! Caller requests and asynchronous notifications (player callbacks,
//! utterance callbacks, synthesis completion, timers) are all serialized
//! onto one channel and applied by the coordinator task in arrival order.
//! They are converted to `CantorEvent`s before broadcasting.

use crate::error::Error;
use crate::synthesis::SynthesizedAudio;
use cantor_common::ResolvedSource;

/// Messages consumed by the coordinator task
///
/// Notifications carry the generation they were issued under. A generation
/// ends whenever the coordinator abandons its current output (new source,
/// demotion, stop, on-device pause or seek); notifications from an ended
/// generation are dropped.
#[derive(Debug)]
pub(crate) enum Command {
    Play(ResolvedSource),
    Pause,
    Resume,
    Stop,
    Seek(u64),
    SetSpeed(f32),
    Shutdown,

    /// Player reached the end of its media
    PlayerCompleted { generation: u64 },

    /// Player reported an error
    PlayerFailed { generation: u64, message: String },

    UtteranceStarted { generation: u64, index: usize },

    UtteranceDone { generation: u64, index: usize },

    UtteranceFailed {
        generation: u64,
        index: usize,
        message: String,
    },

    /// Neural voice audio ready (or failed)
    SynthesisFinished {
        generation: u64,
        result: Result<SynthesizedAudio, Error>,
    },

    /// Silence after a segment elapsed; `next_index` is due to be spoken
    SegmentPauseElapsed { generation: u64, next_index: usize },

    /// Progress sampler fired
    ProgressTick { generation: u64 },
}

impl Command {
    /// Generation tag of a notification; None for caller requests
    pub(crate) fn generation(&self) -> Option<u64> {
        match self {
            Command::PlayerCompleted { generation }
            | Command::PlayerFailed { generation, .. }
            | Command::UtteranceStarted { generation, .. }
            | Command::UtteranceDone { generation, .. }
            | Command::UtteranceFailed { generation, .. }
            | Command::SynthesisFinished { generation, .. }
            | Command::SegmentPauseElapsed { generation, .. }
            | Command::ProgressTick { generation } => Some(*generation),
            _ => None,
        }
    }
}
