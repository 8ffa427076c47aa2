//! Playback session type definitions
//!
//! Supporting types for the coordinator's published state.

use serde::{Deserialize, Serialize};

use crate::content::Tier;

/// Coordinator mode
///
/// `Streaming`, `NeuralVoice` and `OnDeviceVoice` carry a Playing/Paused
/// sub-state through [`PlaybackSession::is_playing`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum PlaybackMode {
    #[default]
    Idle,
    /// Bundled, downloaded or streamed audio through the media player
    Streaming,
    /// Remote synthesized speech through the media player
    NeuralVoice,
    /// Segment-by-segment on-device speech
    OnDeviceVoice,
}

impl PlaybackMode {
    /// Mode that plays a tier
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Bundled | Tier::Downloaded | Tier::Stream => PlaybackMode::Streaming,
            Tier::NeuralVoice => PlaybackMode::NeuralVoice,
            Tier::OnDeviceVoice => PlaybackMode::OnDeviceVoice,
        }
    }

    /// True for modes with a continuous timeline (seekable by milliseconds)
    pub fn has_timeline(&self) -> bool {
        matches!(self, PlaybackMode::Streaming | PlaybackMode::NeuralVoice)
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, PlaybackMode::Idle)
    }
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Idle => write!(f, "Idle"),
            PlaybackMode::Streaming => write!(f, "Streaming"),
            PlaybackMode::NeuralVoice => write!(f, "NeuralVoice"),
            PlaybackMode::OnDeviceVoice => write!(f, "OnDeviceVoice"),
        }
    }
}

/// Snapshot of the live playback
///
/// One live instance per active playback; mutated only by the coordinator
/// and republished to subscribers as a clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub mode: PlaybackMode,
    /// Active tier (None when idle)
    pub tier: Option<Tier>,
    /// Content being played (None when idle)
    pub content_id: Option<String>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub speed_multiplier: f32,
    pub is_playing: bool,
    /// Segment being spoken (on-device voice only)
    pub current_segment_index: usize,
    /// Number of spoken segments in the script (on-device voice only)
    pub total_segments: usize,
    /// Fraction complete, 0.0-1.0
    pub progress: f64,
    /// Demotions taken so far in this session
    pub demotions: u32,
}

impl PlaybackSession {
    pub fn idle(speed_multiplier: f32) -> Self {
        Self {
            mode: PlaybackMode::Idle,
            tier: None,
            content_id: None,
            position_ms: 0,
            duration_ms: 0,
            speed_multiplier,
            is_playing: false,
            current_segment_index: 0,
            total_segments: 0,
            progress: 0.0,
            demotions: 0,
        }
    }

    /// Update timeline position, recomputing progress
    pub fn set_timeline(&mut self, position_ms: u64, duration_ms: u64) {
        self.position_ms = position_ms;
        self.duration_ms = duration_ms;
        self.progress = if duration_ms == 0 {
            0.0
        } else {
            (position_ms as f64 / duration_ms as f64).clamp(0.0, 1.0)
        };
    }

    /// Update segment progress: completed segments / total segments
    pub fn set_segment_progress(&mut self, completed: usize, total: usize) {
        self.total_segments = total;
        self.progress = if total == 0 {
            0.0
        } else {
            (completed as f64 / total as f64).clamp(0.0, 1.0)
        };
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::idle(1.0)
    }
}
