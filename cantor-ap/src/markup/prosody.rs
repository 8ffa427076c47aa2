//! Fixed prosody presets per content type

use cantor_common::ContentType;
use serde::{Deserialize, Serialize};

/// Rate, pitch and gain applied to a whole script
///
/// Values are relative offsets in the units the voice service accepts:
/// percent for rate and volume, hertz for pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prosody {
    pub rate_pct: i32,
    pub pitch_hz: i32,
    pub volume_pct: i32,
}

impl Prosody {
    /// Preset for a content type
    ///
    /// | type    | delivery              | rate | pitch |
    /// |---------|-----------------------|------|-------|
    /// | Aarti   | fast, ceremonial      | +10% | +2Hz  |
    /// | Chalisa | measured, chant       | -5%  | -2Hz  |
    /// | Mantra  | slow, meditative      | -20% | -4Hz  |
    /// | Katha   | flowing, narrative    | +0%  | +0Hz  |
    pub fn for_content_type(content_type: ContentType) -> Self {
        let (rate_pct, pitch_hz) = match content_type {
            ContentType::Aarti => (10, 2),
            ContentType::Chalisa => (-5, -2),
            ContentType::Mantra => (-20, -4),
            ContentType::Katha => (0, 0),
        };
        Self {
            rate_pct,
            pitch_hz,
            volume_pct: 0,
        }
    }

    /// Apply a fixed gain offset on top of the preset
    pub fn with_volume(mut self, volume_pct: i32) -> Self {
        self.volume_pct = volume_pct.clamp(-50, 50);
        self
    }

    pub fn ssml_rate(&self) -> String {
        format!("{:+}%", self.rate_pct)
    }

    pub fn ssml_pitch(&self) -> String {
        format!("{:+}Hz", self.pitch_hz)
    }

    pub fn ssml_volume(&self) -> String {
        format!("{:+}%", self.volume_pct)
    }

    /// Rate multiplier for the on-device synthesizer (1.0 = normal)
    pub fn device_rate(&self, speed_multiplier: f32) -> f32 {
        ((1.0 + self.rate_pct as f32 / 100.0) * speed_multiplier).clamp(0.25, 4.0)
    }

    /// Pitch multiplier for the on-device synthesizer (1.0 = normal)
    pub fn device_pitch(&self) -> f32 {
        (1.0 + self.pitch_hz as f32 / 50.0).clamp(0.5, 2.0)
    }
}
