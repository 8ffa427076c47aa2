//! Content and audio-source data model
//!
//! A [`ContentReference`] describes everything known about one devotional
//! text: where a recording might live and the raw text to synthesize when no
//! recording is usable. The source resolver turns it into a
//! [`ResolvedSource`] naming exactly one [`Tier`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::{Error, Result};

/// Kind of devotional text; selects the prosody preset used for synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Sung worship; fast and ceremonial delivery
    Aarti,
    /// Forty-verse hymn; measured chant
    Chalisa,
    /// Repeated invocation; slow and meditative
    Mantra,
    /// Story recitation; flowing narrative
    #[default]
    Katha,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Aarti => "aarti",
            ContentType::Chalisa => "chalisa",
            ContentType::Mantra => "mantra",
            ContentType::Katha => "katha",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aarti" => Ok(ContentType::Aarti),
            "chalisa" => Ok(ContentType::Chalisa),
            "mantra" => Ok(ContentType::Mantra),
            "katha" => Ok(ContentType::Katha),
            other => Err(Error::InvalidInput(format!("unknown content type: {}", other))),
        }
    }
}

/// Everything known about one content item's audio origins
///
/// Immutable per request. Supplied by the content store; the download that
/// sets `downloaded_path`/`is_cached` happens out of band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContentReference {
    /// Content store identifier
    pub id: String,

    /// Human-readable title, used for display labels
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub content_type: ContentType,

    /// Name of an audio asset packaged with the application
    #[serde(default)]
    pub bundled_asset: Option<String>,

    /// Local path of a previously downloaded recording
    #[serde(default)]
    pub downloaded_path: Option<PathBuf>,

    /// Content store's belief that `downloaded_path` is complete.
    /// Verified against the filesystem before use.
    #[serde(default)]
    pub is_cached: bool,

    /// Streaming URLs in caller priority order
    #[serde(default)]
    pub stream_urls: Vec<String>,

    /// Raw text, spoken when no recording is usable
    #[serde(default)]
    pub text: String,
}

impl ContentReference {
    /// Reference carrying only text (the synthesis-only case)
    pub fn from_text(id: impl Into<String>, content_type: ContentType, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_type,
            text: text.into(),
            ..Default::default()
        }
    }

    /// True when there is something to synthesize
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Label shown for this item, falling back to the id
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

/// One ranked audio-origin category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Tier {
    /// Audio asset shipped with the application
    Bundled,
    /// Recording downloaded earlier to local storage
    Downloaded,
    /// Network stream
    Stream,
    /// Remote high-quality synthesized speech
    NeuralVoice,
    /// Local low-quality synthesized speech (terminal tier)
    OnDeviceVoice,
}

impl Tier {
    /// All tiers, best first
    pub const ALL: [Tier; 5] = [
        Tier::Bundled,
        Tier::Downloaded,
        Tier::Stream,
        Tier::NeuralVoice,
        Tier::OnDeviceVoice,
    ];

    /// Strictly decreasing along [`Tier::ALL`]
    pub fn quality_rank(&self) -> u8 {
        match self {
            Tier::Bundled => 4,
            Tier::Downloaded => 3,
            Tier::Stream => 2,
            Tier::NeuralVoice => 1,
            Tier::OnDeviceVoice => 0,
        }
    }

    /// Tiers played through the media player from a URI
    pub fn is_streaming_mode(&self) -> bool {
        matches!(self, Tier::Bundled | Tier::Downloaded | Tier::Stream)
    }

    /// Tiers that require speech synthesis
    pub fn is_synthesized(&self) -> bool {
        matches!(self, Tier::NeuralVoice | Tier::OnDeviceVoice)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Bundled => write!(f, "Bundled"),
            Tier::Downloaded => write!(f, "Downloaded"),
            Tier::Stream => write!(f, "Stream"),
            Tier::NeuralVoice => write!(f, "NeuralVoice"),
            Tier::OnDeviceVoice => write!(f, "OnDeviceVoice"),
        }
    }
}

/// The single audio origin chosen for a content item
///
/// Freshly computed by the resolver, never mutated. Keeps a shared handle to
/// the originating reference so playback can demote to a synthesis tier.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSource {
    pub tier: Tier,
    /// URI, file path, or content id depending on tier
    pub locator: String,
    pub display_label: String,
    pub quality_rank: u8,
    #[serde(skip)]
    pub content: Arc<ContentReference>,
}

impl ResolvedSource {
    pub fn new(
        tier: Tier,
        locator: impl Into<String>,
        display_label: impl Into<String>,
        content: Arc<ContentReference>,
    ) -> Self {
        Self {
            tier,
            locator: locator.into(),
            display_label: display_label.into(),
            quality_rank: tier.quality_rank(),
            content,
        }
    }
}
