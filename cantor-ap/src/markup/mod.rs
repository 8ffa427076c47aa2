//! Script building
//!
//! Converts raw devotional text into a [`Script`]: an ordered list of
//! utterances and pauses with emphasis spans and a prosody preset.
//! Building is deterministic and side-effect free, so identical inputs give
//! byte-identical scripts and stable cache keys.

mod lines;
mod prosody;
mod ssml;

pub use lines::{classify, LineKind};
pub use prosody::Prosody;
pub use ssml::render_ssml;

use cantor_common::ContentType;
use serde::{Deserialize, Serialize};

use lines::{ends_with_stanza_terminator, normalize_for_comparison, proper_noun_spans};

/// Pause after a blank line
pub const BLANK_PAUSE_MS: u32 = 300;
/// Pause for a punctuation-only or verse-number line
pub const PUNCTUATION_PAUSE_MS: u32 = 450;
/// Pause after a refrain line
pub const REFRAIN_PAUSE_MS: u32 = 300;
/// Pause after an ordinary line
pub const DEFAULT_PAUSE_MS: u32 = 500;
/// Pause after a line ending with a stanza terminator
pub const STANZA_PAUSE_MS: u32 = 800;
/// Pause after a verse-end marker
pub const VERSE_END_PAUSE_MS: u32 = 1000;
/// Pause after a header, or before one
pub const HEADER_PAUSE_MS: u32 = 1200;

/// How many opening lines count as the refrain
const REFRAIN_WINDOW: usize = 3;

/// Voice selection for a script
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceParams {
    /// Voice name understood by the neural voice service
    pub name: String,
    /// Fixed gain offset in percent
    pub volume_pct: i32,
}

impl VoiceParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume_pct: 0,
        }
    }

    /// Language tag derived from the voice name ("hi-IN-MadhurNeural" -> "hi-IN")
    pub fn language(&self) -> String {
        let mut parts = self.name.splitn(3, '-');
        match (parts.next(), parts.next()) {
            (Some(lang), Some(region)) if !lang.is_empty() && !region.is_empty() => {
                format!("{}-{}", lang, region)
            }
            _ => "hi-IN".to_string(),
        }
    }
}

/// Byte range of emphasized text within an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmphasisSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub emphasis: Vec<EmphasisSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pause {
    pub duration_ms: u32,
    /// Closes the current paragraph
    pub paragraph_end: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segment {
    Utterance(Utterance),
    Pause(Pause),
}

/// One utterance plus the silence that follows it
///
/// The unit the on-device voice speaks at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokenUnit {
    pub text: String,
    pub pause_after_ms: u32,
}

/// Annotated script derived from raw text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub content_type: ContentType,
    pub voice: VoiceParams,
    pub prosody: Prosody,
    pub segments: Vec<Segment>,
}

impl Script {
    pub fn utterance_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Utterance(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.utterance_count() == 0
    }

    /// Canonical serialization used for cache keys
    pub fn canonical(&self) -> String {
        // Field order is fixed by the struct definitions; serde_json output
        // is therefore stable for equal scripts.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Utterances paired with their trailing pause
    pub fn spoken_units(&self) -> Vec<SpokenUnit> {
        let mut units: Vec<SpokenUnit> = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Utterance(u) => units.push(SpokenUnit {
                    text: u.text.clone(),
                    pause_after_ms: 0,
                }),
                Segment::Pause(p) => {
                    if let Some(last) = units.last_mut() {
                        last.pause_after_ms = last.pause_after_ms.max(p.duration_ms);
                    }
                }
            }
        }
        units
    }
}

/// Builds scripts from raw text
#[derive(Debug, Clone, Default)]
pub struct MarkupBuilder;

impl MarkupBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the script for `text`
    ///
    /// Pause after an ordinary line, first rule that applies:
    /// next line is a header (long), line ends with a stanza terminator
    /// (medium), line repeats one of the first three lines (short), otherwise
    /// the default.
    pub fn build(&self, text: &str, content_type: ContentType, voice: &VoiceParams) -> Script {
        let lines: Vec<&str> = text.lines().collect();
        let kinds: Vec<LineKind<'_>> = lines.iter().map(|l| classify(l)).collect();

        // Opening spoken lines, keyed by their spoken-line ordinal
        let refrain: Vec<(usize, String)> = kinds
            .iter()
            .filter_map(|k| match k {
                LineKind::Ordinary(t) | LineKind::VerseEnd(t) if !t.is_empty() => Some(normalize_for_comparison(t)),
                _ => None,
            })
            .take(REFRAIN_WINDOW)
            .enumerate()
            .collect();

        let mut out = SegmentWriter::default();
        let mut spoken_lines = 0usize;

        for (idx, kind) in kinds.iter().enumerate() {
            match kind {
                LineKind::Blank => out.pause(BLANK_PAUSE_MS, false),
                LineKind::Punctuation => out.pause(PUNCTUATION_PAUSE_MS, false),
                LineKind::Header(t) => {
                    out.utterance(t, Vec::new());
                    out.pause(HEADER_PAUSE_MS, true);
                }
                LineKind::VerseEnd(t) => {
                    if !t.is_empty() {
                        out.utterance(t, emphasis_for(t));
                        spoken_lines += 1;
                    }
                    out.pause(VERSE_END_PAUSE_MS, true);
                }
                LineKind::Ordinary(t) => {
                    out.utterance(t, emphasis_for(t));
                    let ordinal = spoken_lines;
                    spoken_lines += 1;

                    let next_is_header = kinds[idx + 1..]
                        .iter()
                        .find(|k| !matches!(k, LineKind::Blank))
                        .map(|k| k.is_header())
                        .unwrap_or(false);

                    let pause = if next_is_header {
                        HEADER_PAUSE_MS
                    } else if ends_with_stanza_terminator(t) {
                        STANZA_PAUSE_MS
                    } else if is_refrain(&refrain, ordinal, t) {
                        REFRAIN_PAUSE_MS
                    } else {
                        DEFAULT_PAUSE_MS
                    };
                    out.pause(pause, false);
                }
            }
        }

        Script {
            content_type,
            voice: voice.clone(),
            prosody: Prosody::for_content_type(content_type).with_volume(voice.volume_pct),
            segments: out.finish(),
        }
    }
}

/// A line repeating an opening line other than itself
fn is_refrain(opening: &[(usize, String)], ordinal: usize, text: &str) -> bool {
    let normalized = normalize_for_comparison(text);
    opening.iter().any(|(i, line)| *i != ordinal && *line == normalized)
}

fn emphasis_for(text: &str) -> Vec<EmphasisSpan> {
    proper_noun_spans(text)
        .into_iter()
        .map(|(start, end)| EmphasisSpan { start, end })
        .collect()
}

/// Accumulates segments, merging adjacent pauses
#[derive(Default)]
struct SegmentWriter {
    segments: Vec<Segment>,
}

impl SegmentWriter {
    fn utterance(&mut self, text: &str, emphasis: Vec<EmphasisSpan>) {
        self.segments.push(Segment::Utterance(Utterance {
            text: text.to_string(),
            emphasis,
        }));
    }

    fn pause(&mut self, duration_ms: u32, paragraph_end: bool) {
        match self.segments.last_mut() {
            // Nothing to pause after yet
            None => {}
            Some(Segment::Pause(p)) => {
                p.duration_ms = p.duration_ms.max(duration_ms);
                p.paragraph_end |= paragraph_end;
            }
            Some(Segment::Utterance(_)) => self.segments.push(Segment::Pause(Pause {
                duration_ms,
                paragraph_end,
            })),
        }
    }

    fn finish(self) -> Vec<Segment> {
        self.segments
    }
}
