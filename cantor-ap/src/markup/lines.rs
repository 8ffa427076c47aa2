//! Line classification for devotional text
//!
//! Each input line is one of: blank, punctuation/verse number, structural
//! header, verse end (text closed by a double bar or bar + number), or an
//! ordinary line of text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Trailing verse-end marker: `॥`, `||`, `॥१॥`, `|| 3 ||`, `। २ ।`, `|4|`
static RE_VERSE_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:(?:॥|\|\|)\s*(?:[0-9०-९]+\s*(?:॥|\|\|)?)?|[।|]\s*[0-9०-९]+\s*[।|]?)\s*$").unwrap()
});

/// Structural headers of hymn texts (compared after trimming punctuation/numbers)
static HEADER_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "दोहा", "चौपाई", "सोरठा", "छंद", "आरती", "स्तुति", "श्लोक", "मंत्र", "भजन", "ध्यान",
        "प्रार्थना", "doha", "chaupai", "soratha", "chhand", "aarti", "stuti", "shloka",
        "mantra", "bhajan", "dhyan", "prarthana", "chorus", "refrain",
    ]
    .into_iter()
    .collect()
});

/// Names spoken with emphasis
static PROPER_NOUNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "राम", "सीता", "हनुमान", "शिव", "शंकर", "गणेश", "कृष्ण", "राधा", "विष्णु", "लक्ष्मी",
        "दुर्गा", "पार्वती", "सरस्वती", "ब्रह्मा", "श्याम", "गोविंद", "गोपाल", "नारायण",
        "महादेव", "भोलेनाथ", "बजरंगी", "ram", "rama", "sita", "hanuman", "shiv", "shiva",
        "shankar", "ganesh", "krishna", "radha", "vishnu", "lakshmi", "durga", "parvati",
        "saraswati", "brahma", "shyam", "govind", "gopal", "narayan", "mahadev",
        "bholenath", "bajrangi",
    ]
    .into_iter()
    .collect()
});

/// Characters that end a stanza line without closing the verse
const STANZA_TERMINATORS: [char; 6] = ['।', '|', '.', '!', '?', ';'];

/// Classified line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    /// No letters at all: punctuation or a bare verse number
    Punctuation,
    /// Structural header such as "दोहा" or "Chorus"
    Header(&'a str),
    /// Text followed by a verse-end marker; holds the text without the marker
    VerseEnd(&'a str),
    Ordinary(&'a str),
}

impl LineKind<'_> {
    pub fn is_header(&self) -> bool {
        matches!(self, LineKind::Header(_))
    }
}

pub fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if !trimmed.chars().any(char::is_alphabetic) {
        return LineKind::Punctuation;
    }
    if is_header(trimmed) {
        return LineKind::Header(trimmed);
    }
    if let Some(m) = RE_VERSE_END.find(trimmed) {
        return LineKind::VerseEnd(trimmed[..m.start()].trim_end());
    }
    LineKind::Ordinary(trimmed)
}

fn is_header(trimmed: &str) -> bool {
    let core = trimmed.trim_matches(|c: char| !c.is_alphabetic());
    let lowered = core.to_lowercase();
    HEADER_KEYWORDS.contains(lowered.as_str())
}

pub fn ends_with_stanza_terminator(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .map(|c| STANZA_TERMINATORS.contains(&c))
        .unwrap_or(false)
}

/// Comparison form used for refrain detection
pub fn normalize_for_comparison(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Byte ranges of proper nouns within `text`
pub fn proper_noun_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut word_start: Option<usize> = None;

    // A trailing sentinel flushes the final word
    for (idx, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
        let in_word = c.is_alphanumeric() || is_combining_mark(c);
        match (in_word, word_start) {
            (true, None) => word_start = Some(idx),
            (false, Some(start)) => {
                let word = &text[start..idx];
                if PROPER_NOUNS.contains(word.to_lowercase().as_str()) {
                    spans.push((start, idx));
                }
                word_start = None;
            }
            _ => {}
        }
    }
    spans
}

/// Devanagari signs that are not alphabetic on their own (virama, nukta, ...)
fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0900}'..='\u{0903}' | '\u{093A}'..='\u{094F}' | '\u{0951}'..='\u{0957}' | '\u{0962}'..='\u{0963}')
}
