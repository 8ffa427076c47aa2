//! SSML rendering of a [`Script`]

use super::{Script, Segment, Utterance};
use std::fmt::Write;

/// Render the markup document sent to the neural voice service
///
/// Paragraphs are opened at the first utterance after a paragraph-ending
/// pause. Emphasis spans become `<emphasis>` elements; all text is escaped.
pub fn render_ssml(script: &Script) -> String {
    let mut out = String::with_capacity(256);
    let _ = write!(
        out,
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{}'>",
        escape(&script.voice.language())
    );
    let _ = write!(out, "<voice name='{}'>", escape(&script.voice.name));
    let _ = write!(
        out,
        "<prosody rate='{}' pitch='{}' volume='{}'>",
        script.prosody.ssml_rate(),
        script.prosody.ssml_pitch(),
        script.prosody.ssml_volume()
    );

    let mut in_paragraph = false;
    for segment in &script.segments {
        match segment {
            Segment::Utterance(u) => {
                if !in_paragraph {
                    out.push_str("<p>");
                    in_paragraph = true;
                }
                render_utterance(&mut out, u);
            }
            Segment::Pause(p) => {
                let _ = write!(out, "<break time='{}ms'/>", p.duration_ms);
                if p.paragraph_end && in_paragraph {
                    out.push_str("</p>");
                    in_paragraph = false;
                }
            }
        }
    }
    if in_paragraph {
        out.push_str("</p>");
    }

    out.push_str("</prosody></voice></speak>");
    out
}

fn render_utterance(out: &mut String, utterance: &Utterance) {
    let text = utterance.text.as_str();
    let mut cursor = 0;
    for span in &utterance.emphasis {
        // Spans come from char boundaries, but guard against hand-built scripts
        if span.start < cursor
            || span.end > text.len()
            || span.start >= span.end
            || !text.is_char_boundary(span.start)
            || !text.is_char_boundary(span.end)
        {
            continue;
        }
        out.push_str(&escape(&text[cursor..span.start]));
        out.push_str("<emphasis level='moderate'>");
        out.push_str(&escape(&text[span.start..span.end]));
        out.push_str("</emphasis>");
        cursor = span.end;
    }
    out.push_str(&escape(&text[cursor..]));
    out.push(' ');
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
