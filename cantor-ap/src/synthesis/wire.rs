//! Wire codec of the neural voice service
//!
//! Text messages are a block of `Name:value` header lines separated by CRLF,
//! a blank line, then a body. Binary frames carry a 2-byte big-endian header
//! length, the UTF-8 header block, then the payload.
//!
//! Everything here is pure; the client owns the socket.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Header value marking an audio payload
pub const PATH_AUDIO: &str = "audio";

/// Header value of the terminal text message
pub const PATH_TURN_END: &str = "turn.end";

const HEADER_SEPARATOR: &str = "\r\n\r\n";

/// Timestamp format expected in `X-Timestamp`
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
        .to_string()
}

/// Outbound message 1: declares the output codec, metadata disabled
pub fn speech_config_message(timestamp: &str, output_format: &str) -> String {
    let body = json!({
        "context": {
            "synthesis": {
                "audio": {
                    "metadataoptions": {
                        "sentenceBoundaryEnabled": "false",
                        "wordBoundaryEnabled": "false"
                    },
                    "outputFormat": output_format
                }
            }
        }
    });
    format!(
        "X-Timestamp:{}\r\nContent-Type:application/json; charset=utf-8\r\nPath:speech.config{}{}",
        timestamp, HEADER_SEPARATOR, body
    )
}

/// Outbound message 2: the markup document
pub fn ssml_message(request_id: &str, timestamp: &str, ssml: &str) -> String {
    format!(
        "X-RequestId:{}\r\nContent-Type:application/ssml+xml\r\nX-Timestamp:{}\r\nPath:ssml{}{}",
        request_id, timestamp, HEADER_SEPARATOR, ssml
    )
}

/// Value of header `name` within a header block (case-insensitive name)
pub fn header_value<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers
        .split("\r\n")
        .flat_map(|line| line.split('\n'))
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}

/// Inbound text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMessage<'a> {
    /// Exchange complete
    TurnEnd,
    /// Any other control message (turn.start, response, metadata)
    Control { path: Option<&'a str> },
}

pub fn parse_text(message: &str) -> TextMessage<'_> {
    let headers = match message.split_once(HEADER_SEPARATOR) {
        Some((headers, _body)) => headers,
        None => message,
    };
    match header_value(headers, "Path") {
        Some(path) if path == PATH_TURN_END => TextMessage::TurnEnd,
        path => TextMessage::Control { path },
    }
}

/// Inbound binary frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryFrame<'a> {
    Audio(&'a [u8]),
    /// Non-audio payload, discarded
    Control,
}

/// Split a binary frame into header and payload
///
/// # Errors
///
/// Returns `Protocol` when the frame is shorter than its declared header.
pub fn parse_binary(frame: &[u8]) -> Result<BinaryFrame<'_>> {
    if frame.len() < 2 {
        return Err(Error::Protocol(format!(
            "binary frame of {} bytes has no header length",
            frame.len()
        )));
    }
    let header_len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    let payload_start = 2 + header_len;
    if frame.len() < payload_start {
        return Err(Error::Protocol(format!(
            "binary frame header length {} exceeds frame size {}",
            header_len,
            frame.len()
        )));
    }

    let header = String::from_utf8_lossy(&frame[2..payload_start]);
    match header_value(&header, "Path") {
        Some(PATH_AUDIO) => Ok(BinaryFrame::Audio(&frame[payload_start..])),
        _ => Ok(BinaryFrame::Control),
    }
}

/// Build a binary frame (used by test servers)
pub fn encode_binary(header: &str, payload: &[u8]) -> Vec<u8> {
    let header_bytes = header.as_bytes();
    let mut frame = Vec::with_capacity(2 + header_bytes.len() + payload.len());
    frame.extend_from_slice(&(header_bytes.len() as u16).to_be_bytes());
    frame.extend_from_slice(header_bytes);
    frame.extend_from_slice(payload);
    frame
}
