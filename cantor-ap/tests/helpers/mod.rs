//! Test helper modules for Cantor Audio Player integration tests
//!
//! Provides reusable test infrastructure components:
//! - Fakes: recording media player, scripted on-device synthesizer,
//!   counting speech service
//! - TestVoiceServer: local WebSocket endpoint speaking the voice wire format
//! - Harness: coordinator wired to the fakes with temp-dir caches

#![allow(dead_code)]

pub mod fakes;
pub mod harness;
pub mod test_server;

// Re-export commonly used types
pub use fakes::{CountingSpeechService, RecordingPlayer, ScriptedSynthesizer, SpeakBehavior, Spoken};
pub use harness::{wait_for_event, wait_for_session, Harness, HarnessBuilder, WAIT};
pub use test_server::{ServerFrame, TestVoiceServer};
