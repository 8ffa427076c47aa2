//! Neural voice synthesis
//!
//! [`SpeechService`] is the seam between playback and the remote voice
//! service. [`NeuralVoiceClient`] speaks the service's WebSocket protocol;
//! [`NeuralVoicePipeline`] adds script building and the on-disk cache.

mod client;
mod pipeline;
pub mod wire;

pub use client::NeuralVoiceClient;
pub use pipeline::{MediaSource, NeuralVoicePipeline, SynthesizedAudio};

use crate::error::Result;
use crate::markup::Script;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Turns a script into encoded audio
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Synthesize `script` with the voice it names
    ///
    /// Resolves to the complete audio buffer, or fails when no terminal
    /// signal arrives within `timeout`, the transport breaks, `cancel` fires,
    /// or the service returns no audio.
    async fn synthesize(
        &self,
        script: &Script,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>>;
}
