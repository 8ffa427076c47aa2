//! Script building, cache lookup and synthesis for one content item

use super::SpeechService;
use crate::cache::{speech_key, AudioCache};
use crate::error::{Error, Result};
use crate::markup::{MarkupBuilder, Script, VoiceParams};
use cantor_common::ContentReference;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Audio handed to a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// URI or file path
    Uri(String),
    File(PathBuf),
    /// In-memory encoded audio
    Buffer(Arc<Vec<u8>>),
}

impl MediaSource {
    pub fn describe(&self) -> String {
        match self {
            MediaSource::Uri(uri) => uri.clone(),
            MediaSource::File(path) => path.display().to_string(),
            MediaSource::Buffer(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Output of [`NeuralVoicePipeline::fetch`]
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// Cache key of the script/voice pair
    pub key: String,
    pub media: MediaSource,
    pub from_cache: bool,
}

/// Neural voice path: markup, cache, then the remote service on a miss
pub struct NeuralVoicePipeline {
    builder: MarkupBuilder,
    cache: Arc<AudioCache>,
    service: Arc<dyn SpeechService>,
    timeout: Duration,
}

impl NeuralVoicePipeline {
    pub fn new(cache: Arc<AudioCache>, service: Arc<dyn SpeechService>, timeout: Duration) -> Self {
        Self {
            builder: MarkupBuilder::new(),
            cache,
            service,
            timeout,
        }
    }

    pub fn cache(&self) -> &Arc<AudioCache> {
        &self.cache
    }

    pub fn build_script(&self, content: &ContentReference, voice: &VoiceParams) -> Script {
        self.builder.build(&content.text, content.content_type, voice)
    }

    /// Produce audio for `content`, synthesizing only on a cache miss
    ///
    /// Concurrent fetches of the same script and voice share one synthesis.
    /// A failed cache write is logged and the audio is returned from memory.
    ///
    /// # Errors
    ///
    /// `ResolutionExhausted` when the text has no speakable line, otherwise
    /// whatever the speech service reports.
    pub async fn fetch(
        &self,
        content: &ContentReference,
        voice: &VoiceParams,
        cancel: &CancellationToken,
    ) -> Result<SynthesizedAudio> {
        let script = self.build_script(content, voice);
        if script.is_empty() {
            return Err(Error::ResolutionExhausted(format!(
                "No speakable text for {}",
                content.id
            )));
        }

        let key = speech_key(&script, &voice.name);
        if self.cache.is_cached(&key) {
            if let Some(path) = self.cache.get(&key).await {
                debug!(content_id = %content.id, key = %key, "Neural voice cache hit");
                return Ok(SynthesizedAudio {
                    key,
                    media: MediaSource::File(path),
                    from_cache: true,
                });
            }
        }

        let _slot = self.cache.lock_key(&key).await;
        // Another fetch may have produced the entry while we waited
        if let Some(path) = self.cache.get(&key).await {
            debug!(content_id = %content.id, key = %key, "Neural voice cache filled while waiting");
            return Ok(SynthesizedAudio {
                key,
                media: MediaSource::File(path),
                from_cache: true,
            });
        }

        info!(
            content_id = %content.id,
            key = %key,
            utterances = script.utterance_count(),
            "Neural voice cache miss, synthesizing"
        );
        let audio = self.service.synthesize(&script, self.timeout, cancel).await?;
        if audio.is_empty() {
            return Err(Error::EmptySynthesis);
        }

        let media = match self.cache.put(&key, &audio).await {
            Ok(path) => MediaSource::File(path),
            Err(e) => {
                warn!(content_id = %content.id, key = %key, "Playing from memory: {}", e);
                MediaSource::Buffer(Arc::new(audio))
            }
        };

        Ok(SynthesizedAudio {
            key,
            media,
            from_cache: false,
        })
    }
}
