//! Audio source resolution
//!
//! Picks the single highest-priority usable origin for a content item.
//! Resolution is total: when nothing better is usable the on-device voice
//! tier is returned, and the caller is responsible for the text being
//! non-empty.

use cantor_common::{ContentReference, ResolvedSource, Tier};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Chooses the audio tier for a [`ContentReference`]
#[derive(Debug, Clone)]
pub struct SourceResolver {
    neural_voice_enabled: bool,
    bundled_asset_root: Option<PathBuf>,
}

impl SourceResolver {
    pub fn new(neural_voice_enabled: bool) -> Self {
        Self {
            neural_voice_enabled,
            bundled_asset_root: None,
        }
    }

    /// Locate bundled assets under `root` instead of the `asset:///` scheme
    pub fn with_bundled_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.bundled_asset_root = Some(root.into());
        self
    }

    pub fn neural_voice_enabled(&self) -> bool {
        self.neural_voice_enabled
    }

    /// Resolve the best usable tier
    pub fn resolve(&self, content: &ContentReference) -> ResolvedSource {
        self.resolve_shared(Arc::new(content.clone()))
    }

    /// Resolve an already shared reference without copying it
    pub fn resolve_shared(&self, content: Arc<ContentReference>) -> ResolvedSource {
        self.first_usable(content, None)
    }

    /// Best usable tier strictly below `failed`
    ///
    /// Used for demotion: the returned tier always has a lower quality rank,
    /// so repeated demotion visits each tier at most once and terminates at
    /// the on-device voice. Returns None when `failed` is already terminal.
    pub fn resolve_below(&self, content: Arc<ContentReference>, failed: Tier) -> Option<ResolvedSource> {
        if failed == Tier::OnDeviceVoice {
            return None;
        }
        Some(self.first_usable(content, Some(failed.quality_rank())))
    }

    fn first_usable(&self, content: Arc<ContentReference>, below_rank: Option<u8>) -> ResolvedSource {
        for tier in Tier::ALL {
            if let Some(rank) = below_rank {
                if tier.quality_rank() >= rank {
                    continue;
                }
            }
            if let Some(locator) = self.locate(&content, tier) {
                debug!(content_id = %content.id, %tier, "Resolved audio source");
                let label = display_label(&content, tier);
                return ResolvedSource::new(tier, locator, label, content);
            }
        }

        // Unreachable in practice: locate() always accepts OnDeviceVoice
        let label = display_label(&content, Tier::OnDeviceVoice);
        let locator = content.id.clone();
        ResolvedSource::new(Tier::OnDeviceVoice, locator, label, content)
    }

    /// Locator for `tier` if that tier is usable for `content`
    fn locate(&self, content: &ContentReference, tier: Tier) -> Option<String> {
        match tier {
            Tier::Bundled => {
                let name = content.bundled_asset.as_deref()?.trim();
                if name.is_empty() {
                    return None;
                }
                Some(match &self.bundled_asset_root {
                    Some(root) => root.join(name).display().to_string(),
                    None => format!("asset:///{}", name),
                })
            }
            Tier::Downloaded => {
                // The cached flag alone can be stale; the file must really be there
                if !content.is_cached {
                    return None;
                }
                let path = content.downloaded_path.as_deref()?;
                if is_non_empty_file(path) {
                    Some(path.display().to_string())
                } else {
                    debug!(content_id = %content.id, path = %path.display(), "Ignoring stale cached flag");
                    None
                }
            }
            Tier::Stream => content
                .stream_urls
                .iter()
                .map(|url| url.trim())
                .find(|url| !url.is_empty())
                .map(str::to_string),
            Tier::NeuralVoice => {
                if self.neural_voice_enabled && content.has_text() {
                    Some(content.id.clone())
                } else {
                    None
                }
            }
            Tier::OnDeviceVoice => Some(content.id.clone()),
        }
    }
}

fn is_non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn display_label(content: &ContentReference, tier: Tier) -> String {
    let suffix = match tier {
        Tier::Bundled | Tier::Downloaded => "recording",
        Tier::Stream => "stream",
        Tier::NeuralVoice => "neural voice",
        Tier::OnDeviceVoice => "device voice",
    };
    format!("{} ({})", content.label(), suffix)
}
