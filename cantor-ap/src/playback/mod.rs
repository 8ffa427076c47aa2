//! Playback coordination and the collaborators it drives

pub mod coordinator;
mod events;
mod monitor;
pub mod traits;

pub use coordinator::{CoordinatorDeps, PlaybackCoordinator, MAX_SPEED, MIN_SPEED};
pub use traits::{MediaPlayer, OnDeviceSynthesizer, PlayerCallbacks, UtteranceCallbacks};
