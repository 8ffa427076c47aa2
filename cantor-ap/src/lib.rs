//! # Cantor Audio Player Library (cantor-ap)
//!
//! Plays devotional content from the best available audio origin and falls
//! back automatically when an origin fails.
//!
//! **Components:**
//! - [`resolver`]: picks the highest-priority usable tier for a content item
//! - [`markup`]: turns raw text into a paused, emphasized [`markup::Script`]
//! - [`synthesis`]: neural voice WebSocket client and the cached pipeline
//! - [`cache`]: size-bounded LRU audio cache on disk
//! - [`playback`]: the coordinator state machine over a host player and
//!   on-device speech engine

pub mod cache;
pub mod config;
pub mod error;
pub mod markup;
pub mod playback;
pub mod resolver;
pub mod state;
pub mod synthesis;

pub use error::{Error, Result};
pub use playback::{CoordinatorDeps, PlaybackCoordinator};
pub use resolver::SourceResolver;
pub use state::SharedState;
