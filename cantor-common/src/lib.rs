//! # Cantor Common Library
//!
//! Shared code for Cantor crates including:
//! - Content and tier data model (ContentReference, ResolvedSource)
//! - Event types (CantorEvent enum) and the playback session snapshot
//! - Configuration file discovery and root folder resolution
//! - Common error type

pub mod config;
pub mod content;
pub mod error;
pub mod events;

pub use content::{ContentReference, ContentType, ResolvedSource, Tier};
pub use error::{Error, Result};
pub use events::{CantorEvent, EventBus, FailureKind, PlaybackMode, PlaybackSession};
