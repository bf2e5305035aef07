//! vidbridge Core - uniform control over heterogeneous video backends
//!
//! This crate drives an HTML5 `<video>` element or a YouTube IFrame embed
//! through one async control surface:
//! - Source identification from URLs
//! - A per-player action queue that serializes commands
//! - Playback status tracking with per-backend transition tables
//! - Single-slot state-change handlers turning backend events into results
//! - Safety timeouts and a seek fallback for events that never arrive
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         vidbridge Core                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                    ┌──────────────┐                             │
//! │                    │ VideoPlayer  │  load / start / pause / ... │
//! │                    └──────┬───────┘                             │
//! │                           │                                     │
//! │                    ┌──────┴───────┐                             │
//! │                    │ Action Queue │  FIFO, safety timeout       │
//! │                    └──────┬───────┘                             │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴───────┐  ┌──────────────┐           │
//! │  │  Transition  │──│   Backend    │──│   Handler    │           │
//! │  │    Tables    │  │   Adapter    │  │   Registry   │           │
//! │  └──────────────┘  └──────┬───────┘  └──────────────┘           │
//! │                           │ commands ↓   ↑ events               │
//! │                    ┌──────┴───────┐                             │
//! │                    │  PlayerHost  │  DOM / IFrame API / sim     │
//! │                    └──────────────┘                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod backend;
pub mod error;
pub mod handlers;
pub mod options;
pub mod player;
pub mod queue;
pub mod sim;
pub mod source;
pub mod tables;
pub mod types;

pub use adapter::{create_adapter, BackendAdapter, Html5Adapter, YouTubeAdapter};
pub use backend::{EventSink, MediaElement, MediaEvent, PlayerHost, YouTubeEvent, YouTubePlayer};
pub use error::{Error, Result};
pub use handlers::{HandlerRegistry, PendingTransition};
pub use options::{PlayerConfig, VideoOptions};
pub use player::{VideoPlayer, VideoPlayerBuilder};
pub use queue::{ActionHandle, ActionQueue};
pub use sim::{SeekEvents, SimConfig, SimHost, SimProbe};
pub use source::{parse_video_url, SupportedVideoApi, VideoSource};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() {
    tracing::info!(version = VERSION, "vidbridge core initialized");
}
