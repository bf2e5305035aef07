//! Backend adapters
//!
//! One [`BackendAdapter`] implementation per supported backend. Each
//! adapter drives a native player, keeps its own [`PlaybackStatus`] in sync
//! with the backend's events, and turns those events back into the results
//! of the async operations that were waiting for them.

mod bootstrap;
mod html5;
mod shared;
mod youtube;

pub use bootstrap::{ensure_iframe_api, IFRAME_API_SCRIPT_ID, IFRAME_API_SRC};
pub use html5::{Html5Adapter, HTML5_PLAYBACK_RATES};
pub use youtube::YouTubeAdapter;

use crate::backend::PlayerHost;
use crate::handlers::HandlerRegistry;
use crate::options::{PlayerConfig, VideoOptions};
use crate::source::SupportedVideoApi;
use crate::tables::TransitionTable;
use crate::types::{ActionId, PlaybackStatus};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Uniform control surface over one backend
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Backend this adapter drives
    fn api(&self) -> SupportedVideoApi;

    /// Transition table the adapter consults
    fn table(&self) -> &'static TransitionTable;

    /// Create the native player if needed, apply `options` over the stored
    /// ones and load `source_id`. Resolves once the backend reports the
    /// video as cued.
    async fn load_video(
        &self,
        action: ActionId,
        source_id: &str,
        options: Option<VideoOptions>,
    ) -> Result<PlaybackStatus>;

    async fn start_video(&self, action: ActionId) -> Result<PlaybackStatus>;

    async fn pause_video(&self, action: ActionId) -> Result<PlaybackStatus>;

    async fn stop_video(&self, action: ActionId) -> Result<PlaybackStatus>;

    /// Seek without preparing the backend first. Only valid while paused,
    /// started or buffering.
    async fn seek_direct(&self, action: ActionId, position: f64) -> Result<PlaybackStatus>;

    /// Seek to `position` seconds.
    ///
    /// Backends only seek reliably once playback has begun, so from any
    /// other status the video is started and paused again first, muted
    /// while that happens.
    async fn seek_video(&self, action: ActionId, position: f64) -> Result<PlaybackStatus> {
        let status = self.status();
        if !matches!(
            status,
            PlaybackStatus::Paused | PlaybackStatus::Started | PlaybackStatus::Buffering
        ) {
            debug!(action = %action, %status, "Priming backend before seek");
            let stored_volume = self.options().volume;
            let prior_volume = self.volume().or(stored_volume).unwrap_or(100);
            self.set_volume(0);
            let primed = async {
                self.start_video(action).await?;
                self.pause_video(action).await
            }
            .await;
            self.set_volume(prior_volume);
            self.restore_volume_option(stored_volume);
            primed?;
        }
        self.seek_direct(action, position).await
    }

    /// Change the playback rate to `rate`, or to the stored `rate` option
    /// when `None`
    async fn set_playback_rate(&self, action: ActionId, rate: Option<f64>) -> Result<PlaybackStatus>;

    /// Rates the backend accepts
    fn allowed_playback_rates(&self) -> Vec<f64>;

    /// Set the volume in 0..=100; 0 mutes
    fn set_volume(&self, volume: u8);

    /// Overwrite the stored `volume` option without touching the backend
    fn restore_volume_option(&self, volume: Option<u8>);

    fn status(&self) -> PlaybackStatus;

    /// Current position in seconds, `None` until the player is ready
    fn position(&self) -> Option<f64>;

    fn duration(&self) -> Option<f64>;

    fn playback_rate(&self) -> Option<f64>;

    /// Effective volume in 0..=100 (0 while muted)
    fn volume(&self) -> Option<u8>;

    /// Options currently stored on the adapter
    fn options(&self) -> VideoOptions;

    /// Handler slots, for inspection
    fn handlers(&self) -> &HandlerRegistry;

    fn can_start(&self) -> bool {
        self.table().can_start(self.status())
    }

    fn can_pause(&self) -> bool {
        self.table().can_pause(self.status())
    }

    fn can_stop(&self) -> bool {
        self.table().can_stop(self.status())
    }

    /// Release the native player. The adapter must not be used afterwards.
    fn destroy(&self);
}

/// Create the adapter for `api`
pub fn create_adapter(
    api: SupportedVideoApi,
    host: Arc<dyn PlayerHost>,
    config: PlayerConfig,
) -> Arc<dyn BackendAdapter> {
    match api {
        SupportedVideoApi::Html5 => Arc::new(Html5Adapter::new(host, config)),
        SupportedVideoApi::YouTube => Arc::new(YouTubeAdapter::new(host, config)),
    }
}
