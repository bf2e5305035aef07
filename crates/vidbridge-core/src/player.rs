//! Player facade
//!
//! [`VideoPlayer`] is the uniform entry point. Every state-changing
//! operation is queued, so commands issued back to back run strictly one
//! after another no matter how long the backend takes to confirm each of
//! them. The backend adapter is created lazily on the first load and
//! replaced when a source on another backend is loaded.

use crate::adapter::{create_adapter, BackendAdapter};
use crate::backend::PlayerHost;
use crate::options::{PlayerConfig, VideoOptions};
use crate::queue::{ActionHandle, ActionQueue};
use crate::source::{parse_video_url, SupportedVideoApi, VideoSource};
use crate::types::{ActionId, PlaybackStatus, PlayerId};
use crate::{Error, Result};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// Builder for [`VideoPlayer`]
pub struct VideoPlayerBuilder {
    host: Arc<dyn PlayerHost>,
    config: PlayerConfig,
    source: Option<Result<VideoSource>>,
    options: VideoOptions,
}

impl VideoPlayerBuilder {
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Video to load on the first queued operation
    pub fn video(mut self, id: impl Into<String>, api: SupportedVideoApi) -> Self {
        self.source = Some(Ok(VideoSource::new(api, id)));
        self
    }

    /// Like [`video`](Self::video), with the backend taken from the URL.
    /// Parse errors surface from [`build`](Self::build).
    pub fn url(mut self, url: &str) -> Self {
        self.source = Some(parse_video_url(url));
        self
    }

    pub fn options(mut self, options: VideoOptions) -> Self {
        self.options = options.normalized();
        self
    }

    /// Create the player. Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<VideoPlayer> {
        self.config.validate()?;
        let source = self.source.transpose()?;

        let id = PlayerId::new();
        info!(player = %id, source = ?source.as_ref().map(|s| s.to_string()), "Creating player");

        Ok(VideoPlayer {
            id,
            queue: ActionQueue::new(self.config.promise_safety_timeout()),
            inner: Arc::new(PlayerInner {
                host: self.host,
                config: self.config,
                state: Mutex::new(FacadeState {
                    source,
                    loaded: None,
                    adapter: None,
                    options: self.options,
                    destroyed: false,
                }),
            }),
        })
    }
}

/// Uniform video player
pub struct VideoPlayer {
    id: PlayerId,
    queue: ActionQueue,
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    host: Arc<dyn PlayerHost>,
    config: PlayerConfig,
    state: Mutex<FacadeState>,
}

struct FacadeState {
    /// Last source supplied by the caller
    source: Option<VideoSource>,
    /// Source the adapter currently holds
    loaded: Option<VideoSource>,
    adapter: Option<Arc<dyn BackendAdapter>>,
    /// Options accumulated across loads, handed to fresh adapters
    options: VideoOptions,
    destroyed: bool,
}

impl PlayerInner {
    fn state(&self) -> MutexGuard<'_, FacadeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn adapter(&self) -> Option<Arc<dyn BackendAdapter>> {
        self.state().adapter.clone()
    }

    fn resolve_source(
        &self,
        id: Option<String>,
        api: Option<SupportedVideoApi>,
    ) -> Result<VideoSource> {
        match (id, api) {
            (Some(id), Some(api)) => Ok(VideoSource::new(api, id)),
            (Some(url), None) => parse_video_url(&url),
            (None, api) => {
                let previous = self.state().source.clone().ok_or(Error::NoVideoSource)?;
                match api {
                    Some(api) if api != previous.api => Ok(VideoSource::new(api, previous.id)),
                    _ => Ok(previous),
                }
            }
        }
    }

    async fn load_source(
        &self,
        action: ActionId,
        source: VideoSource,
        options: Option<VideoOptions>,
    ) -> Result<PlaybackStatus> {
        let (adapter, replaced, merged) = {
            let mut state = self.state();
            if state.destroyed {
                return Err(Error::Destroyed);
            }
            state.source = Some(source.clone());
            if let Some(options) = &options {
                state.options.merge(options);
            }

            let current = state.adapter.clone();
            if let Some(adapter) = current.as_ref().filter(|a| a.api() == source.api) {
                if state.loaded.as_ref() == Some(&source) {
                    debug!(action = %action, %source, "Source already loaded");
                    return Ok(adapter.status());
                }
            }

            match current {
                Some(adapter) if adapter.api() == source.api => {
                    state.loaded = None;
                    (adapter, None, state.options.clone())
                }
                previous => {
                    let adapter = create_adapter(source.api, self.host.clone(), self.config.clone());
                    state.adapter = Some(adapter.clone());
                    state.loaded = None;
                    (adapter, previous, state.options.clone())
                }
            }
        };

        if let Some(previous) = replaced {
            info!(action = %action, from = %previous.api(), to = %source.api, "Switching backend");
            previous.destroy();
        }

        let status = adapter.load_video(action, &source.id, Some(merged)).await?;
        self.state().loaded = Some(source);
        Ok(status)
    }

    /// The loaded adapter, loading the last supplied source first when
    /// nothing is loaded yet
    async fn ensure_loaded(&self, action: ActionId) -> Result<Arc<dyn BackendAdapter>> {
        let source = {
            let state = self.state();
            if state.destroyed {
                return Err(Error::Destroyed);
            }
            if let (Some(adapter), Some(_)) = (&state.adapter, &state.loaded) {
                return Ok(adapter.clone());
            }
            state.source.clone().ok_or(Error::NoVideoSource)?
        };

        debug!(action = %action, %source, "Implicit load");
        self.load_source(action, source, None).await?;
        self.adapter().ok_or(Error::NotLoaded)
    }
}

impl VideoPlayer {
    pub fn builder(host: Arc<dyn PlayerHost>) -> VideoPlayerBuilder {
        VideoPlayerBuilder {
            host,
            config: PlayerConfig::default(),
            source: None,
            options: VideoOptions::default(),
        }
    }

    /// Player with default configuration and no source
    pub fn new(host: Arc<dyn PlayerHost>) -> Result<Self> {
        Self::builder(host).build()
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }

    /// Load a video.
    ///
    /// `id` is taken as a URL unless `api` names the backend. Without `id`
    /// the last supplied source is (re)loaded. Loading the source that is
    /// already loaded resolves with the current status.
    #[instrument(skip(self, options), fields(player = %self.id))]
    pub fn load_video(
        &self,
        id: Option<&str>,
        api: Option<SupportedVideoApi>,
        options: Option<VideoOptions>,
    ) -> ActionHandle<PlaybackStatus> {
        let inner = self.inner.clone();
        let id = id.map(str::to_string);
        self.queue.enqueue("load_video", move |action| async move {
            let source = inner.resolve_source(id, api)?;
            info!(action = %action, %source, "Loading video");
            inner.load_source(action, source, options).await
        })
    }

    pub fn load_video_from_url(&self, url: &str, options: Option<VideoOptions>) -> ActionHandle<PlaybackStatus> {
        self.load_video(Some(url), None, options)
    }

    fn enqueue_on_adapter<F, Fut>(&self, name: &'static str, op: F) -> ActionHandle<PlaybackStatus>
    where
        F: FnOnce(Arc<dyn BackendAdapter>, ActionId) -> Fut + Send + 'static,
        Fut: Future<Output = Result<PlaybackStatus>> + Send + 'static,
    {
        let inner = self.inner.clone();
        self.queue.enqueue(name, move |action| async move {
            let adapter = inner.ensure_loaded(action).await?;
            op(adapter, action).await
        })
    }

    #[instrument(skip(self), fields(player = %self.id))]
    pub fn start_video(&self) -> ActionHandle<PlaybackStatus> {
        self.enqueue_on_adapter("start_video", |adapter, action| async move {
            adapter.start_video(action).await
        })
    }

    #[instrument(skip(self), fields(player = %self.id))]
    pub fn pause_video(&self) -> ActionHandle<PlaybackStatus> {
        self.enqueue_on_adapter("pause_video", |adapter, action| async move {
            adapter.pause_video(action).await
        })
    }

    #[instrument(skip(self), fields(player = %self.id))]
    pub fn stop_video(&self) -> ActionHandle<PlaybackStatus> {
        self.enqueue_on_adapter("stop_video", |adapter, action| async move {
            adapter.stop_video(action).await
        })
    }

    /// Pause when playing, start otherwise. Decided when the action runs.
    #[instrument(skip(self), fields(player = %self.id))]
    pub fn play_or_pause_video(&self) -> ActionHandle<PlaybackStatus> {
        self.enqueue_on_adapter("play_or_pause_video", |adapter, action| async move {
            if adapter.can_pause() {
                adapter.pause_video(action).await
            } else {
                adapter.start_video(action).await
            }
        })
    }

    #[instrument(skip(self), fields(player = %self.id))]
    pub fn seek_video(&self, position: f64) -> ActionHandle<PlaybackStatus> {
        self.enqueue_on_adapter("seek_video", move |adapter, action| async move {
            if !position.is_finite() || position < 0.0 {
                return Err(Error::bad_parameter(format!("invalid seek position {}", position)));
            }
            adapter.seek_video(action, position).await
        })
    }

    /// Change the playback rate; `None` re-applies the stored rate option
    #[instrument(skip(self), fields(player = %self.id))]
    pub fn set_playback_rate(&self, rate: Option<f64>) -> ActionHandle<PlaybackStatus> {
        self.enqueue_on_adapter("set_playback_rate", move |adapter, action| async move {
            adapter.set_playback_rate(action, rate).await
        })
    }

    /// Set the volume (0..=100, 0 mutes). Applied immediately, outside the
    /// queue, and remembered for later loads.
    #[instrument(skip(self), fields(player = %self.id))]
    pub fn set_volume(&self, volume: u8) {
        let volume = volume.min(100);
        let adapter = {
            let mut state = self.inner.state();
            state.options.volume = Some(volume);
            state.adapter.clone()
        };
        if let Some(adapter) = adapter {
            adapter.set_volume(volume);
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.inner
            .adapter()
            .map_or(PlaybackStatus::NotLoaded, |a| a.status())
    }

    pub fn position(&self) -> Option<f64> {
        self.inner.adapter().and_then(|a| a.position())
    }

    pub fn duration(&self) -> Option<f64> {
        self.inner.adapter().and_then(|a| a.duration())
    }

    pub fn volume(&self) -> Option<u8> {
        self.inner.adapter().and_then(|a| a.volume())
    }

    pub fn playback_rate(&self) -> Option<f64> {
        self.inner.adapter().and_then(|a| a.playback_rate())
    }

    /// Rates the current backend accepts, empty before the first load
    pub fn allowed_playback_rates(&self) -> Vec<f64> {
        self.inner
            .adapter()
            .map(|a| a.allowed_playback_rates())
            .unwrap_or_default()
    }

    /// Without an adapter a start triggers the implicit load, so it is
    /// possible as soon as a source is known
    pub fn can_start(&self) -> bool {
        let state = self.inner.state();
        match &state.adapter {
            Some(adapter) => adapter.can_start(),
            None => state.source.is_some() && !state.destroyed,
        }
    }

    pub fn can_pause(&self) -> bool {
        self.inner.adapter().is_some_and(|a| a.can_pause())
    }

    pub fn can_stop(&self) -> bool {
        self.inner.adapter().is_some_and(|a| a.can_stop())
    }

    pub fn source(&self) -> Option<VideoSource> {
        self.inner.state().source.clone()
    }

    pub fn api(&self) -> Option<SupportedVideoApi> {
        self.inner.adapter().map(|a| a.api())
    }

    /// Options in effect: the adapter's once one exists, otherwise the
    /// ones accumulated for the next load
    pub fn options(&self) -> VideoOptions {
        match self.inner.adapter() {
            Some(adapter) => adapter.options(),
            None => self.inner.state().options.clone(),
        }
    }

    /// Actions queued or running
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state().destroyed
    }

    /// Tear the player down. Queued actions reject with
    /// [`Error::Destroyed`], and so does anything issued afterwards.
    #[instrument(skip(self), fields(player = %self.id))]
    pub fn destroy(&self) {
        let adapter = {
            let mut state = self.inner.state();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.loaded = None;
            state.adapter.take()
        };
        self.queue.close();
        if let Some(adapter) = adapter {
            adapter.destroy();
        }
        info!("Player destroyed");
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for VideoPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoPlayer")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("source", &self.source())
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimConfig, SimHost};

    const CLIP: &str = "https://cdn.example.com/clip.mp4";

    fn host() -> Arc<SimHost> {
        Arc::new(SimHost::new(SimConfig::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_builder_rejects_bad_url() {
        let err = VideoPlayer::builder(host())
            .url("https://www.youtube.com/watch?xxx=1")
            .build()
            .unwrap_err();
        assert_eq!(err.error_code(), "BAD_PARAMETER");
    }

    #[tokio::test(start_paused = true)]
    async fn test_builder_rejects_bad_config() {
        let config = PlayerConfig {
            seek_fallback_ms: 0,
            ..Default::default()
        };
        let err = VideoPlayer::builder(host()).config(config).build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_without_adapter() {
        let player = VideoPlayer::new(host()).unwrap();
        assert_eq!(player.status(), PlaybackStatus::NotLoaded);
        assert_eq!(player.position(), None);
        assert!(!player.can_start());
        assert!(!player.can_pause());
        assert_eq!(player.start_video().await, Err(Error::NoVideoSource));
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_before_load_is_kept() {
        let player = VideoPlayer::builder(host()).url(CLIP).build().unwrap();
        player.set_volume(30);
        assert_eq!(player.options().volume, Some(30));

        player.load_video(None, None, None).await.unwrap();
        assert_eq!(player.volume(), Some(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_without_source() {
        let player = VideoPlayer::new(host()).unwrap();
        assert_eq!(player.load_video(None, None, None).await, Err(Error::NoVideoSource));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_rejects_later_actions() {
        let player = VideoPlayer::builder(host()).url(CLIP).build().unwrap();
        player.load_video(None, None, None).await.unwrap();
        player.destroy();

        assert!(player.is_destroyed());
        assert_eq!(player.status(), PlaybackStatus::NotLoaded);
        assert_eq!(player.start_video().await, Err(Error::Destroyed));
    }
}
