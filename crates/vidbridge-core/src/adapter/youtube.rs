//! YouTube IFrame adapter

use super::bootstrap::ensure_iframe_api;
use super::shared::AdapterCore;
use super::BackendAdapter;
use crate::backend::{
    youtube_error_message, EventSink, PlayerHost, YouTubeEvent, YouTubePlayer, YouTubePlayerConfig,
    YouTubePlayerVars,
};
use crate::handlers::HandlerRegistry;
use crate::options::{PlayerConfig, VideoOptions};
use crate::source::SupportedVideoApi;
use crate::tables::{TransitionTable, YOUTUBE_TABLE};
use crate::types::{ActionId, HandlerKey, PlaybackStatus};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, error, info, instrument, warn};

/// Adapter over a YouTube IFrame player
pub struct YouTubeAdapter {
    inner: Arc<YouTubeInner>,
}

struct YouTubeInner {
    core: AdapterCore,
    host: Arc<dyn PlayerHost>,
    player: Mutex<Option<Arc<dyn YouTubePlayer>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl YouTubeAdapter {
    pub fn new(host: Arc<dyn PlayerHost>, config: PlayerConfig) -> Self {
        Self {
            inner: Arc::new(YouTubeInner {
                core: AdapterCore::new(&YOUTUBE_TABLE, config),
                host,
                player: Mutex::new(None),
            }),
        }
    }

    fn ready_player(&self) -> Option<Arc<dyn YouTubePlayer>> {
        if self.inner.core.status().is_ready() {
            self.inner.player()
        } else {
            None
        }
    }
}

impl YouTubeInner {
    fn player(&self) -> Option<Arc<dyn YouTubePlayer>> {
        lock(&self.player).clone()
    }

    fn require_player(&self) -> Result<Arc<dyn YouTubePlayer>> {
        self.player().ok_or(Error::NotLoaded)
    }

    fn on_event(&self, event: YouTubeEvent) {
        debug!(event = event.name(), status = %self.core.status(), "IFrame event");

        match event {
            YouTubeEvent::Ready => {
                if let Some(status) = self.core.table().status_for_event(event.name()) {
                    self.core.apply_native(status, event.name());
                }
            }
            YouTubeEvent::StateChange(code) => match self.core.table().status_for_code(code) {
                Some(status) => self.core.apply_native(status, event.name()),
                None => {
                    error!(code, "Unknown player state");
                    self.core.handlers().reject_all(&Error::UnknownState { code });
                }
            },
            YouTubeEvent::PlaybackRateChange(rate) => {
                debug!(rate, "Playback rate changed");
                self.core
                    .handlers()
                    .notify(HandlerKey::RateChange, Ok(self.core.status()));
            }
            YouTubeEvent::Error(code) => {
                let message = youtube_error_message(code);
                error!(code, message, "Player error");
                self.core.handlers().reject_all(&Error::Backend {
                    code,
                    message: message.to_string(),
                });
            }
        }
    }

    fn player_config(video_id: &str, options: &VideoOptions) -> YouTubePlayerConfig {
        let looping = options.looping.unwrap_or(false);
        YouTubePlayerConfig {
            video_id: video_id.to_string(),
            width: options.width,
            height: options.height,
            player_vars: YouTubePlayerVars {
                autoplay: options.autoplay.unwrap_or(false),
                controls: options.controls.unwrap_or(false),
                looping,
                playlist: looping.then(|| video_id.to_string()),
                // The IFrame player only takes whole seconds, so the window
                // is widened to cover the requested range.
                start: options.start.map(|s| s.floor() as u32),
                end: options.end.map(|e| e.ceil() as u32),
            },
        }
    }

    fn apply_volume(&self, player: &dyn YouTubePlayer, volume: u8) {
        if volume == 0 {
            player.mute();
        } else {
            if player.is_muted() {
                player.un_mute();
            }
            player.set_volume(volume.min(100));
        }
    }

    /// Volume and rate cannot be passed to the IFrame constructor, so they
    /// are applied once the video is cued
    fn apply_after_cue(&self, player: &dyn YouTubePlayer, options: &VideoOptions) {
        if let Some(volume) = options.volume {
            self.apply_volume(player, volume);
        }
        let allowed = player.get_available_playback_rates();
        match self
            .core
            .resolve_rate_request(options.rate, Some(player.get_playback_rate()), &allowed)
        {
            Ok(Some(rate)) => player.set_playback_rate(rate),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring rate option"),
        }
    }
}

#[async_trait]
impl BackendAdapter for YouTubeAdapter {
    fn api(&self) -> SupportedVideoApi {
        SupportedVideoApi::YouTube
    }

    fn table(&self) -> &'static TransitionTable {
        self.inner.core.table()
    }

    #[instrument(skip(self, options), fields(action = %action))]
    async fn load_video(
        &self,
        action: ActionId,
        source_id: &str,
        options: Option<VideoOptions>,
    ) -> Result<PlaybackStatus> {
        let inner = &self.inner;
        let core = &inner.core;
        let options = core.merge_options(options.as_ref());

        let player = match inner.player() {
            Some(player) => {
                info!(video_id = source_id, "Cueing YouTube video");
                core.set_status(PlaybackStatus::Cueing, "cue");
                let pending = core.reserve(PlaybackStatus::Cued, action);
                player.cue_video_by_id(source_id, options.start, options.end);
                pending.await?;
                player
            }
            None => {
                let previous = core.set_status(PlaybackStatus::Cueing, "bootstrap");
                if let Err(e) = ensure_iframe_api(
                    inner.host.as_ref(),
                    core.config().iframe_poll_interval(),
                    action,
                )
                .await
                {
                    core.set_status(previous, "bootstrap failed");
                    return Err(e);
                }
                info!(video_id = source_id, "Creating YouTube player");

                let weak: Weak<YouTubeInner> = Arc::downgrade(inner);
                let sink: EventSink<YouTubeEvent> = Arc::new(move |event| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_event(event);
                    }
                });

                let pending = core.reserve(PlaybackStatus::Cued, action);
                let player = match inner
                    .host
                    .create_youtube_player(YouTubeInner::player_config(source_id, &options), sink)
                {
                    Ok(player) => player,
                    Err(e) => {
                        core.set_status(previous, "create failed");
                        return Err(e);
                    }
                };
                *lock(&inner.player) = Some(player.clone());
                pending.await?;
                player
            }
        };

        inner.apply_after_cue(player.as_ref(), &options);
        Ok(core.status())
    }

    async fn start_video(&self, action: ActionId) -> Result<PlaybackStatus> {
        let core = &self.inner.core;
        if !self.can_start() {
            debug!(action = %action, status = %core.status(), "Start is a no-op");
            return Ok(core.status());
        }
        let player = self.inner.require_player()?;

        let pending = core.reserve(PlaybackStatus::Started, action);
        core.set_status(PlaybackStatus::Starting, "start");
        player.play_video();
        core.settle(pending).await
    }

    async fn pause_video(&self, action: ActionId) -> Result<PlaybackStatus> {
        let core = &self.inner.core;
        if !self.can_pause() {
            debug!(action = %action, status = %core.status(), "Pause is a no-op");
            return Ok(core.status());
        }
        let player = self.inner.require_player()?;

        let pending = core.reserve(PlaybackStatus::Paused, action);
        core.set_status(PlaybackStatus::Pausing, "pause");
        player.pause_video();
        core.settle(pending).await
    }

    async fn stop_video(&self, action: ActionId) -> Result<PlaybackStatus> {
        let core = &self.inner.core;
        if !self.can_stop() {
            debug!(action = %action, status = %core.status(), "Stop is a no-op");
            return Ok(core.status());
        }
        let player = self.inner.require_player()?;

        let pending = core.reserve(PlaybackStatus::Stopped, action);
        core.set_status(PlaybackStatus::Stopping, "stop");
        player.stop_video();
        core.settle(pending).await
    }

    async fn seek_direct(&self, action: ActionId, position: f64) -> Result<PlaybackStatus> {
        let core = &self.inner.core;
        let player = self.inner.require_player()?;
        let pre_seek = core.status();
        debug!(action = %action, position, status = %pre_seek, "Seeking");

        let pending = core.reserve(pre_seek, action);
        core.set_status(PlaybackStatus::Seeking, "seek");
        player.seek_to(position.max(0.0), true);
        core.race_seek_fallback(action, pending, pre_seek).await
    }

    async fn set_playback_rate(&self, action: ActionId, rate: Option<f64>) -> Result<PlaybackStatus> {
        let core = &self.inner.core;
        let player = self.inner.require_player()?;
        let allowed = player.get_available_playback_rates();
        let Some(rate) = core.resolve_rate_request(rate, Some(player.get_playback_rate()), &allowed)?
        else {
            return Ok(core.status());
        };

        debug!(action = %action, rate, "Setting playback rate");
        core.update_options(|o| o.rate = Some(rate));
        let pending = core.handlers().set_handler(HandlerKey::RateChange, action);
        player.set_playback_rate(rate);
        core.settle(pending).await
    }

    /// Empty until a player exists; the list comes from the player itself
    fn allowed_playback_rates(&self) -> Vec<f64> {
        self.inner
            .player()
            .map(|p| p.get_available_playback_rates())
            .unwrap_or_default()
    }

    fn set_volume(&self, volume: u8) {
        let volume = volume.min(100);
        self.inner.core.update_options(|o| o.volume = Some(volume));
        if let Some(player) = self.inner.player() {
            self.inner.apply_volume(player.as_ref(), volume);
        }
    }

    fn restore_volume_option(&self, volume: Option<u8>) {
        self.inner.core.update_options(|o| o.volume = volume);
    }

    fn status(&self) -> PlaybackStatus {
        self.inner.core.status()
    }

    fn position(&self) -> Option<f64> {
        self.ready_player().map(|p| p.get_current_time())
    }

    fn duration(&self) -> Option<f64> {
        self.ready_player()
            .map(|p| p.get_duration())
            .filter(|d| *d > 0.0)
    }

    fn playback_rate(&self) -> Option<f64> {
        self.ready_player().map(|p| p.get_playback_rate())
    }

    fn volume(&self) -> Option<u8> {
        self.ready_player()
            .map(|p| if p.is_muted() { 0 } else { p.get_volume() })
    }

    fn options(&self) -> VideoOptions {
        self.inner.core.options()
    }

    fn handlers(&self) -> &HandlerRegistry {
        self.inner.core.handlers()
    }

    fn destroy(&self) {
        let inner = &self.inner;
        inner.core.handlers().reject_all(&Error::Destroyed);
        if let Some(player) = lock(&inner.player).take() {
            player.destroy();
        }
        inner.core.set_status(PlaybackStatus::NotLoaded, "destroy");
        info!("YouTube adapter destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SeekEvents, SimConfig, SimHost};
    use std::time::Duration;
    use tokio::time::Instant;

    const VIDEO_ID: &str = "C0DPdy98e4c";

    fn adapter(config: SimConfig) -> (YouTubeAdapter, Arc<SimHost>) {
        let host = Arc::new(SimHost::new(config));
        (YouTubeAdapter::new(host.clone(), PlayerConfig::default()), host)
    }

    #[test]
    fn test_player_window_widens_to_whole_seconds() {
        let options = VideoOptions::default().with_window(Some(2.7), Some(5.5));
        let config = YouTubeInner::player_config(VIDEO_ID, &options);
        assert_eq!(config.player_vars.start, Some(2));
        assert_eq!(config.player_vars.end, Some(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_load_bootstraps_api() {
        let (adapter, host) = adapter(SimConfig::default());

        let status = adapter
            .load_video(ActionId::new(), VIDEO_ID, Some(VideoOptions::default().with_volume(0)))
            .await
            .unwrap();

        assert_eq!(status, PlaybackStatus::Cued);
        assert_eq!(host.probe().script_injections(), 1);
        assert_eq!(host.probe().youtube_players_created(), 1);
        assert_eq!(adapter.volume(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_load_cues_existing_player() {
        let (adapter, host) = adapter(SimConfig::default());
        adapter.load_video(ActionId::new(), VIDEO_ID, None).await.unwrap();
        adapter.start_video(ActionId::new()).await.unwrap();

        let status = adapter
            .load_video(ActionId::new(), "dQw4w9WgXcQ", None)
            .await
            .unwrap();
        assert_eq!(status, PlaybackStatus::Cued);
        assert_eq!(host.probe().youtube_players_created(), 1);
        assert_eq!(host.probe().cue_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_pause_stop() {
        let (adapter, _host) = adapter(SimConfig::default());
        adapter.load_video(ActionId::new(), VIDEO_ID, None).await.unwrap();

        assert_eq!(adapter.start_video(ActionId::new()).await, Ok(PlaybackStatus::Started));
        assert_eq!(adapter.pause_video(ActionId::new()).await, Ok(PlaybackStatus::Paused));
        assert_eq!(adapter.stop_video(ActionId::new()).await, Ok(PlaybackStatus::Stopped));
        assert!(!adapter.can_stop());
        assert!(adapter.handlers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_while_started_passes_through_buffering() {
        let (adapter, _host) = adapter(SimConfig::default());
        adapter.load_video(ActionId::new(), VIDEO_ID, None).await.unwrap();
        adapter.start_video(ActionId::new()).await.unwrap();

        let status = adapter.seek_video(ActionId::new(), 30.0).await.unwrap();
        assert_eq!(status, PlaybackStatus::Started);
        assert!(adapter.position().unwrap() >= 30.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_seek_falls_back() {
        let (adapter, _host) = adapter(SimConfig {
            seek_events: SeekEvents::Never,
            ..Default::default()
        });
        adapter.load_video(ActionId::new(), VIDEO_ID, None).await.unwrap();
        adapter.start_video(ActionId::new()).await.unwrap();
        adapter.pause_video(ActionId::new()).await.unwrap();

        let started = Instant::now();
        let status = adapter.seek_video(ActionId::new(), 12.0).await.unwrap();
        assert_eq!(status, PlaybackStatus::Paused);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_change_waits_for_event() {
        let (adapter, _host) = adapter(SimConfig::default());
        assert!(adapter.allowed_playback_rates().is_empty());
        adapter.load_video(ActionId::new(), VIDEO_ID, None).await.unwrap();

        adapter.set_playback_rate(ActionId::new(), Some(1.5)).await.unwrap();
        assert_eq!(adapter.playback_rate(), Some(1.5));

        let err = adapter
            .set_playback_rate(ActionId::new(), Some(3.0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadPlaybackRate { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_state_rejects_waiters() {
        let (adapter, _host) = adapter(SimConfig::default());
        adapter.load_video(ActionId::new(), VIDEO_ID, None).await.unwrap();

        let pending = adapter
            .handlers()
            .set_handler(HandlerKey::Status(PlaybackStatus::Started), ActionId::new());
        adapter.inner.on_event(YouTubeEvent::StateChange(42));
        assert_eq!(pending.await, Err(Error::UnknownState { code: 42 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_error_rejects_waiters() {
        let (adapter, _host) = adapter(SimConfig::default());
        adapter.load_video(ActionId::new(), VIDEO_ID, None).await.unwrap();

        let pending = adapter
            .handlers()
            .set_handler(HandlerKey::Status(PlaybackStatus::Started), ActionId::new());
        adapter.inner.on_event(YouTubeEvent::Error(150));
        assert!(matches!(pending.await, Err(Error::Backend { code: 150, .. })));
    }

    #[test]
    fn test_player_config_for_loop() {
        let options = VideoOptions::default()
            .with_loop(true)
            .with_window(Some(1.5), Some(9.2));
        let config = YouTubeInner::player_config(VIDEO_ID, &options);

        assert_eq!(config.player_vars.playlist.as_deref(), Some(VIDEO_ID));
        assert_eq!(config.player_vars.start, Some(1));
        assert_eq!(config.player_vars.end, Some(10));
    }
}
