//! HTML5 `<video>` adapter

use super::shared::AdapterCore;
use super::BackendAdapter;
use crate::backend::{EventSink, MediaElement, MediaEvent, PlayerHost};
use crate::handlers::HandlerRegistry;
use crate::options::{PlayerConfig, VideoOptions};
use crate::source::SupportedVideoApi;
use crate::tables::{TransitionTable, HTML5_TABLE};
use crate::types::{ActionId, HandlerKey, PlaybackStatus};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

/// Rates offered by the HTML5 adapter. Media elements accept any positive
/// rate; this keeps both backends on the same list.
pub const HTML5_PLAYBACK_RATES: &[f64] = &[0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

/// Position tolerance when checking the `end` option
const END_TOLERANCE: f64 = 1e-3;

/// Adapter over a native media element
pub struct Html5Adapter {
    inner: Arc<Html5Inner>,
}

struct Html5Inner {
    core: AdapterCore,
    host: Arc<dyn PlayerHost>,
    element: Mutex<Option<Arc<dyn MediaElement>>>,
    /// Status to return to once a seek completes
    resume_status: Mutex<Option<PlaybackStatus>>,
    end_watch: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Html5Adapter {
    pub fn new(host: Arc<dyn PlayerHost>, config: PlayerConfig) -> Self {
        Self {
            inner: Arc::new(Html5Inner {
                core: AdapterCore::new(&HTML5_TABLE, config),
                host,
                element: Mutex::new(None),
                resume_status: Mutex::new(None),
                end_watch: Mutex::new(None),
            }),
        }
    }

    fn ready_element(&self) -> Option<Arc<dyn MediaElement>> {
        if self.inner.core.status().is_ready() {
            self.inner.element()
        } else {
            None
        }
    }
}

impl Html5Inner {
    fn element(&self) -> Option<Arc<dyn MediaElement>> {
        lock(&self.element).clone()
    }

    fn require_element(&self) -> Result<Arc<dyn MediaElement>> {
        self.element().ok_or(Error::NotLoaded)
    }

    fn ensure_element(self: &Arc<Self>) -> Result<Arc<dyn MediaElement>> {
        if let Some(element) = self.element() {
            return Ok(element);
        }

        let weak: Weak<Html5Inner> = Arc::downgrade(self);
        let sink: EventSink<MediaEvent> = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_event(event);
            }
        });
        let element = self.host.create_media_element(sink)?;
        *lock(&self.element) = Some(element.clone());
        debug!("Created media element");
        Ok(element)
    }

    /// Native event listener
    fn on_event(self: &Arc<Self>, event: MediaEvent) {
        let current = self.core.status();
        debug!(event = event.name(), status = %current, "Media event");

        match event {
            MediaEvent::CanPlay if current.is_ready() => {
                // canplay fires again whenever data arrives after a seek
            }
            MediaEvent::Seeking => {
                let mut resume = lock(&self.resume_status);
                if resume.is_none() && current != PlaybackStatus::Seeking {
                    *resume = Some(current);
                }
                drop(resume);
                self.core.apply_native(PlaybackStatus::Seeking, event.name());
            }
            MediaEvent::Seeked => {
                let restored = lock(&self.resume_status).take().unwrap_or(current);
                let restored = if restored == PlaybackStatus::Seeking {
                    PlaybackStatus::Paused
                } else {
                    restored
                };
                self.core.apply_native(restored, event.name());
            }
            MediaEvent::Pause if current == PlaybackStatus::Ending => {
                self.core.apply_native(PlaybackStatus::Ended, event.name());
            }
            MediaEvent::RateChange => {
                self.core.handlers().notify(HandlerKey::RateChange, Ok(current));
            }
            ref other => match self.core.table().status_for_event(other.name()) {
                Some(status) => {
                    self.core.apply_native(status, other.name());
                    if status == PlaybackStatus::Started {
                        self.ensure_end_watch();
                    }
                }
                None => debug!(event = other.name(), "Untracked media event"),
            },
        }
    }

    /// Media elements have no end position, so one is enforced here: once
    /// playing, poll the position and pause at `end`.
    fn ensure_end_watch(self: &Arc<Self>) {
        let Some(end) = self.core.options().end else {
            return;
        };

        let mut slot = lock(&self.end_watch);
        if slot.as_ref().is_some_and(|watch| !watch.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(self);
        let interval = self.core.config().end_watch_interval();
        *slot = Some(tokio::spawn(async move {
            loop {
                let Some(inner) = weak.upgrade() else { break };
                let status = inner.core.status();
                if !matches!(
                    status,
                    PlaybackStatus::Started
                        | PlaybackStatus::Starting
                        | PlaybackStatus::Seeking
                        | PlaybackStatus::Buffering
                ) {
                    break;
                }
                let Some(element) = inner.element() else { break };

                let position = element.current_time();
                if position + END_TOLERANCE >= end {
                    info!(position, end, "End position reached");
                    inner.core.set_status(PlaybackStatus::Ending, "end option");
                    element.pause();
                    break;
                }

                let rate = element.playback_rate().max(0.1);
                let wait = Duration::from_secs_f64((end - position) / rate).min(interval);
                drop(inner);
                tokio::time::sleep(wait).await;
            }
        }));
    }

    fn stop_end_watch(&self) {
        if let Some(watch) = lock(&self.end_watch).take() {
            watch.abort();
        }
    }

    fn apply_volume(&self, element: &dyn MediaElement, volume: u8) {
        if volume == 0 {
            element.set_muted(true);
        } else {
            if element.muted() {
                element.set_muted(false);
            }
            element.set_volume(f64::from(volume.min(100)) / 100.0);
        }
    }

    fn apply_attributes(&self, element: &dyn MediaElement, options: &VideoOptions) {
        if let Some(volume) = options.volume {
            self.apply_volume(element, volume);
        }
        if let Some(looping) = options.looping {
            element.set_loop(looping);
        }
        if let Some(autoplay) = options.autoplay {
            element.set_autoplay(autoplay);
        }
        if let Some(controls) = options.controls {
            element.set_controls(controls);
        }
        if let Some(width) = options.width {
            element.set_width(width);
        }
        if let Some(height) = options.height {
            element.set_height(height);
        }
        if let Some(rate) = options.rate {
            element.set_playback_rate(rate);
        }
    }
}

#[async_trait]
impl BackendAdapter for Html5Adapter {
    fn api(&self) -> SupportedVideoApi {
        SupportedVideoApi::Html5
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
        let options = inner.core.merge_options(options.as_ref());
        info!(src = source_id, "Loading HTML5 video");

        inner.stop_end_watch();
        lock(&inner.resume_status).take();
        let element = inner.ensure_element()?;
        inner.apply_attributes(element.as_ref(), &options);

        inner.core.set_status(PlaybackStatus::Cueing, "load");
        let pending = inner.core.reserve(PlaybackStatus::Cued, action);
        element.set_src(source_id);
        if let Some(start) = options.start {
            element.set_current_time(start);
        }
        inner.core.settle(pending).await
    }

    async fn start_video(&self, action: ActionId) -> Result<PlaybackStatus> {
        let core = &self.inner.core;
        if !self.can_start() {
            debug!(action = %action, status = %core.status(), "Start is a no-op");
            return Ok(core.status());
        }
        let element = self.inner.require_element()?;

        let pending = core.reserve(PlaybackStatus::Started, action);
        core.set_status(PlaybackStatus::Starting, "start");
        element.play();
        core.settle(pending).await
    }

    async fn pause_video(&self, action: ActionId) -> Result<PlaybackStatus> {
        let core = &self.inner.core;
        if !self.can_pause() {
            debug!(action = %action, status = %core.status(), "Pause is a no-op");
            return Ok(core.status());
        }
        let element = self.inner.require_element()?;

        let pending = core.reserve(PlaybackStatus::Paused, action);
        core.set_status(PlaybackStatus::Pausing, "pause");
        element.pause();
        core.settle(pending).await
    }

    /// Media elements cannot stop, only pause. Stopping pauses and then
    /// reports `stopped` so both backends share one status vocabulary.
    async fn stop_video(&self, action: ActionId) -> Result<PlaybackStatus> {
        let core = &self.inner.core;
        let status = core.status();
        if !self.can_stop() {
            debug!(action = %action, %status, "Stop is a no-op");
            return Ok(status);
        }
        let element = self.inner.require_element()?;
        self.inner.stop_end_watch();

        if matches!(status, PlaybackStatus::Paused | PlaybackStatus::Ended) {
            core.set_status(PlaybackStatus::Stopped, "stop while halted");
            return Ok(PlaybackStatus::Stopped);
        }

        let pending = core.reserve(PlaybackStatus::Paused, action);
        core.set_status(PlaybackStatus::Stopping, "stop");
        element.pause();
        pending.await?;
        core.set_status(PlaybackStatus::Stopped, "stop after pause");
        Ok(PlaybackStatus::Stopped)
    }

    async fn seek_direct(&self, action: ActionId, position: f64) -> Result<PlaybackStatus> {
        let inner = &self.inner;
        let element = inner.require_element()?;
        let pre_seek = inner.core.status();
        debug!(action = %action, position, status = %pre_seek, "Seeking");

        *lock(&inner.resume_status) = Some(pre_seek);
        let pending = inner.core.reserve(pre_seek, action);
        inner.core.set_status(PlaybackStatus::Seeking, "seek");
        element.set_current_time(position.max(0.0));

        let result = inner.core.race_seek_fallback(action, pending, pre_seek).await;
        lock(&inner.resume_status).take();
        result
    }

    async fn set_playback_rate(&self, action: ActionId, rate: Option<f64>) -> Result<PlaybackStatus> {
        let core = &self.inner.core;
        let element = self.inner.require_element()?;
        let Some(rate) =
            core.resolve_rate_request(rate, Some(element.playback_rate()), HTML5_PLAYBACK_RATES)?
        else {
            return Ok(core.status());
        };

        debug!(action = %action, rate, "Setting playback rate");
        core.update_options(|o| o.rate = Some(rate));
        let pending = core.handlers().set_handler(HandlerKey::RateChange, action);
        element.set_playback_rate(rate);
        core.settle(pending).await
    }

    fn allowed_playback_rates(&self) -> Vec<f64> {
        HTML5_PLAYBACK_RATES.to_vec()
    }

    fn set_volume(&self, volume: u8) {
        let volume = volume.min(100);
        self.inner.core.update_options(|o| o.volume = Some(volume));
        if let Some(element) = self.inner.element() {
            self.inner.apply_volume(element.as_ref(), volume);
        }
    }

    fn restore_volume_option(&self, volume: Option<u8>) {
        self.inner.core.update_options(|o| o.volume = volume);
    }

    fn status(&self) -> PlaybackStatus {
        self.inner.core.status()
    }

    fn position(&self) -> Option<f64> {
        self.ready_element().map(|e| e.current_time())
    }

    fn duration(&self) -> Option<f64> {
        self.ready_element().and_then(|e| e.duration())
    }

    fn playback_rate(&self) -> Option<f64> {
        self.ready_element().map(|e| e.playback_rate())
    }

    fn volume(&self) -> Option<u8> {
        self.ready_element().map(|e| {
            if e.muted() {
                0
            } else {
                (e.volume() * 100.0).round().clamp(0.0, 100.0) as u8
            }
        })
    }

    fn options(&self) -> VideoOptions {
        self.inner.core.options()
    }

    fn handlers(&self) -> &HandlerRegistry {
        self.inner.core.handlers()
    }

    fn destroy(&self) {
        let inner = &self.inner;
        inner.stop_end_watch();
        inner.core.handlers().reject_all(&Error::Destroyed);
        if let Some(element) = lock(&inner.element).take() {
            element.remove();
        }
        inner.core.set_status(PlaybackStatus::NotLoaded, "destroy");
        info!("HTML5 adapter destroyed");
    }
}
