//! Simulated `<video>` element

use super::{lock, Playback, SeekEvents, SimConfig, SimProbe};
use crate::backend::{EventSink, MediaElement, MediaEvent};
use std::sync::{Arc, Mutex, Weak};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Default)]
struct ElementState {
    src: Option<String>,
    /// When `canplay` fires for the current source
    loaded_at: Option<Instant>,
    load_serial: u64,
    volume: f64,
    muted: bool,
    autoplay: bool,
    controls: bool,
    width: Option<u32>,
    height: Option<u32>,
    removed: bool,
}

impl ElementState {
    fn loaded(&self) -> bool {
        self.loaded_at.is_some_and(|at| Instant::now() >= at)
    }
}

pub struct SimMediaElement {
    weak_self: Weak<SimMediaElement>,
    config: SimConfig,
    probe: SimProbe,
    playback: Arc<Playback<MediaEvent>>,
    state: Mutex<ElementState>,
}

fn ended_events() -> Vec<MediaEvent> {
    vec![MediaEvent::Pause, MediaEvent::Ended]
}

impl SimMediaElement {
    pub(crate) fn new(config: &SimConfig, probe: SimProbe, events: EventSink<MediaEvent>) -> Arc<Self> {
        let playback = Playback::new(config.media_duration, events, config.event_latency);
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            config: config.clone(),
            probe,
            playback,
            state: Mutex::new(ElementState {
                volume: 1.0,
                ..Default::default()
            }),
        })
    }

    pub fn src(&self) -> Option<String> {
        lock(&self.state).src.clone()
    }

    pub fn is_removed(&self) -> bool {
        lock(&self.state).removed
    }

    pub fn controls(&self) -> bool {
        lock(&self.state).controls
    }

    pub fn size(&self) -> (Option<u32>, Option<u32>) {
        let state = lock(&self.state);
        (state.width, state.height)
    }

    fn begin_playback(&self) {
        {
            let mut transport = self.playback.transport();
            if transport.is_playing() {
                return;
            }
            transport.play();
        }
        self.playback.emitter.emit(MediaEvent::Play);
        self.playback.emitter.emit(MediaEvent::Playing);
        self.playback.arm_end_timer(ended_events);
    }
}

impl MediaElement for SimMediaElement {
    fn play(&self) {
        self.probe.bump(|c| &c.play_calls);
        {
            let state = lock(&self.state);
            if state.removed || state.src.is_none() {
                return;
            }
        }
        self.begin_playback();
    }

    fn pause(&self) {
        self.probe.bump(|c| &c.pause_calls);
        {
            let mut transport = self.playback.transport();
            if !transport.is_playing() {
                return;
            }
            transport.pause();
        }
        self.playback.emitter.emit(MediaEvent::Pause);
    }

    fn set_src(&self, src: &str) {
        let latency = self.playback.emitter.latency();
        let stalled = self.config.stalled_sources.iter().any(|s| s == src);
        let (serial, loaded_at, autoplay) = {
            let mut state = lock(&self.state);
            state.src = Some(src.to_string());
            state.load_serial += 1;
            let loaded_at = Instant::now() + latency * 2;
            state.loaded_at = (!stalled).then_some(loaded_at);
            (state.load_serial, loaded_at, state.autoplay)
        };
        debug!(src, stalled, "Simulated element loading");

        self.playback
            .transport()
            .reset(0.0, self.config.media_duration);
        self.playback.emitter.emit(MediaEvent::LoadStart);
        if stalled {
            return;
        }
        self.playback.emitter.emit_after(latency * 2, MediaEvent::CanPlay);

        if autoplay {
            let weak = self.weak_self.clone();
            tokio::spawn(async move {
                tokio::time::sleep_until(loaded_at).await;
                let Some(element) = weak.upgrade() else { return };
                let current = {
                    let state = lock(&element.state);
                    !state.removed && state.load_serial == serial
                };
                if current {
                    element.begin_playback();
                }
            });
        }
    }

    fn current_time(&self) -> f64 {
        self.playback.transport().position()
    }

    fn set_current_time(&self, seconds: f64) {
        let loaded = lock(&self.state).loaded();
        let playing = {
            let mut transport = self.playback.transport();
            transport.seek(seconds);
            transport.is_playing()
        };
        if !loaded {
            return;
        }

        self.probe.bump(|c| &c.seek_calls);
        if self.config.seek_events == SeekEvents::Always {
            self.playback.emitter.emit(MediaEvent::Seeking);
            self.playback.emitter.emit(MediaEvent::Seeked);
        }
        if playing {
            self.playback.arm_end_timer(ended_events);
        }
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.state)
            .loaded()
            .then_some(self.config.media_duration)
    }

    fn volume(&self) -> f64 {
        lock(&self.state).volume
    }

    fn set_volume(&self, volume: f64) {
        lock(&self.state).volume = volume.clamp(0.0, 1.0);
    }

    fn muted(&self) -> bool {
        lock(&self.state).muted
    }

    fn set_muted(&self, muted: bool) {
        lock(&self.state).muted = muted;
    }

    fn playback_rate(&self) -> f64 {
        self.playback.transport().rate()
    }

    fn set_playback_rate(&self, rate: f64) {
        self.probe.bump(|c| &c.rate_calls);
        let playing = {
            let mut transport = self.playback.transport();
            transport.set_rate(rate);
            transport.is_playing()
        };
        self.playback.emitter.emit(MediaEvent::RateChange);
        if playing {
            self.playback.arm_end_timer(ended_events);
        }
    }

    fn set_loop(&self, looping: bool) {
        self.playback.transport().set_looping(looping);
    }

    fn set_autoplay(&self, autoplay: bool) {
        lock(&self.state).autoplay = autoplay;
    }

    fn set_controls(&self, controls: bool) {
        lock(&self.state).controls = controls;
    }

    fn set_width(&self, width: u32) {
        lock(&self.state).width = Some(width);
    }

    fn set_height(&self, height: u32) {
        lock(&self.state).height = Some(height);
    }

    fn remove(&self) {
        lock(&self.state).removed = true;
        self.playback.transport().pause();
        self.probe.bump(|c| &c.elements_removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn recording() -> (EventSink<MediaEvent>, Arc<Mutex<Vec<MediaEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: EventSink<MediaEvent> = Arc::new(move |event| sink_seen.lock().unwrap().push(event));
        (sink, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_then_autoplay() {
        let (sink, seen) = recording();
        let element = SimMediaElement::new(&SimConfig::default(), SimProbe::default(), sink);
        element.set_autoplay(true);
        element.set_src("clip.mp4");
        assert_eq!(element.duration(), None);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                MediaEvent::LoadStart,
                MediaEvent::CanPlay,
                MediaEvent::Play,
                MediaEvent::Playing
            ]
        );
        assert_eq!(element.duration(), Some(60.0));
        assert!(element.current_time() > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_natural_end_and_replay() {
        let config = SimConfig {
            media_duration: 2.0,
            ..Default::default()
        };
        let (sink, seen) = recording();
        let element = SimMediaElement::new(&config, SimProbe::default(), sink);
        element.set_src("clip.mp4");
        tokio::time::sleep(Duration::from_millis(100)).await;

        element.play();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(element.current_time(), 2.0);
        assert_eq!(seen.lock().unwrap().last(), Some(&MediaEvent::Ended));

        element.play();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let position = element.current_time();
        assert!(position > 0.0 && position < 1.0, "position {}", position);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_seeks() {
        let config = SimConfig {
            seek_events: SeekEvents::Never,
            ..Default::default()
        };
        let (sink, seen) = recording();
        let element = SimMediaElement::new(&config, SimProbe::default(), sink);
        element.set_src("clip.mp4");
        tokio::time::sleep(Duration::from_millis(100)).await;

        element.set_current_time(5.0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(element.current_time(), 5.0);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_source_never_becomes_playable() {
        let config = SimConfig {
            stalled_sources: vec!["broken.mp4".to_string()],
            ..Default::default()
        };
        let (sink, seen) = recording();
        let element = SimMediaElement::new(&config, SimProbe::default(), sink);
        element.set_src("broken.mp4");
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(*seen.lock().unwrap(), vec![MediaEvent::LoadStart]);
        assert_eq!(element.duration(), None);

        element.set_src("clip.mp4");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(seen.lock().unwrap().last(), Some(&MediaEvent::CanPlay));
        assert_eq!(element.src().as_deref(), Some("clip.mp4"));
    }
}
