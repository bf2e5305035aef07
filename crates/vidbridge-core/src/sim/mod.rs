//! In-process simulation host
//!
//! [`SimHost`] implements [`PlayerHost`] without a browser: media elements
//! and IFrame players keep a virtual playback clock on the tokio timer and
//! report events after a configurable latency, in the order a browser
//! would. The CLI drives it, and so do the tests (with the tokio clock
//! paused, runs are deterministic).

mod media;
mod youtube;

pub use media::SimMediaElement;
pub use youtube::SimYouTubePlayer;

use crate::adapter::IFRAME_API_SCRIPT_ID;
use crate::backend::{
    EventSink, MediaElement, MediaEvent, PlayerHost, YouTubeEvent, YouTubePlayer,
    YouTubePlayerConfig,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Whether simulated players confirm seeks with events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekEvents {
    /// Report seeks like a browser does
    #[default]
    Always,
    /// Stay silent, as some backends do for already buffered positions
    Never,
}

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Delay between a native call and the events it causes
    pub event_latency: Duration,
    /// Time an injected script takes to load
    pub script_latency: Duration,
    /// Length of every simulated video in seconds
    pub media_duration: f64,
    pub seek_events: SeekEvents,
    /// Rates the simulated IFrame player offers
    pub youtube_rates: Vec<f64>,
    /// HTML5 sources that start loading but never become playable
    pub stalled_sources: Vec<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            event_latency: Duration::from_millis(20),
            script_latency: Duration::from_millis(200),
            media_duration: 60.0,
            seek_events: SeekEvents::Always,
            youtube_rates: vec![0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0],
            stalled_sources: Vec::new(),
        }
    }
}

/// Call counters shared by a host and every player it created
#[derive(Debug, Clone, Default)]
pub struct SimProbe {
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    elements_created: AtomicUsize,
    elements_removed: AtomicUsize,
    youtube_players_created: AtomicUsize,
    youtube_players_destroyed: AtomicUsize,
    script_injections: AtomicUsize,
    play_calls: AtomicUsize,
    pause_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    seek_calls: AtomicUsize,
    cue_calls: AtomicUsize,
    rate_calls: AtomicUsize,
}

macro_rules! probe_counter {
    ($($name:ident),* $(,)?) => {
        impl SimProbe {
            $(
                pub fn $name(&self) -> usize {
                    self.counters.$name.load(Ordering::SeqCst)
                }
            )*
        }
    };
}

probe_counter!(
    elements_created,
    elements_removed,
    youtube_players_created,
    youtube_players_destroyed,
    script_injections,
    play_calls,
    pause_calls,
    stop_calls,
    seek_calls,
    cue_calls,
    rate_calls,
);

impl SimProbe {
    fn bump(&self, counter: impl Fn(&Counters) -> &AtomicUsize) {
        counter(&self.counters).fetch_add(1, Ordering::SeqCst);
    }
}

/// Simulated page hosting players
pub struct SimHost {
    config: SimConfig,
    /// Injected scripts and the instant each finishes loading
    scripts: Mutex<HashMap<String, Instant>>,
    probe: SimProbe,
}

impl SimHost {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            scripts: Mutex::new(HashMap::new()),
            probe: SimProbe::default(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn probe(&self) -> SimProbe {
        self.probe.clone()
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl PlayerHost for SimHost {
    fn create_media_element(&self, events: EventSink<MediaEvent>) -> Result<Arc<dyn MediaElement>> {
        self.probe.bump(|c| &c.elements_created);
        debug!("Creating simulated media element");
        Ok(SimMediaElement::new(&self.config, self.probe.clone(), events))
    }

    fn create_youtube_player(
        &self,
        config: YouTubePlayerConfig,
        events: EventSink<YouTubeEvent>,
    ) -> Result<Arc<dyn YouTubePlayer>> {
        if !self.script_loaded(IFRAME_API_SCRIPT_ID) {
            return Err(Error::Internal("IFrame API is not loaded".to_string()));
        }
        self.probe.bump(|c| &c.youtube_players_created);
        debug!(video_id = %config.video_id, "Creating simulated IFrame player");
        Ok(SimYouTubePlayer::new(&self.config, self.probe.clone(), config, events))
    }

    fn inject_script(&self, id: &str, src: &str) -> bool {
        let mut scripts = lock(&self.scripts);
        if scripts.contains_key(id) {
            return false;
        }
        debug!(id, src, "Injecting script");
        scripts.insert(id.to_string(), Instant::now() + self.config.script_latency);
        self.probe.bump(|c| &c.script_injections);
        true
    }

    fn script_loaded(&self, id: &str) -> bool {
        lock(&self.scripts)
            .get(id)
            .is_some_and(|ready_at| Instant::now() >= *ready_at)
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Delivers events to a sink in order, each after the configured latency
pub(crate) struct Emitter<E> {
    sender: mpsc::UnboundedSender<(Instant, E)>,
    latency: Duration,
}

impl<E: std::fmt::Debug + Send + 'static> Emitter<E> {
    pub(crate) fn spawn(sink: EventSink<E>, latency: Duration) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<(Instant, E)>();
        tokio::spawn(async move {
            while let Some((due, event)) = receiver.recv().await {
                tokio::time::sleep_until(due).await;
                trace!(?event, "Delivering simulated event");
                sink(event);
            }
        });
        Self { sender, latency }
    }

    pub(crate) fn emit(&self, event: E) {
        self.emit_after(self.latency, event);
    }

    pub(crate) fn emit_after(&self, delay: Duration, event: E) {
        // the receiver only goes away with the runtime
        let _ = self.sender.send((Instant::now() + delay, event));
    }

    pub(crate) fn latency(&self) -> Duration {
        self.latency
    }
}

/// Virtual playback clock
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    /// Position when `since` was taken
    base: f64,
    /// Set while playing
    since: Option<Instant>,
    rate: f64,
    /// Where playback stops on its own
    limit: f64,
    /// Where looping and replay restart
    restart_at: f64,
    looping: bool,
    /// Bumped on every change so stale end timers can tell
    generation: u64,
}

impl Transport {
    pub(crate) fn new(duration: f64) -> Self {
        Self {
            base: 0.0,
            since: None,
            rate: 1.0,
            limit: duration,
            restart_at: 0.0,
            looping: false,
            generation: 0,
        }
    }

    pub(crate) fn position(&self) -> f64 {
        match self.since {
            Some(since) => {
                let elapsed = Instant::now().saturating_duration_since(since).as_secs_f64();
                (self.base + elapsed * self.rate).min(self.limit)
            }
            None => self.base,
        }
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.since.is_some()
    }

    pub(crate) fn at_end(&self) -> bool {
        self.position() >= self.limit
    }

    pub(crate) fn rate(&self) -> f64 {
        self.rate
    }

    pub(crate) fn play(&mut self) {
        if self.since.is_none() {
            if self.at_end() {
                self.base = self.restart_at;
            }
            self.since = Some(Instant::now());
        }
        self.generation += 1;
    }

    pub(crate) fn pause(&mut self) {
        self.base = self.position();
        self.since = None;
        self.generation += 1;
    }

    pub(crate) fn seek(&mut self, position: f64) {
        self.base = position.clamp(0.0, self.limit);
        if self.since.is_some() {
            self.since = Some(Instant::now());
        }
        self.generation += 1;
    }

    pub(crate) fn set_rate(&mut self, rate: f64) {
        self.base = self.position();
        if self.since.is_some() {
            self.since = Some(Instant::now());
        }
        self.rate = rate;
        self.generation += 1;
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Reset to a freshly loaded, paused state
    pub(crate) fn reset(&mut self, start: f64, limit: f64) {
        self.limit = limit;
        self.restart_at = start.min(limit);
        self.base = self.restart_at;
        self.since = None;
        self.generation += 1;
    }

    fn time_to_end(&self) -> Option<Duration> {
        self.since?;
        let remaining = ((self.limit - self.position()) / self.rate.max(f64::EPSILON)).max(0.0);
        Some(Duration::from_secs_f64(remaining))
    }
}

/// Playback clock plus the emitter reporting on it
pub(crate) struct Playback<E> {
    pub(crate) transport: Mutex<Transport>,
    pub(crate) emitter: Emitter<E>,
}

impl<E: std::fmt::Debug + Send + 'static> Playback<E> {
    pub(crate) fn new(duration: f64, sink: EventSink<E>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            transport: Mutex::new(Transport::new(duration)),
            emitter: Emitter::spawn(sink, latency),
        })
    }

    pub(crate) fn transport(&self) -> MutexGuard<'_, Transport> {
        lock(&self.transport)
    }

    /// Arm a timer for the natural end of playback. Any later change to the
    /// transport disarms it. Looping restarts silently; otherwise playback
    /// halts and `ended` is reported.
    pub(crate) fn arm_end_timer(self: &Arc<Self>, ended: fn() -> Vec<E>) {
        let armed = {
            let transport = self.transport();
            transport.time_to_end().map(|wait| (transport.generation, wait))
        };
        let Some((mut generation, mut wait)) = armed else {
            return;
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(wait).await;
                let Some(playback) = weak.upgrade() else { return };

                let next = {
                    let mut transport = playback.transport();
                    if transport.generation != generation {
                        return;
                    }
                    if transport.looping {
                        transport.base = transport.restart_at;
                        transport.since = Some(Instant::now());
                        transport.generation += 1;
                        transport.time_to_end().map(|w| (transport.generation, w))
                    } else {
                        transport.pause();
                        None
                    }
                };

                match next {
                    Some((g, w)) => {
                        generation = g;
                        wait = w;
                    }
                    None => {
                        for event in ended() {
                            playback.emitter.emit(event);
                        }
                        return;
                    }
                }
            }
        });
    }
}
