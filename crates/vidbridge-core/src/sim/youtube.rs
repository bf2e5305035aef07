//! Simulated YouTube IFrame player

use super::{lock, Playback, SeekEvents, SimConfig, SimProbe};
use crate::backend::{EventSink, YouTubeEvent, YouTubePlayer, YouTubePlayerConfig};
use std::sync::{Arc, Mutex};
use tracing::debug;

const UNSTARTED: i32 = -1;
const ENDED: i32 = 0;
const PLAYING: i32 = 1;
const PAUSED: i32 = 2;
const BUFFERING: i32 = 3;
const CUED: i32 = 5;

#[derive(Debug)]
struct PlayerState {
    video_id: String,
    state: i32,
    volume: u8,
    muted: bool,
    destroyed: bool,
}

pub struct SimYouTubePlayer {
    config: SimConfig,
    probe: SimProbe,
    playback: Arc<Playback<YouTubeEvent>>,
    state: Mutex<PlayerState>,
}

fn ended_events() -> Vec<YouTubeEvent> {
    vec![YouTubeEvent::StateChange(ENDED)]
}

impl SimYouTubePlayer {
    pub(crate) fn new(
        config: &SimConfig,
        probe: SimProbe,
        player: YouTubePlayerConfig,
        events: EventSink<YouTubeEvent>,
    ) -> Arc<Self> {
        let playback = Playback::new(config.media_duration, events, config.event_latency);
        let vars = &player.player_vars;
        {
            let mut transport = playback.transport();
            transport.reset(
                vars.start.map(f64::from).unwrap_or(0.0),
                Self::limit(config, vars.end.map(f64::from)),
            );
            transport.set_looping(vars.looping);
        }

        let sim = Arc::new(Self {
            config: config.clone(),
            probe,
            playback,
            state: Mutex::new(PlayerState {
                video_id: player.video_id.clone(),
                state: UNSTARTED,
                volume: 100,
                muted: false,
                destroyed: false,
            }),
        });

        sim.playback.emitter.emit(YouTubeEvent::Ready);
        lock(&sim.state).state = CUED;
        if vars.autoplay {
            sim.begin_playback();
        }
        sim
    }

    fn limit(config: &SimConfig, end: Option<f64>) -> f64 {
        end.map_or(config.media_duration, |end| end.min(config.media_duration))
    }

    pub fn video_id(&self) -> String {
        lock(&self.state).video_id.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    fn set_state(&self, code: i32) {
        lock(&self.state).state = code;
    }

    fn begin_playback(&self) {
        {
            let mut transport = self.playback.transport();
            if transport.is_playing() {
                return;
            }
            transport.play();
        }
        self.set_state(PLAYING);
        self.playback.emitter.emit(YouTubeEvent::StateChange(BUFFERING));
        self.playback.emitter.emit(YouTubeEvent::StateChange(PLAYING));
        self.playback.arm_end_timer(ended_events);
    }
}

impl YouTubePlayer for SimYouTubePlayer {
    fn play_video(&self) {
        self.probe.bump(|c| &c.play_calls);
        if self.is_destroyed() {
            return;
        }
        self.begin_playback();
    }

    fn pause_video(&self) {
        self.probe.bump(|c| &c.pause_calls);
        {
            let mut transport = self.playback.transport();
            if !transport.is_playing() {
                return;
            }
            transport.pause();
        }
        self.set_state(PAUSED);
        self.playback.emitter.emit(YouTubeEvent::StateChange(PAUSED));
    }

    fn stop_video(&self) {
        self.probe.bump(|c| &c.stop_calls);
        self.playback.transport().pause();
        self.set_state(UNSTARTED);
        self.playback.emitter.emit(YouTubeEvent::StateChange(UNSTARTED));
    }

    fn seek_to(&self, seconds: f64, _allow_seek_ahead: bool) {
        self.probe.bump(|c| &c.seek_calls);
        let playing = {
            let mut transport = self.playback.transport();
            transport.seek(seconds);
            transport.is_playing()
        };
        let settled = if playing { PLAYING } else { PAUSED };
        self.set_state(settled);

        if self.config.seek_events == SeekEvents::Always {
            self.playback.emitter.emit(YouTubeEvent::StateChange(BUFFERING));
            self.playback.emitter.emit(YouTubeEvent::StateChange(settled));
        }
        if playing {
            self.playback.arm_end_timer(ended_events);
        }
    }

    fn cue_video_by_id(&self, video_id: &str, start: Option<f64>, end: Option<f64>) {
        self.probe.bump(|c| &c.cue_calls);
        debug!(video_id, "Simulated player cueing");
        self.playback
            .transport()
            .reset(start.unwrap_or(0.0), Self::limit(&self.config, end));
        {
            let mut state = lock(&self.state);
            state.video_id = video_id.to_string();
            state.state = CUED;
        }
        self.playback.emitter.emit(YouTubeEvent::StateChange(CUED));
    }

    fn set_volume(&self, volume: u8) {
        lock(&self.state).volume = volume.min(100);
    }

    fn get_volume(&self) -> u8 {
        lock(&self.state).volume
    }

    fn mute(&self) {
        lock(&self.state).muted = true;
    }

    fn un_mute(&self) {
        lock(&self.state).muted = false;
    }

    fn is_muted(&self) -> bool {
        lock(&self.state).muted
    }

    /// Rates off the offered list are ignored, as the IFrame API does
    fn set_playback_rate(&self, rate: f64) {
        self.probe.bump(|c| &c.rate_calls);
        if !self
            .config
            .youtube_rates
            .iter()
            .any(|r| (r - rate).abs() < 1e-6)
        {
            return;
        }
        let playing = {
            let mut transport = self.playback.transport();
            transport.set_rate(rate);
            transport.is_playing()
        };
        self.playback
            .emitter
            .emit(YouTubeEvent::PlaybackRateChange(rate));
        if playing {
            self.playback.arm_end_timer(ended_events);
        }
    }

    fn get_playback_rate(&self) -> f64 {
        self.playback.transport().rate()
    }

    fn get_available_playback_rates(&self) -> Vec<f64> {
        self.config.youtube_rates.clone()
    }

    fn get_player_state(&self) -> i32 {
        let state = lock(&self.state).state;
        if state == PLAYING && !self.playback.transport().is_playing() {
            ENDED
        } else {
            state
        }
    }

    fn get_current_time(&self) -> f64 {
        self.playback.transport().position()
    }

    fn get_duration(&self) -> f64 {
        self.config.media_duration
    }

    fn destroy(&self) {
        self.probe.bump(|c| &c.youtube_players_destroyed);
        lock(&self.state).destroyed = true;
        self.playback.transport().pause();
    }
}
