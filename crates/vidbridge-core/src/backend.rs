//! Native backend surfaces
//!
//! The adapters never talk to a browser directly. They drive these traits,
//! which a host implements on top of the real DOM / IFrame API (or the
//! in-process simulation in [`crate::sim`]). Native events flow back
//! through an [`EventSink`] handed over when the player is created.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback receiving native events from a backend
pub type EventSink<E> = Arc<dyn Fn(E) + Send + Sync>;

/// Events emitted by a media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadStart,
    CanPlay,
    Play,
    Playing,
    Pause,
    Ended,
    Seeking,
    Seeked,
    RateChange,
    /// Any event the adapter only logs
    Other(String),
}

impl MediaEvent {
    /// DOM event name
    pub fn name(&self) -> &str {
        match self {
            MediaEvent::LoadStart => "loadstart",
            MediaEvent::CanPlay => "canplay",
            MediaEvent::Play => "play",
            MediaEvent::Playing => "playing",
            MediaEvent::Pause => "pause",
            MediaEvent::Ended => "ended",
            MediaEvent::Seeking => "seeking",
            MediaEvent::Seeked => "seeked",
            MediaEvent::RateChange => "ratechange",
            MediaEvent::Other(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "loadstart" => MediaEvent::LoadStart,
            "canplay" => MediaEvent::CanPlay,
            "play" => MediaEvent::Play,
            "playing" => MediaEvent::Playing,
            "pause" => MediaEvent::Pause,
            "ended" => MediaEvent::Ended,
            "seeking" => MediaEvent::Seeking,
            "seeked" => MediaEvent::Seeked,
            "ratechange" => MediaEvent::RateChange,
            other => MediaEvent::Other(other.to_string()),
        }
    }
}

/// Command surface of an HTML5 media element
pub trait MediaElement: Send + Sync {
    fn play(&self);
    fn pause(&self);
    fn set_src(&self, src: &str);
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    /// `None` until metadata is known
    fn duration(&self) -> Option<f64>;
    /// Volume in 0.0..=1.0
    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    fn muted(&self) -> bool;
    fn set_muted(&self, muted: bool);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);
    fn set_loop(&self, looping: bool);
    fn set_autoplay(&self, autoplay: bool);
    fn set_controls(&self, controls: bool);
    fn set_width(&self, width: u32);
    fn set_height(&self, height: u32);
    /// Detach the element from the document
    fn remove(&self);
}

/// Events emitted by a YouTube IFrame player
#[derive(Debug, Clone, PartialEq)]
pub enum YouTubeEvent {
    /// `onReady`
    Ready,
    /// `onStateChange` with the numeric player state
    StateChange(i32),
    /// `onPlaybackRateChange`
    PlaybackRateChange(f64),
    /// `onError` with the IFrame API error code
    Error(i32),
}

impl YouTubeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            YouTubeEvent::Ready => "onReady",
            YouTubeEvent::StateChange(_) => "onStateChange",
            YouTubeEvent::PlaybackRateChange(_) => "onPlaybackRateChange",
            YouTubeEvent::Error(_) => "onError",
        }
    }
}

/// Human readable description of an IFrame API error code
pub fn youtube_error_message(code: i32) -> &'static str {
    match code {
        2 => "invalid parameter value",
        5 => "content cannot be played in an HTML5 player",
        100 => "video not found or removed",
        101 | 150 => "embedding not allowed by the video owner",
        _ => "unknown player error",
    }
}

/// Player variables passed to the IFrame player constructor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YouTubePlayerVars {
    pub autoplay: bool,
    pub controls: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    /// Required by the IFrame API for single-video looping
    pub playlist: Option<String>,
    pub start: Option<u32>,
    pub end: Option<u32>,
}

/// Construction parameters for a YouTube IFrame player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YouTubePlayerConfig {
    pub video_id: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub player_vars: YouTubePlayerVars,
}

/// Command surface of a YouTube IFrame player
pub trait YouTubePlayer: Send + Sync {
    fn play_video(&self);
    fn pause_video(&self);
    fn stop_video(&self);
    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool);
    fn cue_video_by_id(&self, video_id: &str, start: Option<f64>, end: Option<f64>);
    /// Volume in 0..=100
    fn set_volume(&self, volume: u8);
    fn get_volume(&self) -> u8;
    fn mute(&self);
    fn un_mute(&self);
    fn is_muted(&self) -> bool;
    fn set_playback_rate(&self, rate: f64);
    fn get_playback_rate(&self) -> f64;
    fn get_available_playback_rates(&self) -> Vec<f64>;
    fn get_player_state(&self) -> i32;
    fn get_current_time(&self) -> f64;
    fn get_duration(&self) -> f64;
    fn destroy(&self);
}

/// Environment the players live in: creates native players and owns
/// page-global resources such as injected scripts
pub trait PlayerHost: Send + Sync {
    /// Create and attach a media element reporting to `events`
    fn create_media_element(&self, events: EventSink<MediaEvent>) -> Result<Arc<dyn MediaElement>>;

    /// Create an IFrame player. Only valid once the IFrame API script has
    /// finished loading.
    fn create_youtube_player(
        &self,
        config: YouTubePlayerConfig,
        events: EventSink<YouTubeEvent>,
    ) -> Result<Arc<dyn YouTubePlayer>>;

    /// Insert a script tag with `id` unless one already exists.
    /// Returns true when a new tag was inserted.
    fn inject_script(&self, id: &str, src: &str) -> bool;

    /// Returns true once the script tag `id` carries its load marker
    fn script_loaded(&self, id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_event_names() {
        for name in ["loadstart", "canplay", "play", "playing", "pause", "ended", "seeking", "seeked", "ratechange"] {
            assert_eq!(MediaEvent::from_name(name).name(), name);
        }
        assert_eq!(
            MediaEvent::from_name("timeupdate"),
            MediaEvent::Other("timeupdate".to_string())
        );
    }

    #[test]
    fn test_player_vars_json() {
        let vars = YouTubePlayerVars {
            looping: true,
            playlist: Some("C0DPdy98e4c".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&vars).unwrap();
        assert_eq!(json["loop"], true);
        assert_eq!(json["playlist"], "C0DPdy98e4c");
    }
}
