//! Video options and player configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-video options. Every field is optional; unset fields leave the
/// backend default (or a previously stored value) in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoOptions {
    /// Start playback as soon as the video is ready
    pub autoplay: Option<bool>,
    /// Show the backend's native controls
    pub controls: Option<bool>,
    /// Restart from the beginning when playback ends
    #[serde(rename = "loop")]
    pub looping: Option<bool>,
    /// Requested playback speed
    pub rate: Option<f64>,
    /// Volume in 0..=100, 0 mutes
    pub volume: Option<u8>,
    /// Width in pixels
    pub width: Option<u32>,
    /// Height in pixels
    pub height: Option<u32>,
    /// Initial position in seconds
    pub start: Option<f64>,
    /// Position in seconds at which playback ends
    pub end: Option<f64>,
}

impl VideoOptions {
    /// Parse options from a JSON object
    pub fn from_json(json: &str) -> Result<Self> {
        let options: VideoOptions = serde_json::from_str(json)
            .map_err(|e| Error::bad_parameter(format!("invalid video options: {}", e)))?;
        Ok(options.normalized())
    }

    /// Merge `newer` over these options: set fields in `newer` win,
    /// unset fields keep the current value
    pub fn merge(&mut self, newer: &VideoOptions) {
        let newer = newer.clone().normalized();
        self.autoplay = newer.autoplay.or(self.autoplay);
        self.controls = newer.controls.or(self.controls);
        self.looping = newer.looping.or(self.looping);
        self.rate = newer.rate.or(self.rate);
        self.volume = newer.volume.or(self.volume);
        self.width = newer.width.or(self.width);
        self.height = newer.height.or(self.height);
        self.start = newer.start.or(self.start);
        self.end = newer.end.or(self.end);
    }

    /// Clamp volume into range and drop negative positions
    pub fn normalized(mut self) -> Self {
        self.volume = self.volume.map(|v| v.min(100));
        self.start = self.start.filter(|s| s.is_finite() && *s >= 0.0);
        self.end = self.end.filter(|e| e.is_finite() && *e > 0.0);
        self.rate = self.rate.filter(|r| r.is_finite() && *r > 0.0);
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = Some(autoplay);
        self
    }

    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume.min(100));
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_window(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = Some(looping);
        self
    }
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Upper bound for any queued action before it is rejected (milliseconds)
    pub promise_safety_timeout_ms: u64,
    /// How long a seek waits for a confirming event before it is
    /// considered complete (milliseconds)
    pub seek_fallback_ms: u64,
    /// Poll interval while waiting for the IFrame API script (milliseconds)
    pub iframe_poll_interval_ms: u64,
    /// Upper bound between position checks of the HTML5 end watch (milliseconds)
    pub end_watch_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            promise_safety_timeout_ms: 10_000,
            seek_fallback_ms: 500,
            iframe_poll_interval_ms: 100,
            end_watch_interval_ms: 250,
        }
    }
}

impl PlayerConfig {
    /// Parse configuration from JSON, filling unset keys with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("promise_safety_timeout_ms", self.promise_safety_timeout_ms),
            ("seek_fallback_ms", self.seek_fallback_ms),
            ("iframe_poll_interval_ms", self.iframe_poll_interval_ms),
            ("end_watch_interval_ms", self.end_watch_interval_ms),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }

    pub fn promise_safety_timeout(&self) -> Duration {
        Duration::from_millis(self.promise_safety_timeout_ms)
    }

    pub fn seek_fallback(&self) -> Duration {
        Duration::from_millis(self.seek_fallback_ms)
    }

    pub fn iframe_poll_interval(&self) -> Duration {
        Duration::from_millis(self.iframe_poll_interval_ms)
    }

    pub fn end_watch_interval(&self) -> Duration {
        Duration::from_millis(self.end_watch_interval_ms)
    }
}
