//! Core types for vidbridge

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a queued action, used for log correlation and
/// as the owner of state change handler reservations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub Uuid);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a facade instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical player status.
///
/// Stable states are reported by the backend once it has settled;
/// transitional states are entered while an action waits for the
/// backend to confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    /// No video loaded yet
    NotLoaded,
    /// Load requested, waiting for the backend to be ready
    Cueing,
    /// Loaded and ready to play
    Cued,
    /// Play requested
    Starting,
    /// Playing
    Started,
    /// Pause requested
    Pausing,
    /// Paused
    Paused,
    /// Stop requested
    Stopping,
    /// Stopped
    Stopped,
    /// End position reached, waiting for the backend to halt
    Ending,
    /// Playback ended
    Ended,
    /// Backend is buffering
    Buffering,
    /// Seek in flight
    Seeking,
}

impl PlaybackStatus {
    pub const ALL: [PlaybackStatus; 13] = [
        PlaybackStatus::NotLoaded,
        PlaybackStatus::Cueing,
        PlaybackStatus::Cued,
        PlaybackStatus::Starting,
        PlaybackStatus::Started,
        PlaybackStatus::Pausing,
        PlaybackStatus::Paused,
        PlaybackStatus::Stopping,
        PlaybackStatus::Stopped,
        PlaybackStatus::Ending,
        PlaybackStatus::Ended,
        PlaybackStatus::Buffering,
        PlaybackStatus::Seeking,
    ];

    /// Returns true for states entered while an action awaits confirmation
    pub fn is_transitional(&self) -> bool {
        use PlaybackStatus::*;
        matches!(self, Cueing | Starting | Pausing | Stopping | Ending | Seeking)
    }

    pub fn is_stable(&self) -> bool {
        !self.is_transitional()
    }

    /// A player is ready once it has left `notLoaded` and `cueing`
    pub fn is_ready(&self) -> bool {
        !matches!(self, PlaybackStatus::NotLoaded | PlaybackStatus::Cueing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::NotLoaded => "notLoaded",
            PlaybackStatus::Cueing => "cueing",
            PlaybackStatus::Cued => "cued",
            PlaybackStatus::Starting => "starting",
            PlaybackStatus::Started => "started",
            PlaybackStatus::Pausing => "pausing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Stopping => "stopping",
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Ending => "ending",
            PlaybackStatus::Ended => "ended",
            PlaybackStatus::Buffering => "buffering",
            PlaybackStatus::Seeking => "seeking",
        }
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        PlaybackStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| crate::Error::bad_parameter(format!("unknown status '{}'", s)))
    }
}

/// Key of a state change handler slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKey {
    /// Waits for the adapter to reach a status
    Status(PlaybackStatus),
    /// Waits for the backend to confirm a playback rate change
    RateChange,
}

impl std::fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerKey::Status(status) => write!(f, "{}", status),
            HandlerKey::RateChange => write!(f, "ratechange"),
        }
    }
}

impl From<PlaybackStatus> for HandlerKey {
    fn from(status: PlaybackStatus) -> Self {
        HandlerKey::Status(status)
    }
}
