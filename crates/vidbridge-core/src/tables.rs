//! Transition tables
//!
//! Pure data describing how each backend's native events map onto
//! [`PlaybackStatus`], and in which statuses an action is a no-op.
//! Adapters hold a `&'static TransitionTable`; nothing here is mutated.

use crate::types::PlaybackStatus::{self, *};

/// Actions subject to the no-op guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedAction {
    Start,
    Pause,
    Stop,
}

/// Immutable per-backend lookup tables
#[derive(Debug)]
pub struct TransitionTable {
    /// Backend name, for logs
    pub backend: &'static str,
    /// Native event name to status
    pub events: &'static [(&'static str, PlaybackStatus)],
    /// Numeric native state code to status
    pub state_codes: &'static [(i32, PlaybackStatus)],
    /// Statuses in which starting is a no-op
    pub start_noop: &'static [PlaybackStatus],
    /// Statuses in which pausing is a no-op
    pub pause_noop: &'static [PlaybackStatus],
    /// Statuses in which stopping is a no-op
    pub stop_noop: &'static [PlaybackStatus],
}

impl TransitionTable {
    /// Status a native event maps to, if the event is tracked
    pub fn status_for_event(&self, event: &str) -> Option<PlaybackStatus> {
        self.events
            .iter()
            .find(|(name, _)| *name == event)
            .map(|(_, status)| *status)
    }

    /// Status a numeric state code maps to, if known
    pub fn status_for_code(&self, code: i32) -> Option<PlaybackStatus> {
        self.state_codes
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, status)| *status)
    }

    /// Returns true when `action` would change nothing in `status`
    pub fn is_noop(&self, action: GuardedAction, status: PlaybackStatus) -> bool {
        let guard = match action {
            GuardedAction::Start => self.start_noop,
            GuardedAction::Pause => self.pause_noop,
            GuardedAction::Stop => self.stop_noop,
        };
        guard.contains(&status)
    }

    pub fn can_start(&self, status: PlaybackStatus) -> bool {
        !self.is_noop(GuardedAction::Start, status)
    }

    pub fn can_pause(&self, status: PlaybackStatus) -> bool {
        !self.is_noop(GuardedAction::Pause, status)
    }

    pub fn can_stop(&self, status: PlaybackStatus) -> bool {
        !self.is_noop(GuardedAction::Stop, status)
    }
}

/// HTML5 `<video>` element.
///
/// `seeked` and `ratechange` are handled by the adapter directly; they do
/// not map to a fixed status.
pub static HTML5_TABLE: TransitionTable = TransitionTable {
    backend: "html5",
    events: &[
        ("loadstart", Cueing),
        ("canplay", Cued),
        ("play", Starting),
        ("playing", Started),
        ("pause", Paused),
        ("ended", Ended),
        ("seeking", Seeking),
    ],
    state_codes: &[],
    start_noop: &[Started, Starting],
    pause_noop: &[
        NotLoaded, Paused, Pausing, Ended, Ending, Cued, Cueing, Stopped, Stopping,
    ],
    stop_noop: &[NotLoaded, Cued, Cueing, Stopped, Stopping],
};

/// YouTube IFrame player
pub static YOUTUBE_TABLE: TransitionTable = TransitionTable {
    backend: "youtube",
    events: &[("onReady", Cued)],
    state_codes: &[
        (-1, Stopped),
        (0, Ended),
        (1, Started),
        (2, Paused),
        (3, Buffering),
        (5, Cued),
    ],
    start_noop: &[Started, Starting],
    pause_noop: &[
        NotLoaded, Paused, Pausing, Ended, Ending, Cued, Cueing, Stopped, Stopping,
    ],
    stop_noop: &[NotLoaded, Cued, Cueing, Stopped, Stopping],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html5_events() {
        assert_eq!(HTML5_TABLE.status_for_event("canplay"), Some(Cued));
        assert_eq!(HTML5_TABLE.status_for_event("playing"), Some(Started));
        assert_eq!(HTML5_TABLE.status_for_event("timeupdate"), None);
        assert_eq!(HTML5_TABLE.status_for_code(1), None);
    }

    #[test]
    fn test_youtube_codes() {
        assert_eq!(YOUTUBE_TABLE.status_for_code(-1), Some(Stopped));
        assert_eq!(YOUTUBE_TABLE.status_for_code(0), Some(Ended));
        assert_eq!(YOUTUBE_TABLE.status_for_code(1), Some(Started));
        assert_eq!(YOUTUBE_TABLE.status_for_code(2), Some(Paused));
        assert_eq!(YOUTUBE_TABLE.status_for_code(3), Some(Buffering));
        assert_eq!(YOUTUBE_TABLE.status_for_code(5), Some(Cued));
        assert_eq!(YOUTUBE_TABLE.status_for_code(4), None);
    }

    #[test]
    fn test_guards() {
        for table in [&HTML5_TABLE, &YOUTUBE_TABLE] {
            assert!(!table.can_pause(Cued));
            assert!(!table.can_pause(NotLoaded));
            assert!(table.can_pause(Started));
            assert!(table.can_pause(Buffering));
            assert!(!table.can_start(Starting));
            assert!(table.can_start(Paused));
            assert!(table.can_start(NotLoaded));
            assert!(!table.can_stop(Stopped));
            assert!(table.can_stop(Paused));
        }
    }
}
