//! State shared by every adapter: status, options, handler slots, and the
//! seek fallback race

use crate::handlers::{HandlerRegistry, PendingTransition};
use crate::options::{PlayerConfig, VideoOptions};
use crate::tables::TransitionTable;
use crate::types::{ActionId, HandlerKey, PlaybackStatus};
use crate::{Error, Result};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Rates are compared with this tolerance
const RATE_EPSILON: f64 = 1e-6;

pub(crate) struct AdapterCore {
    table: &'static TransitionTable,
    config: PlayerConfig,
    status: Mutex<PlaybackStatus>,
    options: Mutex<VideoOptions>,
    handlers: HandlerRegistry,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AdapterCore {
    pub(crate) fn new(table: &'static TransitionTable, config: PlayerConfig) -> Self {
        Self {
            table,
            config,
            status: Mutex::new(PlaybackStatus::NotLoaded),
            options: Mutex::new(VideoOptions::default()),
            handlers: HandlerRegistry::new(),
        }
    }

    pub(crate) fn table(&self) -> &'static TransitionTable {
        self.table
    }

    pub(crate) fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub(crate) fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub(crate) fn status(&self) -> PlaybackStatus {
        *lock(&self.status)
    }

    /// Overwrite the status, returning the previous one
    pub(crate) fn set_status(&self, status: PlaybackStatus, reason: &str) -> PlaybackStatus {
        let previous = std::mem::replace(&mut *lock(&self.status), status);
        if previous != status {
            debug!(backend = self.table.backend, from = %previous, to = %status, reason, "Status changed");
        }
        previous
    }

    /// Record a status reported by the backend and wake the waiter on it,
    /// if any
    pub(crate) fn apply_native(&self, status: PlaybackStatus, event: &str) {
        self.set_status(status, event);
        self.handlers.notify(HandlerKey::Status(status), Ok(status));
    }

    pub(crate) fn options(&self) -> VideoOptions {
        lock(&self.options).clone()
    }

    /// Merge `newer` over the stored options and return the result
    pub(crate) fn merge_options(&self, newer: Option<&VideoOptions>) -> VideoOptions {
        let mut options = lock(&self.options);
        if let Some(newer) = newer {
            options.merge(newer);
        }
        options.clone()
    }

    pub(crate) fn update_options(&self, update: impl FnOnce(&mut VideoOptions)) {
        update(&mut lock(&self.options));
    }

    pub(crate) fn reserve(&self, status: PlaybackStatus, action: ActionId) -> PendingTransition {
        self.handlers.set_handler(HandlerKey::Status(status), action)
    }

    /// Await a reservation and answer with the status reached afterwards
    pub(crate) async fn settle(&self, pending: PendingTransition) -> Result<PlaybackStatus> {
        pending.await?;
        Ok(self.status())
    }

    /// Decide what a playback rate request amounts to.
    ///
    /// `Ok(None)` means there is nothing to do: no rate was requested or
    /// stored, or the backend already plays at that rate.
    pub(crate) fn resolve_rate_request(
        &self,
        requested: Option<f64>,
        current: Option<f64>,
        allowed: &[f64],
    ) -> Result<Option<f64>> {
        let Some(rate) = requested.or(self.options().rate) else {
            return Ok(None);
        };
        if current.is_some_and(|current| (current - rate).abs() < RATE_EPSILON) {
            return Ok(None);
        }
        if !allowed.iter().any(|a| (a - rate).abs() < RATE_EPSILON) {
            return Err(Error::BadPlaybackRate {
                rate,
                allowed: allowed.to_vec(),
            });
        }
        Ok(Some(rate))
    }

    /// Race a seek confirmation against the fallback timer.
    ///
    /// Some backends never confirm a seek to an already buffered position.
    /// If nothing arrives within the fallback window and the backend is not
    /// buffering, the seek counts as done and the pre-seek status is
    /// restored. Whichever side finishes first wins; the other is dropped.
    pub(crate) async fn race_seek_fallback(
        &self,
        action: ActionId,
        mut pending: PendingTransition,
        pre_seek: PlaybackStatus,
    ) -> Result<PlaybackStatus> {
        enum Race {
            Confirmed(Result<PlaybackStatus>),
            Elapsed,
        }

        let fallback = async {
            tokio::time::sleep(self.config.seek_fallback()).await;
            if self.status() == PlaybackStatus::Buffering {
                // only the backend can settle a buffering seek
                std::future::pending::<()>().await;
            }
        };

        let race = tokio::select! {
            outcome = &mut pending => Race::Confirmed(outcome),
            _ = fallback => Race::Elapsed,
        };
        drop(pending);

        match race {
            Race::Confirmed(outcome) => {
                outcome?;
                debug!(action = %action, status = %self.status(), "Seek confirmed");
            }
            Race::Elapsed => {
                if self.status() == PlaybackStatus::Seeking {
                    self.set_status(pre_seek, "seek fallback");
                }
                warn!(
                    action = %action,
                    fallback_ms = self.config.seek_fallback_ms,
                    "Seek not confirmed by the backend, treating as complete"
                );
            }
        }
        Ok(self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::HTML5_TABLE;
    use std::sync::Arc;
    use std::time::Duration;

    fn core() -> AdapterCore {
        AdapterCore::new(&HTML5_TABLE, PlayerConfig::default())
    }

    #[test]
    fn test_rate_request_resolution() {
        let core = core();
        let allowed = [0.5, 1.0, 2.0];

        assert_eq!(core.resolve_rate_request(None, Some(1.0), &allowed), Ok(None));
        assert_eq!(core.resolve_rate_request(Some(1.0), Some(1.0), &allowed), Ok(None));
        assert_eq!(core.resolve_rate_request(Some(2.0), Some(1.0), &allowed), Ok(Some(2.0)));
        assert!(matches!(
            core.resolve_rate_request(Some(2.5), Some(1.0), &allowed),
            Err(Error::BadPlaybackRate { .. })
        ));

        core.update_options(|o| o.rate = Some(0.5));
        assert_eq!(core.resolve_rate_request(None, Some(1.0), &allowed), Ok(Some(0.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_confirmation_wins() {
        let core = Arc::new(core());
        core.set_status(PlaybackStatus::Paused, "test");
        let action = ActionId::new();
        let pending = core.reserve(PlaybackStatus::Paused, action);
        core.set_status(PlaybackStatus::Seeking, "test");

        let confirmer = core.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            confirmer.apply_native(PlaybackStatus::Paused, "seeked");
        });

        let started = tokio::time::Instant::now();
        let status = core.race_seek_fallback(action, pending, PlaybackStatus::Paused).await;
        assert_eq!(status, Ok(PlaybackStatus::Paused));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_fallback_restores_status() {
        let core = core();
        core.set_status(PlaybackStatus::Paused, "test");
        let action = ActionId::new();
        let pending = core.reserve(PlaybackStatus::Paused, action);
        core.set_status(PlaybackStatus::Seeking, "test");

        let started = tokio::time::Instant::now();
        let status = core.race_seek_fallback(action, pending, PlaybackStatus::Paused).await;
        assert_eq!(status, Ok(PlaybackStatus::Paused));
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(started.elapsed() < Duration::from_millis(600));
        assert!(core.handlers().is_empty());
    }
}
