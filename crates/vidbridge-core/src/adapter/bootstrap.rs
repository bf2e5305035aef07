//! IFrame API bootstrap
//!
//! The YouTube IFrame API is a page-global script. The first adapter to
//! need it injects the tag; every adapter then polls for the load marker.
//! Injection is idempotent on the host side, so no lock is involved.

use crate::backend::PlayerHost;
use crate::types::ActionId;
use crate::Result;
use std::time::Duration;
use tracing::{debug, info};

/// Id of the injected script tag
pub const IFRAME_API_SCRIPT_ID: &str = "youtube-iframe_api";

/// Source of the IFrame API script
pub const IFRAME_API_SRC: &str = "https://www.youtube.com/iframe_api";

/// Make sure the IFrame API script is present and loaded.
///
/// Polls every `poll_interval` until the host reports the load marker. The
/// caller bounds the wait (the action queue's safety timeout).
pub async fn ensure_iframe_api(
    host: &dyn PlayerHost,
    poll_interval: Duration,
    action: ActionId,
) -> Result<()> {
    if host.script_loaded(IFRAME_API_SCRIPT_ID) {
        return Ok(());
    }

    if host.inject_script(IFRAME_API_SCRIPT_ID, IFRAME_API_SRC) {
        info!(action = %action, src = IFRAME_API_SRC, "Injected IFrame API script");
    }

    let mut polls = 0u32;
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        ticker.tick().await;
        if host.script_loaded(IFRAME_API_SCRIPT_ID) {
            debug!(action = %action, polls, "IFrame API ready");
            return Ok(());
        }
        polls += 1;
    }
}
