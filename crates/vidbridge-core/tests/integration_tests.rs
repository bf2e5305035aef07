//! Integration tests for vidbridge Core

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_test::{assert_err, assert_ok};
use vidbridge_core::{
    parse_video_url, ActionId, Error, HandlerKey, HandlerRegistry, PlaybackStatus, PlayerConfig,
    SeekEvents, SimConfig, SimHost, SupportedVideoApi, VideoOptions, VideoPlayer,
};

const CLIP: &str = "https://cdn.example.com/media/clip.mp4";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=C0DPdy98e4c";

fn sim_host(config: SimConfig) -> Arc<SimHost> {
    Arc::new(SimHost::new(config))
}

fn player_for(host: &Arc<SimHost>, url: &str) -> VideoPlayer {
    VideoPlayer::builder(host.clone()).url(url).build().unwrap()
}

// =============================================================================
// Source Tests
// =============================================================================

#[test]
fn test_parse_watch_url() {
    let source = assert_ok!(parse_video_url(WATCH_URL));
    assert_eq!(source.api, SupportedVideoApi::YouTube);
    assert_eq!(source.id, "C0DPdy98e4c");
}

#[test]
fn test_parse_watch_url_without_id() {
    let err = assert_err!(parse_video_url("https://www.youtube.com/watch?xxx=C0DPdy98e4c"));
    assert!(matches!(err, Error::BadParameter(_)));
}

#[test]
fn test_parse_file_and_unknown_urls() {
    let source = assert_ok!(parse_video_url(CLIP));
    assert_eq!(source.api, SupportedVideoApi::Html5);
    assert_eq!(source.id, CLIP);

    let err = assert_err!(parse_video_url("https://example.com/page"));
    assert!(matches!(err, Error::UnknownVideoSource(_)));
}

// =============================================================================
// Guard Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_pause_on_cued_is_noop() {
    for url in [CLIP, WATCH_URL] {
        let host = sim_host(SimConfig::default());
        let player = player_for(&host, url);
        assert_ok!(player.load_video(None, None, None).await);

        let status = assert_ok!(player.pause_video().await);
        assert_eq!(status, PlaybackStatus::Cued);
        assert_eq!(host.probe().pause_calls(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_plays_once() {
    let host = sim_host(SimConfig::default());
    let player = player_for(&host, CLIP);

    assert_eq!(assert_ok!(player.start_video().await), PlaybackStatus::Started);
    assert_eq!(assert_ok!(player.start_video().await), PlaybackStatus::Started);
    assert_eq!(host.probe().play_calls(), 1);
}

// =============================================================================
// Queue Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_actions_settle_in_order() {
    let host = sim_host(SimConfig {
        event_latency: Duration::from_millis(150),
        ..Default::default()
    });
    let player = player_for(&host, CLIP);
    let settled = Arc::new(Mutex::new(Vec::new()));

    let load = player.load_video(None, None, None);
    let start = player.start_video();
    let pause = player.pause_video();
    assert_eq!(player.queue_len(), 3);

    let mut tasks = Vec::new();
    for (name, handle) in [("pause", pause), ("start", start), ("load", load)] {
        let settled = settled.clone();
        tasks.push(tokio::spawn(async move {
            let status = handle.await;
            settled.lock().unwrap().push((name, status));
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let settled = settled.lock().unwrap();
    let names: Vec<_> = settled.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["load", "start", "pause"]);
    assert_eq!(settled[2].1, Ok(PlaybackStatus::Paused));
    assert_eq!(player.queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_safety_timeout_keeps_queue_running() {
    // the IFrame API never finishes loading
    let host = sim_host(SimConfig {
        script_latency: Duration::from_secs(3600),
        ..Default::default()
    });
    let config = PlayerConfig {
        promise_safety_timeout_ms: 1_000,
        ..Default::default()
    };
    let player = VideoPlayer::builder(host.clone())
        .config(config)
        .url(WATCH_URL)
        .build()
        .unwrap();

    let stuck = player.load_video(None, None, None);
    let next = player.load_video_from_url(CLIP, None);

    let started = Instant::now();
    let err = assert_err!(stuck.await);
    assert!(matches!(err, Error::PromiseTimeout { timeout_ms: 1_000, .. }));
    assert!(started.elapsed() >= Duration::from_millis(1_000));

    assert_eq!(assert_ok!(next.await), PlaybackStatus::Cued);
    assert_eq!(player.api(), Some(SupportedVideoApi::Html5));
}

#[tokio::test(start_paused = true)]
async fn test_destroy_rejects_queued_actions() {
    let host = sim_host(SimConfig::default());
    let player = player_for(&host, CLIP);

    let load = player.load_video(None, None, None);
    let start = player.start_video();
    sleep(Duration::from_millis(5)).await;
    player.destroy();

    assert_eq!(load.await, Err(Error::Destroyed));
    assert_eq!(start.await, Err(Error::Destroyed));
    assert_eq!(player.queue_len(), 0);
}

// =============================================================================
// Handler Registry Tests
// =============================================================================

#[tokio::test]
async fn test_reservation_overwrite() {
    let registry = HandlerRegistry::new();
    let key = HandlerKey::Status(PlaybackStatus::Started);

    let first = registry.set_handler(key, ActionId::new());
    let second_owner = ActionId::new();
    let second = registry.set_handler(key, second_owner);
    assert_eq!(registry.owner(key), Some(second_owner));

    assert!(registry.fulfill_handler(key, Ok(PlaybackStatus::Started)));
    assert!(matches!(first.await, Err(Error::HandlerSuperseded { .. })));
    assert_eq!(second.await, Ok(PlaybackStatus::Started));
    assert!(registry.is_empty());
}

// =============================================================================
// Seek Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_seek_on_cued_player() {
    for url in [CLIP, WATCH_URL] {
        let host = sim_host(SimConfig::default());
        let player = player_for(&host, url);
        assert_ok!(player.load_video(None, None, Some(VideoOptions::default().with_volume(80))).await);

        let status = assert_ok!(player.seek_video(10.5).await);
        assert_eq!(status, PlaybackStatus::Paused, "{}", url);
        let position = player.position().unwrap();
        assert!((10.5..=11.0).contains(&position), "{}: position {}", url, position);
        assert_eq!(player.volume(), Some(80));
    }
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_seek_resolves_after_fallback() {
    let host = sim_host(SimConfig {
        seek_events: SeekEvents::Never,
        ..Default::default()
    });
    let player = player_for(&host, CLIP);
    assert_ok!(player.start_video().await);
    assert_ok!(player.pause_video().await);

    let started = Instant::now();
    let status = assert_ok!(player.seek_video(20.0).await);
    let elapsed = started.elapsed();

    assert_eq!(status, PlaybackStatus::Paused);
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed <= Duration::from_millis(550), "elapsed {:?}", elapsed);
    assert_eq!(player.position(), Some(20.0));
}

#[tokio::test(start_paused = true)]
async fn test_negative_seek_rejected() {
    let host = sim_host(SimConfig::default());
    let player = player_for(&host, CLIP);
    let err = assert_err!(player.seek_video(-1.0).await);
    assert!(matches!(err, Error::BadParameter(_)));
}

// =============================================================================
// Playback Rate Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_rate_validation() {
    for url in [CLIP, WATCH_URL] {
        let host = sim_host(SimConfig::default());
        let player = player_for(&host, url);
        assert_ok!(player.load_video(None, None, None).await);

        let err = assert_err!(player.set_playback_rate(Some(2.5)).await);
        assert!(err
            .to_string()
            .contains("not on the list of allowed playback rates"));

        assert_ok!(player.set_playback_rate(Some(2.0)).await);
        assert_eq!(player.playback_rate(), Some(2.0));
    }
}

// =============================================================================
// Window Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_end_window() {
    for url in [CLIP, WATCH_URL] {
        let host = sim_host(SimConfig::default());
        let player = player_for(&host, url);
        let options = VideoOptions::default().with_window(Some(3.0), Some(5.0));
        assert_ok!(player.load_video(None, None, Some(options)).await);
        assert_ok!(player.start_video().await);

        let position = player.position().unwrap();
        assert!((3.0..=3.1).contains(&position), "{}: position {}", url, position);

        sleep(Duration::from_millis(2_100)).await;
        assert_eq!(player.status(), PlaybackStatus::Ended, "{}", url);
        let position = player.position().unwrap();
        assert!((4.9..=5.1).contains(&position), "{}: position {}", url, position);
    }
}

// =============================================================================
// Facade Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_html5_stop_reports_stopped() {
    let host = sim_host(SimConfig::default());
    let player = player_for(&host, CLIP);
    assert_ok!(player.start_video().await);

    assert_eq!(assert_ok!(player.stop_video().await), PlaybackStatus::Stopped);
    assert_eq!(player.status(), PlaybackStatus::Stopped);
    assert_eq!(host.probe().pause_calls(), 1);
    assert_eq!(host.probe().stop_calls(), 0);
    assert!(!player.can_stop());
}

#[tokio::test(start_paused = true)]
async fn test_reloading_same_source_is_noop() {
    let host = sim_host(SimConfig::default());
    let player = player_for(&host, WATCH_URL);
    assert_ok!(player.start_video().await);

    let status = assert_ok!(player.load_video_from_url(WATCH_URL, None).await);
    assert_eq!(status, PlaybackStatus::Started);
    assert_eq!(host.probe().youtube_players_created(), 1);
    assert_eq!(host.probe().cue_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_implicit_load() {
    let host = sim_host(SimConfig::default());
    let player = VideoPlayer::builder(host.clone())
        .video("C0DPdy98e4c", SupportedVideoApi::YouTube)
        .build()
        .unwrap();
    assert!(player.can_start());

    assert_eq!(assert_ok!(player.start_video().await), PlaybackStatus::Started);
    assert_eq!(host.probe().youtube_players_created(), 1);
    assert_eq!(player.duration(), Some(60.0));
}

#[tokio::test(start_paused = true)]
async fn test_api_switch_replaces_adapter() {
    let host = sim_host(SimConfig::default());
    let player = player_for(&host, CLIP);
    assert_ok!(player.start_video().await);

    let status = assert_ok!(player.load_video(Some("C0DPdy98e4c"), Some(SupportedVideoApi::YouTube), None).await);
    assert_eq!(status, PlaybackStatus::Cued);
    assert_eq!(player.api(), Some(SupportedVideoApi::YouTube));
    assert_eq!(host.probe().elements_removed(), 1);
    assert_eq!(player.source().unwrap().id, "C0DPdy98e4c");
}

#[tokio::test(start_paused = true)]
async fn test_play_or_pause_toggles() {
    let host = sim_host(SimConfig::default());
    let player = player_for(&host, CLIP);

    assert_eq!(assert_ok!(player.play_or_pause_video().await), PlaybackStatus::Started);
    assert_eq!(assert_ok!(player.play_or_pause_video().await), PlaybackStatus::Paused);
    assert_eq!(assert_ok!(player.play_or_pause_video().await), PlaybackStatus::Started);
}

#[tokio::test(start_paused = true)]
async fn test_iframe_script_injected_once() {
    let host = sim_host(SimConfig::default());
    let first = player_for(&host, WATCH_URL);
    let second = VideoPlayer::builder(host.clone())
        .video("dQw4w9WgXcQ", SupportedVideoApi::YouTube)
        .build()
        .unwrap();

    let (a, b) = tokio::join!(
        first.load_video(None, None, None),
        second.load_video(None, None, None)
    );
    assert_eq!(a, Ok(PlaybackStatus::Cued));
    assert_eq!(b, Ok(PlaybackStatus::Cued));
    assert_eq!(host.probe().script_injections(), 1);
    assert_eq!(host.probe().youtube_players_created(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_volume_applies_and_mutes() {
    let host = sim_host(SimConfig::default());
    let player = player_for(&host, WATCH_URL);
    assert_ok!(player.load_video(None, None, None).await);

    player.set_volume(0);
    assert_eq!(player.volume(), Some(0));
    player.set_volume(55);
    assert_eq!(player.volume(), Some(55));
    assert_eq!(player.options().volume, Some(55));
}

#[tokio::test(start_paused = true)]
async fn test_reload_after_failed_load_reaches_backend() {
    let broken = "https://cdn.example.com/media/broken.mp4";
    let host = sim_host(SimConfig {
        stalled_sources: vec![broken.to_string()],
        ..Default::default()
    });
    let config = PlayerConfig {
        promise_safety_timeout_ms: 1_000,
        ..Default::default()
    };
    let player = VideoPlayer::builder(host.clone())
        .config(config)
        .url(CLIP)
        .build()
        .unwrap();

    assert_eq!(assert_ok!(player.load_video(None, None, None).await), PlaybackStatus::Cued);

    let err = assert_err!(player.load_video_from_url(broken, None).await);
    assert!(matches!(err, Error::PromiseTimeout { .. }));
    assert_eq!(player.status(), PlaybackStatus::Cueing);

    let started = Instant::now();
    assert_eq!(assert_ok!(player.load_video_from_url(CLIP, None).await), PlaybackStatus::Cued);
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(player.status(), PlaybackStatus::Cued);
    assert_eq!(player.source().unwrap().id, CLIP);
}

#[tokio::test(start_paused = true)]
async fn test_second_load_sees_cueing_while_first_runs() {
    for url in [CLIP, WATCH_URL] {
        let host = sim_host(SimConfig::default());
        let player = player_for(&host, url);

        let first = player.load_video(None, None, None);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(player.status(), PlaybackStatus::Cueing, "{}", url);

        let second = player.load_video(None, None, None);
        assert_eq!(player.status(), PlaybackStatus::Cueing, "{}", url);
        assert_eq!(player.queue_len(), 2);

        assert_eq!(assert_ok!(first.await), PlaybackStatus::Cued);
        assert_eq!(assert_ok!(second.await), PlaybackStatus::Cued);
    }
}
