//! CLI command implementations

use crate::output::{emit, FinalReport, OutputFormat, PlaybackReport, SourceReport, StepReport};
use anyhow::{anyhow, bail, Context};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use vidbridge_core::{
    parse_video_url, ActionHandle, PlaybackStatus, SimConfig, SimHost, SupportedVideoApi,
    VideoOptions, VideoPlayer,
};

/// Options accepted by `play`
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub volume: Option<u8>,
    pub rate: Option<f64>,
    pub autoplay: bool,
    pub looping: bool,
}

impl From<PlayOptions> for VideoOptions {
    fn from(options: PlayOptions) -> Self {
        VideoOptions {
            autoplay: Some(options.autoplay),
            looping: Some(options.looping),
            rate: options.rate,
            volume: options.volume,
            start: options.start,
            end: options.end,
            ..Default::default()
        }
        .normalized()
    }
}

/// One step of a `script` run
#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Load,
    Start,
    Pause,
    Stop,
    Toggle,
    Seek(f64),
    Rate(f64),
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        let number = |arg: Option<&str>| -> anyhow::Result<f64> {
            let arg = arg.ok_or_else(|| anyhow!("step '{}' needs a value, e.g. {}:1.5", name, name))?;
            arg.parse::<f64>()
                .with_context(|| format!("invalid value '{}' in step '{}'", arg, s))
        };

        Ok(match name.to_ascii_lowercase().as_str() {
            "load" => Step::Load,
            "start" | "play" => Step::Start,
            "pause" => Step::Pause,
            "stop" => Step::Stop,
            "toggle" => Step::Toggle,
            "seek" => Step::Seek(number(arg)?),
            "rate" => Step::Rate(number(arg)?),
            other => bail!("unknown step '{}'", other),
        })
    }
}

impl Step {
    fn enqueue(self, player: &VideoPlayer) -> ActionHandle<PlaybackStatus> {
        match self {
            Step::Load => player.load_video(None, None, None),
            Step::Start => player.start_video(),
            Step::Pause => player.pause_video(),
            Step::Stop => player.stop_video(),
            Step::Toggle => player.play_or_pause_video(),
            Step::Seek(position) => player.seek_video(position),
            Step::Rate(rate) => player.set_playback_rate(Some(rate)),
        }
    }
}

fn build_player(source: &str, api: Option<&str>, options: VideoOptions) -> anyhow::Result<VideoPlayer> {
    let host = Arc::new(SimHost::new(SimConfig::default()));
    let builder = VideoPlayer::builder(host).options(options);
    let builder = match api {
        Some(api) => builder.video(source, SupportedVideoApi::from_str(api)?),
        None => builder.url(source),
    };
    Ok(builder.build()?)
}

/// Parse a video URL
pub fn parse(url: &str, format: OutputFormat) -> anyhow::Result<()> {
    let source = parse_video_url(url)?;
    emit(
        &SourceReport {
            url: url.to_string(),
            source,
        },
        format,
    );
    Ok(())
}

/// Load and start a video, then sample its state every 500ms
pub async fn play(
    source: &str,
    api: Option<&str>,
    options: PlayOptions,
    watch: u64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let player = build_player(source, api, options.into())?;
    let started = Instant::now();

    let report = |player: &VideoPlayer| PlaybackReport {
        elapsed_ms: started.elapsed().as_millis() as u64,
        status: player.status(),
        position: player.position(),
        duration: player.duration(),
        volume: player.volume(),
        rate: player.playback_rate(),
    };

    player.load_video(None, None, None).await?;
    emit(&report(&player), format);
    player.start_video().await?;

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let deadline = started + Duration::from_secs(watch);
    while Instant::now() < deadline {
        ticker.tick().await;
        emit(&report(&player), format);
        if player.status() == PlaybackStatus::Ended {
            break;
        }
    }

    player.destroy();
    Ok(())
}

/// Enqueue every step up front, then report settlements in order
pub async fn script(
    source: &str,
    api: Option<&str>,
    steps: &[String],
    format: OutputFormat,
) -> anyhow::Result<()> {
    let parsed = steps
        .iter()
        .map(|s| s.parse::<Step>())
        .collect::<anyhow::Result<Vec<_>>>()?;

    let player = build_player(source, api, VideoOptions::default())?;
    let started = Instant::now();

    let handles: Vec<_> = parsed.iter().map(|step| step.enqueue(&player)).collect();
    tracing::debug!(queued = player.queue_len(), "Script enqueued");

    let mut failed_steps = 0;
    for (index, (handle, step)) in handles.into_iter().zip(steps).enumerate() {
        let action = handle.id().to_string();
        let result = handle.await;
        if result.is_err() {
            failed_steps += 1;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;
        emit(&StepReport::new(index, step, action, elapsed_ms, result), format);
    }

    emit(
        &FinalReport {
            status: player.status(),
            position: player.position(),
            rate: player.playback_rate(),
            failed_steps,
        },
        format,
    );
    player.destroy();
    Ok(())
}
