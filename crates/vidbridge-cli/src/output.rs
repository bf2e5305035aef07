//! Output formatting for CLI

use console::style;
use serde::Serialize;
use std::fmt;
use vidbridge_core::{Error, PlaybackStatus, VideoSource};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Print a record in the selected format, one line per record
pub fn emit<T: Serialize + fmt::Display>(record: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string()))
        }
        OutputFormat::Text => println!("{}", record),
    }
}

fn styled_status(status: PlaybackStatus) -> String {
    let text = status.to_string();
    if status.is_transitional() {
        style(text).yellow().to_string()
    } else if matches!(status, PlaybackStatus::Started) {
        style(text).green().to_string()
    } else {
        style(text).cyan().to_string()
    }
}

fn seconds(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}s", v))
}

/// Parsed video source
#[derive(Debug, Serialize)]
pub struct SourceReport {
    pub url: String,
    #[serde(flatten)]
    pub source: VideoSource,
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source: {}", self.url)?;
        writeln!(f, "  Backend: {}", style(self.source.api).bold())?;
        write!(f, "  Id: {}", self.source.id)
    }
}

/// Player state sampled while watching playback
#[derive(Debug, Serialize)]
pub struct PlaybackReport {
    pub elapsed_ms: u64,
    pub status: PlaybackStatus,
    pub position: Option<f64>,
    pub duration: Option<f64>,
    pub volume: Option<u8>,
    pub rate: Option<f64>,
}

impl fmt::Display for PlaybackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>6}ms] {:<10} {} / {}  volume {}  rate {}",
            self.elapsed_ms,
            styled_status(self.status),
            seconds(self.position),
            seconds(self.duration),
            self.volume.map_or_else(|| "-".to_string(), |v| v.to_string()),
            self.rate.map_or_else(|| "-".to_string(), |r| format!("{}x", r)),
        )
    }
}

/// Settlement of one queued step
#[derive(Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub step: String,
    pub action: String,
    pub elapsed_ms: u64,
    pub status: Option<PlaybackStatus>,
    pub error: Option<String>,
    pub error_code: Option<&'static str>,
}

impl StepReport {
    pub fn new(
        index: usize,
        step: &str,
        action: String,
        elapsed_ms: u64,
        result: Result<PlaybackStatus, Error>,
    ) -> Self {
        let (status, error, error_code) = match result {
            Ok(status) => (Some(status), None, None),
            Err(e) => (None, Some(e.to_string()), Some(e.error_code())),
        };
        Self {
            index,
            step: step.to_string(),
            action,
            elapsed_ms,
            status,
            error,
            error_code,
        }
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>2}. {:<12} [{:>6}ms] ", self.index + 1, self.step, self.elapsed_ms)?;
        match (&self.status, &self.error) {
            (Some(status), _) => write!(f, "{} {}", style("ok").green(), styled_status(*status)),
            (None, Some(error)) => write!(f, "{} {}", style("failed").red(), error),
            (None, None) => write!(f, "{}", style("?").dim()),
        }
    }
}

/// Final state after a script
#[derive(Debug, Serialize)]
pub struct FinalReport {
    pub status: PlaybackStatus,
    pub position: Option<f64>,
    pub rate: Option<f64>,
    pub failed_steps: usize,
}

impl fmt::Display for FinalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\nFinal status: {} at {} ({} failed step(s))",
            styled_status(self.status),
            seconds(self.position),
            self.failed_steps
        )
    }
}
