//! vidbridge CLI - Headless Player Driver
//!
//! Features:
//! - Video URL identification
//! - Playback runs against the simulation host
//! - Scripted action sequences showing queue ordering

use clap::{Parser, Subcommand};

mod commands;
mod output;

use output::OutputFormat;

/// vidbridge CLI - Uniform video player driver
#[derive(Parser)]
#[command(name = "vidbridge")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Drive HTML5 and YouTube players through one queued interface", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the backend and id of a video URL
    Parse {
        /// Video URL
        url: String,
    },

    /// Load and start a video, then report its progress
    Play {
        /// Video URL, or an id when --api is given
        source: String,

        /// Backend (html5, youtube)
        #[arg(short, long)]
        api: Option<String>,

        /// Start position in seconds
        #[arg(long)]
        start: Option<f64>,

        /// End position in seconds
        #[arg(long)]
        end: Option<f64>,

        /// Volume (0-100)
        #[arg(long)]
        volume: Option<u8>,

        /// Playback rate
        #[arg(short, long)]
        rate: Option<f64>,

        /// Start as soon as the video is ready
        #[arg(long)]
        autoplay: bool,

        /// Restart when playback ends
        #[arg(long = "loop")]
        looping: bool,

        /// Seconds to report progress for
        #[arg(short, long, default_value = "5")]
        watch: u64,
    },

    /// Enqueue a sequence of steps at once and report each settlement
    Script {
        /// Video URL, or an id when --api is given
        source: String,

        /// Steps: load, start, pause, stop, toggle, seek:SECS, rate:R
        #[arg(required = true)]
        steps: Vec<String>,

        /// Backend (html5, youtube)
        #[arg(short, long)]
        api: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from(cli.format.as_str());

    match cli.command {
        Commands::Parse { url } => {
            commands::parse(&url, format)?;
        }
        Commands::Play { source, api, start, end, volume, rate, autoplay, looping, watch } => {
            let options = commands::PlayOptions {
                start,
                end,
                volume,
                rate,
                autoplay,
                looping,
            };
            commands::play(&source, api.as_deref(), options, watch, format).await?;
        }
        Commands::Script { source, steps, api } => {
            commands::script(&source, api.as_deref(), &steps, format).await?;
        }
    }

    Ok(())
}
