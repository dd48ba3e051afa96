//! `voip-spy`: pull the audio out of VoIP packet captures

mod commands;
mod logging;
mod settings;
mod table;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::{log_welcome, parse_log_level, setup_logging, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "voip-spy", version, about = "Reconstruct RTP audio from packet captures", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "VOIPSPY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write one WAV file per RTP stream plus metadata.json
    Extract {
        /// pcap or pcapng file
        capture: PathBuf,
        /// Base directory; a timestamped run directory is created inside
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
        /// Also write a stereo mix of the first two streams
        #[arg(long)]
        merge: bool,
        /// Skip streams shorter than this many seconds
        #[arg(long, value_name = "SECS")]
        min_duration: Option<f64>,
    },

    /// Print the streams found in a capture
    Metadata {
        capture: PathBuf,
        /// Print metadata.json instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Send a WAV file, or every stream of a capture, to a speech-to-text endpoint
    Transcribe {
        /// WAV file or capture
        input: PathBuf,
        /// Base URL of an OpenAI-compatible API
        #[arg(long, env = "VOIPSPY_TRANSCRIPTION_ENDPOINT")]
        endpoint: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Directory for the transcript file
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Record live traffic with tshark until Ctrl-C or the duration elapses
    Capture {
        #[arg(short, long)]
        interface: Option<String>,
        /// Capture file; defaults to a timestamped file in capture.output_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_name = "SECS")]
        duration: Option<u64>,
        /// Extract the streams once the capture stops
        #[arg(long)]
        extract: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::new(parse_log_level(&cli.log_level)?);
    if cli.json_logs {
        logging = logging.with_json().with_file_info();
    }
    setup_logging(logging)?;
    log_welcome("voip-spy", env!("CARGO_PKG_VERSION"));

    let config = settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Extract {
            capture,
            output,
            merge,
            min_duration,
        } => commands::extract(config, &capture, &output, merge, min_duration),
        Command::Metadata { capture, json } => commands::metadata(config, &capture, json),
        Command::Transcribe {
            input,
            endpoint,
            model,
            timeout,
            output,
        } => commands::transcribe(config, &input, endpoint, model, timeout, &output).await,
        Command::Capture {
            interface,
            output,
            duration,
            extract,
        } => commands::capture(config, interface, output, duration, extract).await,
    }
}
