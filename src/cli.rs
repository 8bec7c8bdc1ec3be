use clap::{Args, Parser, Subcommand};
use ffslide::engine::{OptionValue, PreserveAxis};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ffslide")]
#[command(about = "Supervised ffmpeg slideshow encoder", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log at debug level (RUST_LOG overrides this)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode numbered stills into a video and validate the result
    Encode(EncodeArgs),

    /// Show the ffmpeg command without executing (dry run)
    DryRun(EncodeArgs),

    /// Probe a media file and print what was learned as JSON
    Probe {
        /// Path to the media file
        file: PathBuf,
    },

    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

#[derive(Args, Debug, Clone)]
pub struct EncodeArgs {
    /// Stills prefix; frames are read from <PREFIX>1.<ext>, <PREFIX>2.<ext>, ...
    #[arg(value_name = "PREFIX")]
    pub prefix: PathBuf,

    /// Output video path
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Number of stills in the sequence
    #[arg(long, short = 'n')]
    pub frames: u64,

    /// Encoding option as key=value, e.g. video_codec=libx264 (repeatable)
    #[arg(long = "option", short = 'o', value_parser = parse_option, conflicts_with = "raw")]
    pub options: Vec<(String, OptionValue)>,

    /// Raw ffmpeg option string used verbatim instead of --option
    #[arg(long)]
    pub raw: Option<String>,

    /// Keep this side of the resolution and fit the other to the stills
    #[arg(long, value_parser = parse_preserve)]
    pub preserve: Option<PreserveAxis>,

    /// Stills extension (overrides config)
    #[arg(long)]
    pub extension: Option<String>,

    /// Kill the encoder after this many seconds (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Parse `key=value`, typing the value as int, then float, then text.
fn parse_option(s: &str) -> Result<(String, OptionValue), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing option name in '{}'", s));
    }

    let value = if let Ok(i) = value.parse::<i64>() {
        OptionValue::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        OptionValue::Float(f)
    } else {
        OptionValue::Text(value.to_string())
    };

    Ok((key.to_string(), value))
}

fn parse_preserve(s: &str) -> Result<PreserveAxis, String> {
    s.parse()
}

pub fn parse() -> Cli {
    Cli::parse()
}
