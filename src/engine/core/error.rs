use std::io;
use std::time::Duration;
use thiserror::Error;

/// Everything a single slideshow encode can fail with.
///
/// Runtime variants carry the escaped command line and, where the encoder
/// got far enough to write anything, the captured stderr transcript, so a
/// failure can be diagnosed without re-running it. Nothing here is retried.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Unknown options format '{found}', should be either EncodingOptions, a mapping or a string")]
    InvalidOptionsFormat { found: String },

    #[error("Invalid encode request: {0}")]
    InvalidRequest(String),

    #[error("Failed encoding: {line}")]
    CodecUnsupported {
        line: String,
        command: String,
        transcript: String,
    },

    #[error("Failed encoding. Errors: {}", reasons.join(", "))]
    ValidationFailed {
        reasons: Vec<String>,
        command: String,
        transcript: String,
    },

    #[error("Failed to spawn encoder: {command}")]
    ProcessSpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Encoder was terminated before finishing ({status})")]
    Terminated {
        status: String,
        command: String,
        transcript: String,
    },

    #[error("Encoder killed after exceeding timeout of {}s", after.as_secs_f64())]
    TimedOut {
        after: Duration,
        command: String,
        transcript: String,
    },

    #[error("Encoder I/O failed: {source}")]
    Io {
        command: String,
        transcript: String,
        #[source]
        source: io::Error,
    },
}

impl EncodeError {
    /// Command line the failing encode ran with, if it got that far.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::CodecUnsupported { command, .. }
            | Self::ValidationFailed { command, .. }
            | Self::ProcessSpawnFailed { command, .. }
            | Self::Terminated { command, .. }
            | Self::TimedOut { command, .. }
            | Self::Io { command, .. } => Some(command),
            _ => None,
        }
    }

    /// Full stderr transcript captured before the failure.
    pub fn transcript(&self) -> Option<&str> {
        match self {
            Self::CodecUnsupported { transcript, .. }
            | Self::ValidationFailed { transcript, .. }
            | Self::Terminated { transcript, .. }
            | Self::TimedOut { transcript, .. }
            | Self::Io { transcript, .. } => Some(transcript),
            _ => None,
        }
    }

    /// Validator reasons, in discovery order. Empty for every other failure.
    pub fn reasons(&self) -> &[String] {
        match self {
            Self::ValidationFailed { reasons, .. } => reasons,
            _ => &[],
        }
    }
}
