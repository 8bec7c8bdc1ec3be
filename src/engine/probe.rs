// Media inspection using ffprobe

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// ffprobe prints this when it had to guess the duration.
const UNCERTAIN_DURATION_MARKER: &str = "Estimating duration from bitrate";

/// What a probe learned about a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub exists: bool,
    pub valid: bool,
    pub duration: Option<f64>,
    pub aspect_ratio: Option<f64>,
    pub duration_uncertain: bool,
}

impl MediaInfo {
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Media-file inspection, consumed by the validator and the aspect-ratio step.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> MediaInfo;
}

/// [`MediaProbe`] backed by the ffprobe binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> MediaInfo {
        if !path.exists() {
            return MediaInfo::missing();
        }

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "warning",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(binary = %self.binary.display(), error = %e, "Failed to run ffprobe");
                return MediaInfo {
                    exists: true,
                    ..MediaInfo::default()
                };
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            debug!(path = %path.display(), status = %output.status, stderr = %stderr, "ffprobe rejected file");
            return MediaInfo {
                exists: true,
                ..MediaInfo::default()
            };
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout), &stderr)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    display_aspect_ratio: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Build [`MediaInfo`] for an existing file from ffprobe's JSON and stderr.
pub fn parse_probe_output(json: &str, stderr: &str) -> MediaInfo {
    let probe: FfprobeOutput = match serde_json::from_str(json) {
        Ok(probe) => probe,
        Err(e) => {
            debug!(error = %e, "Failed to parse ffprobe JSON output");
            return MediaInfo {
                exists: true,
                ..MediaInfo::default()
            };
        }
    };

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe
                .streams
                .iter()
                .find_map(|s| s.duration.as_deref().and_then(|d| d.parse::<f64>().ok()))
        });

    // Stills report codec_type "video" too, so this covers jpg/png frames
    let aspect_ratio = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .and_then(stream_aspect_ratio);

    MediaInfo {
        exists: true,
        valid: !probe.streams.is_empty(),
        duration,
        aspect_ratio,
        duration_uncertain: stderr.contains(UNCERTAIN_DURATION_MARKER),
    }
}

fn stream_aspect_ratio(stream: &FfprobeStream) -> Option<f64> {
    stream
        .display_aspect_ratio
        .as_deref()
        .and_then(|dar| parse_ratio(dar, ':'))
        .or_else(|| match (stream.width, stream.height) {
            (Some(w), Some(h)) if h > 0 && w > 0 => Some(f64::from(w) / f64::from(h)),
            _ => None,
        })
}

/// Parse a ratio string like "16:9" or "30000/1001" to f64
fn parse_ratio(s: &str, separator: char) -> Option<f64> {
    let (numerator, denominator) = s.split_once(separator)?;
    let numerator: f64 = numerator.trim().parse().ok()?;
    let denominator: f64 = denominator.trim().parse().ok()?;

    if denominator == 0.0 || numerator == 0.0 {
        return None;
    }

    Some(numerator / denominator)
}
