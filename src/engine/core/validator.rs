//! Post-encode checks on the produced file.
//!
//! ffmpeg's exit code is not a reliable success signal, so an encode only
//! counts once the output exists, probes as valid media, and (where that can
//! be judged) has roughly the duration that was asked for.

use super::options::OptionSet;
use super::types::SourceInfo;
use crate::engine::probe::{MediaInfo, MediaProbe};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const NO_OUTPUT_FILE: &str = "no output file created";
pub const INVALID_OUTPUT_FILE: &str = "encoded file is invalid";

/// Tolerance factor when the caller asked for a specific `duration`.
pub const DEFAULT_EXPLICIT_PRECISION: f64 = 1.5;
/// Tolerance factor when the duration is implied by the source.
pub const DEFAULT_IMPLICIT_PRECISION: f64 = 1.1;

/// Output formats that hold a single picture; duration is meaningless there.
const STILL_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationSettings {
    pub explicit_precision: f64,
    pub implicit_precision: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            explicit_precision: DEFAULT_EXPLICIT_PRECISION,
            implicit_precision: DEFAULT_IMPLICIT_PRECISION,
        }
    }
}

/// Check if a path has a still-image file extension
pub fn is_still_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| STILL_IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

pub struct ResultValidator<'a> {
    probe: &'a dyn MediaProbe,
    settings: ValidationSettings,
}

impl<'a> ResultValidator<'a> {
    pub fn new(probe: &'a dyn MediaProbe, settings: ValidationSettings) -> Self {
        Self { probe, settings }
    }

    /// Run the checks in order, stopping at the first failure.
    ///
    /// Returns the probed output metadata on success, or the reasons in the
    /// order they were found.
    pub fn validate(
        &self,
        output: &Path,
        source: &SourceInfo,
        options: &OptionSet,
    ) -> Result<MediaInfo, Vec<String>> {
        let mut reasons = Vec::new();

        if !output.exists() {
            reasons.push(NO_OUTPUT_FILE.to_string());
            return Err(reasons);
        }

        let info = self.probe.probe(output);
        if !info.valid {
            reasons.push(INVALID_OUTPUT_FILE.to_string());
            return Err(reasons);
        }

        if let Some(reason) = self.duration_mismatch(output, &info, source, options) {
            reasons.push(reason);
            return Err(reasons);
        }

        Ok(info)
    }

    fn duration_mismatch(
        &self,
        output: &Path,
        info: &MediaInfo,
        source: &SourceInfo,
        options: &OptionSet,
    ) -> Option<String> {
        if source.duration_uncertain || is_still_image(output) {
            return None;
        }
        // Literal option strings have no inspectable duration
        let options = options.as_encoding()?;
        let source_duration = source.duration?;

        let requested = options.duration();
        let desired = match requested {
            Some(requested) if requested < source_duration => requested,
            _ => source_duration,
        };
        let precision = if requested.is_some() {
            self.settings.explicit_precision
        } else {
            self.settings.implicit_precision
        };

        let actual = info.duration.unwrap_or(0.0);
        let (low, high) = (desired / precision, desired * precision);
        debug!(desired, actual, low, high, "Checking encoded duration");

        if actual >= low && actual <= high {
            None
        } else {
            Some(format!(
                "encoded file duration differed from desired duration (wanted: {}s, got: {}s)",
                desired, actual
            ))
        }
    }
}
