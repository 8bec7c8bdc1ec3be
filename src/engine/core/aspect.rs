use super::options::OptionSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side of the requested resolution stays fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreserveAxis {
    Width,
    Height,
}

impl FromStr for PreserveAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "width" => Ok(Self::Width),
            "height" => Ok(Self::Height),
            other => Err(format!("expected 'width' or 'height', got '{}'", other)),
        }
    }
}

impl fmt::Display for PreserveAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Width => f.write_str("width"),
            Self::Height => f.write_str("height"),
        }
    }
}

/// Directives for the supervisor, separate from the encoder flags themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscoderOptions {
    #[serde(default)]
    pub preserve_aspect_ratio: Option<PreserveAxis>,
}

impl TranscoderOptions {
    pub fn preserving(axis: PreserveAxis) -> Self {
        Self {
            preserve_aspect_ratio: Some(axis),
        }
    }
}

/// Round a computed dimension to an even whole number.
///
/// Take the ceiling if it is even, otherwise the floor; a value that was
/// already an odd integer is still odd after that and gets bumped by one.
/// `None` when the result is not a usable frame dimension.
pub fn even_dimension(value: f64) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    let ceiled = value.ceil();
    let mut dim = if ceiled % 2.0 == 0.0 {
        ceiled
    } else {
        value.floor()
    };
    if dim % 2.0 != 0.0 {
        dim += 1.0;
    }
    (2.0..=f64::from(u32::MAX - 1))
        .contains(&dim)
        .then_some(dim as u32)
}

/// Resolution that keeps `axis` and derives the other side from `aspect_ratio`.
///
/// `None` when the derived side would be degenerate or overflow.
pub fn target_resolution(
    width: u32,
    height: u32,
    aspect_ratio: f64,
    axis: PreserveAxis,
) -> Option<(u32, u32)> {
    match axis {
        PreserveAxis::Width => Some((width, even_dimension(f64::from(width) / aspect_ratio)?)),
        PreserveAxis::Height => Some((even_dimension(f64::from(height) * aspect_ratio)?, height)),
    }
}

/// Rewrite the `resolution` entry of `options` to match the source aspect ratio.
///
/// No-op (returns `None`) when no axis was requested, the aspect ratio is
/// unknown or extreme enough to derive an unusable dimension, the options
/// are a literal string, or there is no parseable resolution to start from. Returns the new `WxH` string otherwise.
pub fn apply_aspect_ratio(
    options: &mut OptionSet,
    source_aspect_ratio: Option<f64>,
    transcoder: &TranscoderOptions,
) -> Option<String> {
    let axis = transcoder.preserve_aspect_ratio?;
    let aspect = source_aspect_ratio.filter(|a| a.is_finite() && *a > 0.0)?;
    let (width, height) = options.as_encoding()?.resolution()?;

    let (new_width, new_height) = target_resolution(width, height, aspect, axis)?;
    let resolution = format!("{}x{}", new_width, new_height);
    options.set("resolution", resolution.as_str());
    Some(resolution)
}
