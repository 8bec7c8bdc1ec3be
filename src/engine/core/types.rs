use super::aspect::TranscoderOptions;
use super::error::EncodeError;
use super::options::OptionSet;
use crate::engine::probe::{MediaInfo, MediaProbe};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// ffmpeg's image2 demuxer reads stills at 25 fps unless told otherwise.
pub const IMAGE2_FRAME_RATE: f64 = 25.0;

pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EncodeState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Numbered stills named `<prefix><n>.<extension>`, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSequence {
    pub prefix: PathBuf,
    pub extension: String,
}

impl ImageSequence {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: DEFAULT_IMAGE_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// The `%d` input pattern handed to ffmpeg.
    pub fn pattern(&self) -> PathBuf {
        self.with_suffix("%d")
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.with_suffix(&index.to_string())
    }

    fn with_suffix(&self, counter: &str) -> PathBuf {
        let mut name = OsString::from(self.prefix.as_os_str());
        name.push(counter);
        name.push(".");
        name.push(&self.extension);
        PathBuf::from(name)
    }
}

/// One slideshow encode: where the stills are, where the video goes, and how.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub images: ImageSequence,
    pub output: PathBuf,
    pub total_frames: u64,
    pub options: OptionSet,
    pub transcoder: TranscoderOptions,
}

impl EncodeRequest {
    pub fn new(
        images: ImageSequence,
        output: impl Into<PathBuf>,
        total_frames: u64,
        options: impl Into<OptionSet>,
    ) -> Self {
        Self {
            images,
            output: output.into(),
            total_frames,
            options: options.into(),
            transcoder: TranscoderOptions::default(),
        }
    }

    pub fn with_transcoder_options(mut self, transcoder: TranscoderOptions) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn validate(&self) -> Result<(), EncodeError> {
        if self.total_frames == 0 {
            return Err(EncodeError::InvalidRequest(
                "declared total frame count must be positive".to_string(),
            ));
        }
        if self.output.as_os_str().is_empty() {
            return Err(EncodeError::InvalidRequest(
                "output path is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the validator needs to know about the input side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourceInfo {
    pub duration: Option<f64>,
    pub duration_uncertain: bool,
    pub aspect_ratio: Option<f64>,
}

impl SourceInfo {
    /// Still sequences play one frame per image at the image2 input rate.
    pub fn for_stills(total_frames: u64, aspect_ratio: Option<f64>) -> Self {
        Self {
            duration: Some(total_frames as f64 / IMAGE2_FRAME_RATE),
            duration_uncertain: false,
            aspect_ratio,
        }
    }
}

/// Handle to a successfully encoded output file.
///
/// Metadata is probed at most once, on first access.
pub struct EncodedArtifact {
    path: PathBuf,
    probe: Arc<dyn MediaProbe>,
    info: OnceLock<MediaInfo>,
}

impl EncodedArtifact {
    pub fn new(path: impl Into<PathBuf>, probe: Arc<dyn MediaProbe>) -> Self {
        Self {
            path: path.into(),
            probe,
            info: OnceLock::new(),
        }
    }

    /// Artifact whose metadata was already probed during validation.
    pub fn probed(path: impl Into<PathBuf>, probe: Arc<dyn MediaProbe>, info: MediaInfo) -> Self {
        let artifact = Self::new(path, probe);
        let _ = artifact.info.set(info);
        artifact
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &MediaInfo {
        self.info.get_or_init(|| self.probe.probe(&self.path))
    }

    pub fn duration(&self) -> Option<f64> {
        self.info().duration
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl fmt::Debug for EncodedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedArtifact")
            .field("path", &self.path)
            .field("info", &self.info.get())
            .finish()
    }
}
