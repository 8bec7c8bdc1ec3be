// Global configuration management

use crate::engine::{
    DEFAULT_EXPLICIT_PRECISION, DEFAULT_IMAGE_EXTENSION, DEFAULT_IMPLICIT_PRECISION,
    DEFAULT_QUALITY_FLAGS, EncoderSettings, FfprobeProbe, ValidationSettings,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub binaries: BinariesConfig,

    #[serde(default)]
    pub encoding: EncodingConfig,

    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinariesConfig {
    /// ffmpeg executable, either a bare name looked up in PATH or a full path
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    /// ffprobe executable used to inspect stills and encoded output
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Flags placed right after the input, before the request options
    #[serde(default = "default_quality_flags")]
    pub quality_flags: String,

    /// Extension of the numbered stills
    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    /// Kill the encoder after this many seconds (0 disables the limit)
    #[serde(default)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Duration tolerance factor when a duration was requested
    #[serde(default = "default_explicit_precision")]
    pub explicit_precision: f64,

    /// Duration tolerance factor when the duration follows the stills
    #[serde(default = "default_implicit_precision")]
    pub implicit_precision: f64,
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_quality_flags() -> String {
    DEFAULT_QUALITY_FLAGS.to_string()
}

fn default_image_extension() -> String {
    DEFAULT_IMAGE_EXTENSION.to_string()
}

fn default_explicit_precision() -> f64 {
    DEFAULT_EXPLICIT_PRECISION
}

fn default_implicit_precision() -> f64 {
    DEFAULT_IMPLICIT_PRECISION
}

impl Default for BinariesConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            quality_flags: default_quality_flags(),
            image_extension: default_image_extension(),
            timeout_secs: 0,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            explicit_precision: default_explicit_precision(),
            implicit_precision: default_implicit_precision(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("ffslide")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("ffslide")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();

            // Not fatal: an unwritable config dir still leaves the built-in defaults
            if let Err(e) = config.save() {
                warn!(
                    error = %format!("{:#}", e),
                    "Could not create default config file; using built-in defaults. Run 'ffslide init-config' to create one"
                );
            }

            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a default config file if it doesn't exist
    pub fn ensure_default() -> Result<()> {
        if !Self::exists() {
            Config::default().save()?;
        }
        Ok(())
    }

    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            ffmpeg: self.binaries.ffmpeg.clone(),
            quality_flags: self.encoding.quality_flags.clone(),
            timeout: (self.encoding.timeout_secs > 0)
                .then(|| Duration::from_secs(self.encoding.timeout_secs)),
        }
    }

    pub fn validation_settings(&self) -> ValidationSettings {
        ValidationSettings {
            explicit_precision: self.validation.explicit_precision,
            implicit_precision: self.validation.implicit_precision,
        }
    }

    pub fn probe(&self) -> FfprobeProbe {
        FfprobeProbe::new(self.binaries.ffprobe.clone())
    }
}
