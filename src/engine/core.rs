mod aspect;
mod error;
mod ffmpeg_cmd;
mod ffmpeg_info;
mod options;
mod progress;
mod supervisor;
mod types;
mod validator;

pub use aspect::{
    PreserveAxis, TranscoderOptions, apply_aspect_ratio, even_dimension, target_resolution,
};
pub use error::EncodeError;
pub use ffmpeg_cmd::{
    DEFAULT_QUALITY_FLAGS, EncoderSettings, build_slideshow_cmd, command_argv, format_ffmpeg_cmd,
};
pub use ffmpeg_info::{ffmpeg_version, ffprobe_version};
pub use options::{EncodingOptions, OptionSet, OptionValue};
pub use progress::{
    DiagnosticLines, FRAME_MARKER, FatalCondition, LineReport, ProgressParser,
    UNSUPPORTED_CODEC_MARKER, decode_line, parse_frame, progress_fraction,
};
pub use supervisor::{PidRegistry, Slideshow};
pub use types::{
    DEFAULT_IMAGE_EXTENSION, EncodeRequest, EncodeState, EncodedArtifact, IMAGE2_FRAME_RATE,
    ImageSequence, SourceInfo,
};
pub use validator::{
    DEFAULT_EXPLICIT_PRECISION, DEFAULT_IMPLICIT_PRECISION, INVALID_OUTPUT_FILE, NO_OUTPUT_FILE,
    ResultValidator, ValidationSettings, is_still_image,
};
