use super::options::OptionSet;
use super::types::ImageSequence;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Fixed quality flags placed right after the input.
pub const DEFAULT_QUALITY_FLAGS: &str = "-q:v 1";

/// Resolved encoder dependencies handed to the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub ffmpeg: PathBuf,
    pub quality_flags: String,
    pub timeout: Option<Duration>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            quality_flags: DEFAULT_QUALITY_FLAGS.to_string(),
            timeout: None,
        }
    }
}

/// Build the slideshow command:
/// `ffmpeg -f image2 -i <prefix>%d.<ext> <quality flags> -y <options> <output>`
pub fn build_slideshow_cmd(
    settings: &EncoderSettings,
    images: &ImageSequence,
    options: &OptionSet,
    output: &Path,
) -> Command {
    let mut cmd = Command::new(&settings.ffmpeg);

    // Input: one frame per numbered still
    cmd.arg("-f").arg("image2");
    cmd.arg("-i").arg(images.pattern());

    apply_split_args(&mut cmd, &settings.quality_flags);
    cmd.arg("-y");

    cmd.args(options.to_args());
    cmd.arg(output);

    cmd
}

/// Apply a flag string to the command using shell-style parsing.
fn apply_split_args(cmd: &mut Command, flags: &str) {
    if flags.trim().is_empty() {
        return;
    }

    if let Some(args) = shlex::split(flags) {
        cmd.args(args);
    } else {
        // If shlex fails to parse (unbalanced quotes), fall back to simple whitespace split
        cmd.args(flags.split_whitespace());
    }
}

/// Render a command as a single shell-escaped line for logs and errors.
pub fn format_ffmpeg_cmd(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|arg| {
            let s = arg.to_string_lossy();
            shlex::try_quote(&s)
                .map(Cow::into_owned)
                .unwrap_or_else(|_| s.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Argv of a command without any quoting, one entry per argument.
pub fn command_argv(cmd: &Command) -> Vec<String> {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}
