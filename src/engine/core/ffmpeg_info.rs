use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Check that ffmpeg runs and return its version line
pub fn ffmpeg_version(binary: &Path) -> Result<String> {
    version_line(binary).with_context(|| {
        format!(
            "Failed to execute {}. Is ffmpeg installed and in PATH?",
            binary.display()
        )
    })
}

/// Check that ffprobe runs and return its version line
pub fn ffprobe_version(binary: &Path) -> Result<String> {
    version_line(binary).with_context(|| {
        format!(
            "Failed to execute {}. Is ffprobe installed and in PATH?",
            binary.display()
        )
    })
}

fn version_line(binary: &Path) -> Result<String> {
    let output = Command::new(binary).arg("-version").output()?;

    if !output.status.success() {
        anyhow::bail!(
            "{} -version failed with status: {}",
            binary.display(),
            output.status
        );
    }

    Ok(first_line(&String::from_utf8_lossy(&output.stdout)))
}

fn first_line(version_output: &str) -> String {
    version_output
        .lines()
        .next()
        .unwrap_or("Unknown version")
        .to_string()
}
