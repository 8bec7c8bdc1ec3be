// End-to-end encodes against a real ffmpeg/ffprobe
// Skipped when the binaries are not installed

use ffslide::engine::{
    EncodeRequest, EncoderSettings, EncodingOptions, FfprobeProbe, ImageSequence, MediaProbe,
    PreserveAxis, Slideshow, TranscoderOptions,
};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::is_ffmpeg_available;

macro_rules! require_ffmpeg {
    () => {
        if !is_ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }
    };
}

/// Render `count` numbered 320x240 test-pattern stills as img_1.jpg, img_2.jpg, ...
fn generate_stills(dir: &Path, count: u32) {
    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y"])
        .args(["-f", "lavfi", "-i", "testsrc=size=320x240:rate=25"])
        .args(["-frames:v", &count.to_string()])
        .arg(dir.join("img_%d.jpg"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("Failed to run ffmpeg");
    assert!(status.success(), "Failed to generate stills");
}

#[test]
fn test_real_slideshow_encode() {
    require_ffmpeg!();

    let dir = TempDir::new().unwrap();
    generate_stills(dir.path(), 25);

    let options = EncodingOptions::new()
        .with("video_codec", "mpeg4")
        .with("resolution", "640x640");
    let request = EncodeRequest::new(
        ImageSequence::new(dir.path().join("img_")),
        dir.path().join("show.mp4"),
        25,
        options,
    )
    .with_transcoder_options(TranscoderOptions::preserving(PreserveAxis::Width));

    let mut show = Slideshow::new(request, EncoderSettings::default(), Arc::new(FfprobeProbe::default()));
    assert!(show.command_line().contains("-s 640x480"));

    let mut events = Vec::new();
    let artifact = show
        .run(|p| {
            events.push(p);
            Ok(())
        })
        .expect("real encode should validate");

    assert_eq!(events.first(), Some(&0.0));
    assert_eq!(events.last(), Some(&1.0));
    assert!(events.windows(2).all(|w| w[0] <= w[1]), "{:?}", events);

    let duration = artifact.duration().expect("probed duration");
    assert!((0.9..=1.1).contains(&duration), "duration {}", duration);
    let aspect = artifact.info().aspect_ratio.expect("probed aspect");
    assert!((aspect - 4.0 / 3.0).abs() < 0.01, "aspect {}", aspect);
}

#[test]
fn test_real_probe_of_still() {
    require_ffmpeg!();

    let dir = TempDir::new().unwrap();
    generate_stills(dir.path(), 1);

    let info = FfprobeProbe::default().probe(&dir.path().join("img_1.jpg"));
    assert!(info.exists);
    assert!(info.valid);
    assert_eq!(info.aspect_ratio, Some(320.0 / 240.0));
}
