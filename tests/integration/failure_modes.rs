use ffslide::engine::{
    EncodeError, EncodeRequest, EncodeState, EncoderSettings, INVALID_OUTPUT_FILE, ImageSequence,
    MediaInfo, NO_OUTPUT_FILE, OptionSet, PidRegistry, Slideshow,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use crate::common::fake_encoder::*;
use crate::common::probes::ScriptedProbe;

fn slideshow_with(
    dir: &TempDir,
    settings: EncoderSettings,
    total_frames: u64,
    probe: Arc<ScriptedProbe>,
) -> Slideshow {
    let request = EncodeRequest::new(
        ImageSequence::new(dir.path().join("img_")),
        dir.path().join("out.mp4"),
        total_frames,
        OptionSet::default(),
    );
    Slideshow::new(request, settings, probe)
}

fn slideshow(dir: &TempDir, encoder: PathBuf, total_frames: u64) -> Slideshow {
    let settings = EncoderSettings {
        ffmpeg: encoder,
        ..EncoderSettings::default()
    };
    slideshow_with(dir, settings, total_frames, Arc::new(ScriptedProbe::valid(0.2)))
}

#[test]
fn test_unsupported_codec_kills_encoder() {
    let dir = TempDir::new().unwrap();
    let encoder = hanging_encoder(
        dir.path(),
        &["[mp4 @ 0x55d0] Unsupported codec for output stream #0:0"],
    );

    let mut show = slideshow(&dir, encoder, 5);
    let mut events = Vec::new();
    let started = Instant::now();
    let err = show
        .run(|p| {
            events.push(p);
            Ok(())
        })
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    match &err {
        EncodeError::CodecUnsupported { line, transcript, .. } => {
            assert!(line.contains("Unsupported codec"));
            assert!(transcript.contains(line.as_str()));
        }
        other => panic!("expected CodecUnsupported, got {:?}", other),
    }
    assert!(err.to_string().starts_with("Failed encoding: "));
    assert_eq!(events, vec![0.0]);
    assert_eq!(show.state(), EncodeState::Failed);
}

#[test]
fn test_missing_output_fails_validation() {
    let dir = TempDir::new().unwrap();
    let encoder = write_script(
        dir.path(),
        "ffmpeg-no-output",
        &stderr_line("frame=    3 fps=0.0", "\\n"),
    );

    let mut show = slideshow(&dir, encoder, 5);
    let mut events = Vec::new();
    let err = show
        .run(|p| {
            events.push(p);
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err.reasons(), [NO_OUTPUT_FILE.to_string()]);
    assert_eq!(
        err.to_string(),
        format!("Failed encoding. Errors: {}", NO_OUTPUT_FILE)
    );
    assert!(err.command().unwrap().contains("ffmpeg-no-output -f image2 -i"));
    assert!(err.transcript().unwrap().contains("frame=    3"));
    // 1.0 is only reported after a successful validation
    assert_eq!(events, vec![0.0, 0.6]);
}

#[test]
fn test_invalid_output_fails_validation() {
    let dir = TempDir::new().unwrap();
    let encoder = progressing_encoder(dir.path(), &[5]);
    let probe = Arc::new(ScriptedProbe::new(MediaInfo {
        exists: true,
        valid: false,
        ..MediaInfo::default()
    }));
    let settings = EncoderSettings {
        ffmpeg: encoder,
        ..EncoderSettings::default()
    };

    let mut show = slideshow_with(&dir, settings, 5, probe);
    let err = show.run_silent().unwrap_err();
    assert_eq!(err.reasons(), [INVALID_OUTPUT_FILE.to_string()]);
}

#[test]
fn test_duration_mismatch_fails_validation() {
    let dir = TempDir::new().unwrap();
    let encoder = progressing_encoder(dir.path(), &[50]);
    let settings = EncoderSettings {
        ffmpeg: encoder,
        ..EncoderSettings::default()
    };

    // 50 stills at 25 fps should give 2s; the probe claims 3s
    let mut show = slideshow_with(&dir, settings, 50, Arc::new(ScriptedProbe::valid(3.0)));
    let err = show.run_silent().unwrap_err();

    assert_eq!(
        err.reasons(),
        ["encoded file duration differed from desired duration (wanted: 2s, got: 3s)".to_string()]
    );
}

#[test]
fn test_encoder_killed_by_signal() {
    let dir = TempDir::new().unwrap();
    let encoder = write_script(
        dir.path(),
        "ffmpeg-sigterm",
        &format!("{}: > \"$last\"\nkill -TERM $$", stderr_line("frame=    1", "\\n")),
    );

    let mut show = slideshow(&dir, encoder, 5);
    let err = show.run_silent().unwrap_err();

    // Output exists, but a terminated encode is never validated
    assert!(matches!(err, EncodeError::Terminated { .. }), "{:?}", err);
}

#[test]
fn test_encoder_reports_received_signal() {
    let dir = TempDir::new().unwrap();
    let encoder = write_script(
        dir.path(),
        "ffmpeg-interrupted",
        &format!(
            "{}: > \"$last\"\nexit 255",
            stderr_line("Exiting normally, received signal 2.", "\\n")
        ),
    );

    let mut show = slideshow(&dir, encoder, 5);
    let err = show.run_silent().unwrap_err();
    match err {
        EncodeError::Terminated { transcript, .. } => {
            assert!(transcript.contains("received signal 2"));
        }
        other => panic!("expected Terminated, got {:?}", other),
    }
}

#[test]
fn test_external_sigterm_via_pid_registry() {
    let dir = TempDir::new().unwrap();
    let encoder = hanging_encoder(dir.path(), &["frame=    1 fps=0.0"]);
    let registry: PidRegistry = Arc::new(Mutex::new(HashSet::new()));

    let mut show = slideshow(&dir, encoder, 5).with_pid_registry(registry.clone());
    let handle = thread::spawn(move || show.run_silent());

    let deadline = Instant::now() + Duration::from_secs(10);
    let pid = loop {
        if let Some(pid) = registry.lock().unwrap().iter().next().copied() {
            break pid;
        }
        assert!(Instant::now() < deadline, "encoder never registered");
        thread::sleep(Duration::from_millis(10));
    };

    // SAFETY: plain kill(2) on a child PID we just observed
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    assert_eq!(rc, 0);

    let err = handle.join().unwrap().unwrap_err();
    assert!(matches!(err, EncodeError::Terminated { .. }), "{:?}", err);
    assert!(registry.lock().unwrap().is_empty());
}

#[test]
fn test_timeout_kills_encoder() {
    let dir = TempDir::new().unwrap();
    let encoder = hanging_encoder(dir.path(), &["frame=    1 fps=0.0"]);
    let settings = EncoderSettings {
        ffmpeg: encoder,
        timeout: Some(Duration::from_millis(300)),
        ..EncoderSettings::default()
    };

    let mut show = slideshow_with(&dir, settings, 5, Arc::new(ScriptedProbe::valid(0.2)));
    let started = Instant::now();
    let err = show.run_silent().unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    match err {
        EncodeError::TimedOut { after, transcript, .. } => {
            assert_eq!(after, Duration::from_millis(300));
            assert!(transcript.contains("frame=    1"));
        }
        other => panic!("expected TimedOut, got {:?}", other),
    }
}

#[test]
fn test_spawn_failure() {
    let dir = TempDir::new().unwrap();
    let mut show = slideshow(&dir, dir.path().join("no-such-ffmpeg"), 5);

    let err = show.run_silent().unwrap_err();
    assert!(matches!(err, EncodeError::ProcessSpawnFailed { .. }));
    assert!(err.transcript().is_none());
}

#[test]
fn test_zero_frames_rejected() {
    let dir = TempDir::new().unwrap();
    let encoder = progressing_encoder(dir.path(), &[1]);
    let mut show = slideshow(&dir, encoder, 0);

    let err = show.run_silent().unwrap_err();
    assert!(matches!(err, EncodeError::InvalidRequest(_)));
    assert!(!dir.path().join("out.mp4").exists());
}
