//! Runs one slideshow encode from spawn to validated artifact.
//!
//! stderr is drained on a dedicated reader thread that forwards decoded
//! lines over a channel, so ffmpeg never stalls on a full pipe while this
//! thread parses progress, waits for exit, or enforces a timeout. The child
//! is owned by a guard that kills, reaps, and unregisters it on every exit
//! path.

use super::aspect::apply_aspect_ratio;
use super::error::EncodeError;
use super::ffmpeg_cmd::{EncoderSettings, build_slideshow_cmd, format_ffmpeg_cmd};
use super::options::OptionSet;
use super::progress::{
    DiagnosticLines, FatalCondition, ProgressParser, decode_line, progress_fraction,
};
use super::types::{EncodeRequest, EncodeState, EncodedArtifact, SourceInfo};
use super::validator::{ResultValidator, ValidationSettings};
use crate::engine::probe::MediaProbe;

use std::collections::HashSet;
use std::io::{self, BufReader, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// PIDs of running encoders, so a caller can terminate them from outside.
pub type PidRegistry = Arc<Mutex<HashSet<u32>>>;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Message from the stderr reader thread
enum DiagnosticEvent {
    Line(String),
    ReadFailed(io::Error),
}

/// Supervisor for a single slideshow encode.
pub struct Slideshow {
    request: EncodeRequest,
    settings: EncoderSettings,
    validation: ValidationSettings,
    probe: Arc<dyn MediaProbe>,
    pid_registry: Option<PidRegistry>,
    state: EncodeState,
}

impl Slideshow {
    pub fn new(
        request: EncodeRequest,
        settings: EncoderSettings,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        Self {
            request,
            settings,
            validation: ValidationSettings::default(),
            probe,
            pid_registry: None,
            state: EncodeState::Idle,
        }
    }

    pub fn with_validation(mut self, validation: ValidationSettings) -> Self {
        self.validation = validation;
        self
    }

    /// Register the encoder PID here while it runs.
    pub fn with_pid_registry(mut self, registry: PidRegistry) -> Self {
        self.pid_registry = Some(registry);
        self
    }

    pub fn request(&self) -> &EncodeRequest {
        &self.request
    }

    pub fn state(&self) -> EncodeState {
        self.state
    }

    /// Input-side facts for validation. The first still is only probed when
    /// an aspect-ratio directive needs its shape.
    pub fn source_info(&self) -> SourceInfo {
        let aspect_ratio = if self.request.transcoder.preserve_aspect_ratio.is_some() {
            let first = self.request.images.frame_path(1);
            let aspect = self.probe.probe(&first).aspect_ratio;
            if aspect.is_none() {
                debug!(still = %first.display(), "Aspect ratio of first still unknown; keeping resolution");
            }
            aspect
        } else {
            None
        };
        SourceInfo::for_stills(self.request.total_frames, aspect_ratio)
    }

    /// Request options after the aspect-ratio adjustment.
    pub fn prepared_options(&self, source: &SourceInfo) -> OptionSet {
        let mut options = self.request.options.clone();
        if let Some(resolution) =
            apply_aspect_ratio(&mut options, source.aspect_ratio, &self.request.transcoder)
        {
            debug!(%resolution, "Adjusted resolution to source aspect ratio");
        }
        options
    }

    /// The escaped command line `run` would execute.
    pub fn command_line(&self) -> String {
        let source = self.source_info();
        let options = self.prepared_options(&source);
        format_ffmpeg_cmd(&build_slideshow_cmd(
            &self.settings,
            &self.request.images,
            &options,
            &self.request.output,
        ))
    }

    /// Encode, reporting progress in `[0.0, 1.0]` to `on_progress`.
    ///
    /// The observer sees 0.0 once the encoder is running, one value per
    /// frame counter on stderr, and 1.0 only after validation passed. An
    /// observer error is logged and otherwise ignored.
    pub fn run<F>(&mut self, mut on_progress: F) -> Result<EncodedArtifact, EncodeError>
    where
        F: FnMut(f64) -> anyhow::Result<()>,
    {
        let result = self.execute(&mut on_progress);
        self.state = if result.is_ok() {
            EncodeState::Succeeded
        } else {
            EncodeState::Failed
        };
        result
    }

    pub fn run_silent(&mut self) -> Result<EncodedArtifact, EncodeError> {
        self.run(|_| Ok(()))
    }

    fn execute<F>(&mut self, on_progress: &mut F) -> Result<EncodedArtifact, EncodeError>
    where
        F: FnMut(f64) -> anyhow::Result<()>,
    {
        self.request.validate()?;
        let total_frames = self.request.total_frames;

        let source = self.source_info();
        let options = self.prepared_options(&source);
        let mut cmd = build_slideshow_cmd(
            &self.settings,
            &self.request.images,
            &options,
            &self.request.output,
        );
        let command = format_ffmpeg_cmd(&cmd);
        info!(command = %command, "Running transcoding");

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .map_err(|source| EncodeError::ProcessSpawnFailed {
                command: command.clone(),
                source,
            })?;
        self.state = EncodeState::Running;

        let mut process = SupervisedChild::new(child, self.pid_registry.clone());
        let lines = process
            .pump_stderr()
            .map_err(|source| io_failure(&command, "", source))?;
        emit(on_progress, 0.0);

        let parser = ProgressParser::new();
        let mut transcript = String::new();
        let deadline = self.settings.timeout.map(|t| (t, Instant::now() + t));

        loop {
            let event = match deadline {
                Some((after, at)) => {
                    match lines.recv_timeout(at.saturating_duration_since(Instant::now())) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => {
                            return Err(timed_out(&mut process, after, command, transcript));
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match lines.recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };

            if let Err(e) = handle_event(
                event,
                &parser,
                total_frames,
                &command,
                &mut transcript,
                on_progress,
            ) {
                process.kill();
                return Err(e);
            }
        }

        let status = match process
            .wait(deadline.map(|(_, at)| at))
            .map_err(|source| io_failure(&command, &transcript, source))?
        {
            Some(status) => status,
            None => {
                let after = deadline.map(|(after, _)| after).unwrap_or_default();
                return Err(timed_out(&mut process, after, command, transcript));
            }
        };
        drop(process);

        if was_terminated(&status, &transcript) {
            error!(command = %command, status = %status, output = %transcript, "Encoder terminated");
            return Err(EncodeError::Terminated {
                status: status.to_string(),
                command,
                transcript,
            });
        }
        if !status.success() {
            warn!(status = %status, "Encoder exited with failure status; validating output anyway");
        }

        let validator = ResultValidator::new(self.probe.as_ref(), self.validation);
        match validator.validate(&self.request.output, &source, &options) {
            Ok(info) => {
                emit(on_progress, 1.0);
                info!(
                    "Transcoding of {} to {} succeeded",
                    self.request.images.pattern().display(),
                    self.request.output.display()
                );
                Ok(EncodedArtifact::probed(
                    self.request.output.clone(),
                    Arc::clone(&self.probe),
                    info,
                ))
            }
            Err(reasons) => {
                error!(
                    command = %command,
                    output = %transcript,
                    errors = %reasons.join(", "),
                    "Failed encoding"
                );
                Err(EncodeError::ValidationFailed {
                    reasons,
                    command,
                    transcript,
                })
            }
        }
    }
}

/// Fold one stderr event into the transcript and report progress.
///
/// An `Err` means the encode must stop now.
fn handle_event<F>(
    event: DiagnosticEvent,
    parser: &ProgressParser,
    total_frames: u64,
    command: &str,
    transcript: &mut String,
    on_progress: &mut F,
) -> Result<(), EncodeError>
where
    F: FnMut(f64) -> anyhow::Result<()>,
{
    let line = match event {
        DiagnosticEvent::Line(line) => line,
        DiagnosticEvent::ReadFailed(e) => {
            error!(command = %command, error = %e, output = %transcript, "Lost encoder stderr");
            return Err(io_failure(command, transcript, e));
        }
    };
    transcript.push_str(&line);
    transcript.push('\n');

    let report = parser.parse_line(&line);
    if report.fatal == Some(FatalCondition::UnsupportedCodec) {
        error!(command = %command, output = %transcript, "Failed encoding");
        return Err(EncodeError::CodecUnsupported {
            line,
            command: command.to_string(),
            transcript: std::mem::take(transcript),
        });
    }

    if let Some(frame) = report.frame {
        let progress = progress_fraction(frame, total_frames);
        debug!(frame, progress, "Encoding progress");
        emit(on_progress, progress);
    }
    Ok(())
}

fn io_failure(command: &str, transcript: &str, source: io::Error) -> EncodeError {
    EncodeError::Io {
        command: command.to_string(),
        transcript: transcript.to_string(),
        source,
    }
}

fn emit<F>(on_progress: &mut F, progress: f64)
where
    F: FnMut(f64) -> anyhow::Result<()>,
{
    if let Err(e) = on_progress(progress) {
        warn!(progress, error = %e, "Progress observer failed");
    }
}

fn timed_out(
    process: &mut SupervisedChild,
    after: Duration,
    command: String,
    transcript: String,
) -> EncodeError {
    process.kill();
    error!(command = %command, timeout_s = after.as_secs_f64(), output = %transcript, "Encoder timed out");
    EncodeError::TimedOut {
        after,
        command,
        transcript,
    }
}

#[cfg(unix)]
fn was_terminated(status: &ExitStatus, transcript: &str) -> bool {
    use std::os::unix::process::ExitStatusExt;

    if status.signal().is_some() {
        return true;
    }

    // ffmpeg catches SIGINT/SIGTERM and exits with
    // "Exiting normally, received signal N."
    transcript.contains("received signal")
}

#[cfg(not(unix))]
fn was_terminated(_status: &ExitStatus, transcript: &str) -> bool {
    transcript.contains("received signal")
}

fn pump_diagnostics<R: Read>(stream: R, tx: Sender<DiagnosticEvent>) {
    for chunk in DiagnosticLines::new(BufReader::new(stream)) {
        let (event, stop) = match chunk {
            Ok(bytes) => (DiagnosticEvent::Line(decode_line(&bytes)), false),
            Err(e) => (DiagnosticEvent::ReadFailed(e), true),
        };
        if tx.send(event).is_err() || stop {
            break;
        }
    }
}

/// Owns the encoder process and its stderr reader for one run.
struct SupervisedChild {
    child: Child,
    pid_registry: Option<PidRegistry>,
    reader: Option<JoinHandle<()>>,
    reaped: bool,
}

impl SupervisedChild {
    fn new(child: Child, pid_registry: Option<PidRegistry>) -> Self {
        if let Some(registry) = &pid_registry {
            if let Ok(mut pids) = registry.lock() {
                pids.insert(child.id());
            }
        }
        Self {
            child,
            pid_registry,
            reader: None,
            reaped: false,
        }
    }

    fn pump_stderr(&mut self) -> io::Result<Receiver<DiagnosticEvent>> {
        let stderr = self
            .child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("encoder stderr was not captured"))?;
        let (tx, rx) = mpsc::channel();
        self.reader = Some(thread::spawn(move || pump_diagnostics(stderr, tx)));
        Ok(rx)
    }

    /// Wait for exit; `None` means the deadline passed first.
    fn wait(&mut self, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
        let Some(deadline) = deadline else {
            let status = self.child.wait()?;
            self.reaped = true;
            return Ok(Some(status));
        };

        loop {
            if let Some(status) = self.child.try_wait()? {
                self.reaped = true;
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn kill(&mut self) {
        if self.reaped {
            return;
        }
        // Fails harmlessly if the process already exited; wait still reaps it
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

/// Joining the reader waits until every holder of the stderr pipe closes it.
/// A grandchild that inherited stderr from the encoder therefore delays the
/// drop until it exits too.
impl Drop for SupervisedChild {
    fn drop(&mut self) {
        self.kill();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        if let Some(registry) = &self.pid_registry {
            if let Ok(mut pids) = registry.lock() {
                pids.remove(&self.child.id());
            }
        }
    }
}
