//! Shell scripts standing in for ffmpeg.
//!
//! Every script sees the real argv the supervisor builds; `$last` holds the
//! output path. Long-running scripts `exec sleep` so that killing the PID
//! also closes stderr.

use std::fs;
use std::path::{Path, PathBuf};

const PRELUDE: &str = "#!/bin/sh\nfor last; do :; done\n";

/// Write an executable script named `name` into `dir` and return its path.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("{PRELUDE}{body}\n")).expect("write fake encoder");
    let mut perms = fs::metadata(&path).expect("stat fake encoder").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod fake encoder");
    path
}

/// Shell line writing `text` verbatim to stderr, terminated by `end`
/// (`\n` or `\r` as printf escapes).
pub fn stderr_line(text: &str, end: &str) -> String {
    format!("printf '%s{}' '{}' >&2\n", end, text.replace('\'', "'\\''"))
}

/// Encoder that reports the given frame counters and writes the output file.
#[cfg(unix)]
pub fn progressing_encoder(dir: &Path, frames: &[u64]) -> PathBuf {
    let mut body = stderr_line("Input #0, image2, from 'img_%d.jpg':", "\\n");
    for frame in frames {
        body.push_str(&stderr_line(
            &format!("frame={:5} fps=0.0 q=2.0 size=     256kB time=00:00:00.04", frame),
            "\\r",
        ));
    }
    body.push_str(": > \"$last\"\n");
    write_script(dir, "ffmpeg-progress", &body)
}

/// Encoder that prints `lines`, then blocks until killed.
#[cfg(unix)]
pub fn hanging_encoder(dir: &Path, lines: &[&str]) -> PathBuf {
    let mut body = String::new();
    for line in lines {
        body.push_str(&stderr_line(line, "\\n"));
    }
    body.push_str("exec sleep 30\n");
    write_script(dir, "ffmpeg-hang", &body)
}
