// Tracing subscriber setup

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks debug over info for
/// this crate and warn for everything else.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init()?;

    Ok(())
}

/// Subscriber for tests; repeated calls are ignored.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ffslide=debug")
        .with_test_writer()
        .try_init();
}

fn default_directive(level: Level) -> String {
    format!("warn,ffslide={}", level.as_str().to_ascii_lowercase())
}
