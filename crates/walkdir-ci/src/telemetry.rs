//! Log setup for the `walkdir` binary.
//!
//! Logs always go to stderr: stdout carries listed paths and JSON reports.

use std::io;

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide subscriber.
///
/// `RUST_LOG` wins over `level` when set. With `json`, each event is one
/// JSON object per line. A subscriber that is already installed is kept.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    let base = tracing_subscriber::registry().with(filter);
    let stderr_layer = fmt::layer().with_target(false).with_writer(io::stderr);

    let installed = if json {
        base.with(stderr_layer.json()).try_init()
    } else {
        base.with(stderr_layer).try_init()
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed, keeping it");
    }
}
