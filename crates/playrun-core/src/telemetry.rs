//! Tracing setup for the `playrun` binary.
//!
//! Filtering comes from `PLAYRUN_LOG`, then `RUST_LOG`, and otherwise
//! applies the requested level to the playrun crates only; ansible-runner
//! plumbing from dependencies stays at `warn`. Log lines go to stderr so
//! runner output on stdout stays machine-readable.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter override checked before `RUST_LOG`
pub const LOG_ENV: &str = "PLAYRUN_LOG";

const PLAYRUN_TARGETS: &[&str] = &["playrun_core", "playrun_events", "playrun"];

/// `warn` globally, `level` for the playrun crates
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(PLAYRUN_TARGETS.iter().map(|target| format!("{}={}", target, level)))
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install the global subscriber; later calls are ignored.
pub fn init_tracing(json: bool, level: Level) {
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env_filter(level));

    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}
