//! Diagnostics for whoever is debugging a conductor run.
//!
//! Stdout belongs to the directive: the driving script pipes it straight to
//! the external actor, so every tracing event goes to stderr and nothing is
//! written to disk. Session files are the durable record.

use std::io::{IsTerminal, stderr};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Checked before `RUST_LOG`, so conductor can be traced without turning on
/// every other crate in a larger pipeline.
pub const LOG_ENV: &str = "CONDUCTOR_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the stderr subscriber.
///
/// ```bash
/// CONDUCTOR_LOG=conductor=debug conductor next <session> research
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(filter_from(std::env::var(LOG_ENV).ok()))
        .with(
            fmt::layer()
                .with_writer(stderr)
                .with_ansi(stderr().is_terminal())
                .with_target(false)
                .compact(),
        )
        .init();
}

fn filter_from(conductor_log: Option<String>) -> EnvFilter {
    conductor_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}
