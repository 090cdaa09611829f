/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/telemetry.rs
 * Responsibility: tracing subscriber setup.
 */

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise logging to stderr, leaving stdout for the final answer.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` in verbose mode.
pub fn init_telemetry(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let default_filter = format!("warn,confine={}", default_level);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .ok();
}
