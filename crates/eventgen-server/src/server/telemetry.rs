//! Logging initialization for the event generator.
//!
//! This module sets up structured logging using the `tracing` ecosystem.
//!
//! ## Behavior
//!
//! - Pulls filtering rules from `RUST_LOG` or defaults to `info`.
//! - `pretty` output includes thread ID, file, and line number for
//!   traceability; `json` output emits one object per event for log shippers.
//! - Timestamped using local time (RFC 3339 format).
//!
//! Published payloads are logged at `debug` under the `eventgen::sink`
//! target, so `RUST_LOG=info,eventgen::sink=debug` shows every message.

use crate::server::config::LogFormat;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(fmt::time::ChronoLocal::rfc_3339())
                    .pretty(),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_thread_ids(true)
                    .with_timer(fmt::time::ChronoLocal::rfc_3339()),
            )
            .try_init()?,
    }

    Ok(())
}
