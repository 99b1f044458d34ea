//! # sessiontally-logging
//!
//! Logging for sessiontally runs.
//!
//! ## Key Types
//!
//! - [`Logger`] - Renders run progress events to the console and an optional file
//! - [`RunEvent`] - Run progress event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//!
//! Diagnostics from the library crates go through `tracing`; call
//! [`init_tracing`] once at startup to install a subscriber.

mod events;

pub use events::{LogFormat, Logger, RunEvent};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber for library diagnostics, written to stderr.
/// `RUST_LOG` overrides `level` when set.
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }
}
