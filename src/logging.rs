//! Logging initialization and configuration.
//!
//! Logs go to stderr so an interactive shell on stdout stays clean.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor a level is supplied.
pub const DEFAULT_FILTER: &str = "netdeck=info";

fn filter_for(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) if level.contains('=') => EnvFilter::new(level),
        Some(level) => EnvFilter::new(format!("netdeck={level}")),
        None => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
    }
}

/// Initialize the logging system.
///
/// A bare level such as `debug` applies to this crate only; a full
/// directive list (`netdeck=debug,ssh2=warn`) is used as given. Without a
/// level, `RUST_LOG` is consulted.
///
/// # Panics
///
/// Panics if called more than once, or if another tracing subscriber
/// has already been set.
pub fn init(level: Option<&str>) {
    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Err` if logging has already been initialized.
pub fn try_init(level: Option<&str>) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
}
