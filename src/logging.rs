//! Diagnostic logging setup.
//!
//! Logs go to stderr so stdout carries only the progress stream and reports.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::DriverFetchError;

/// Default filter when neither `RUST_LOG` nor `--log-level` is given.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: Option<&str>) -> Result<(), DriverFetchError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or(DEFAULT_LOG_LEVEL)));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| DriverFetchError::LoggingInit(err.to_string()))
}
