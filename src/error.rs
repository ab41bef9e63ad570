use std::path::PathBuf;
use thiserror::Error;

/// The main error type for driverfetch operations.
///
/// Per-device pipeline failures are not errors at this level; they are
/// recorded as [`crate::pipeline::StageFailure`] values so one device can
/// never abort the batch.
#[derive(Debug, Error)]
pub enum DriverFetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not locate the root device node")]
    RootNotFound,

    #[error("Failed to parse topology snapshot from {path}: {source}")]
    TopologySnapshotParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read device tree under {path}: {message}")]
    DeviceTree { path: PathBuf, message: String },

    #[error("Failed to parse config from {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URI '{uri}': {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to compile pattern '{pattern}': {source}")]
    Pattern {
        pattern: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to fetch {uri}: {message}")]
    Transport { uri: String, message: String },

    #[error("Archive error in {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("Failed to launch '{program}': {source}")]
    Tool {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialise report: {source}")]
    ReportSerialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to initialise logging: {0}")]
    LoggingInit(String),

    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),
}
