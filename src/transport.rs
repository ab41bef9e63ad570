//! Blocking download of a URI to a local file.
//!
//! No resume, no retry, no custom headers: one attempt per call, and the
//! caller decides what a failure means for the current device.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::DriverFetchError;

/// Fetch primitive used by the resolvers and the archive stage.
pub trait Transport {
    /// Download `uri` into `dest`, replacing any existing file.
    ///
    /// Succeeds only if `dest` exists afterwards.
    fn fetch_to_file(&self, uri: &Url, dest: &Path) -> Result<(), DriverFetchError>;
}

/// HTTP(S) transport backed by a `ureq` agent.
///
/// `file://` URIs are served by copying, which lets manifests and packages be
/// mirrored on local or network storage.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Build a transport; `timeout` of `None` blocks until the server answers.
    pub fn new(timeout: Option<Duration>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for HttpTransport {
    fn fetch_to_file(&self, uri: &Url, dest: &Path) -> Result<(), DriverFetchError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        match uri.scheme() {
            "http" | "https" => {
                let mut response = self
                    .agent
                    .get(uri.as_str())
                    .call()
                    .map_err(|source| transport_error(uri, source))?;
                let mut file = File::create(dest)?;
                io::copy(&mut response.body_mut().as_reader(), &mut file)
                    .map_err(|source| transport_error(uri, source))?;
            }
            "file" => {
                let source = uri
                    .to_file_path()
                    .map_err(|()| transport_error(uri, "not a local file path"))?;
                fs::copy(&source, dest).map_err(|err| transport_error(uri, err))?;
            }
            other => {
                return Err(transport_error(
                    uri,
                    format!("unsupported scheme '{other}'"),
                ));
            }
        }

        if !dest.is_file() {
            return Err(transport_error(uri, "destination file missing after download"));
        }

        debug!(uri = %uri, path = %dest.display(), "fetched");
        Ok(())
    }
}

fn transport_error(uri: &Url, message: impl ToString) -> DriverFetchError {
    DriverFetchError::Transport {
        uri: uri.to_string(),
        message: message.to_string(),
    }
}
