//! Run report types for summarising a batch.
//!
//! Mirrors the per-device progress lines in a structured form that can be
//! printed as text or serialised to JSON.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::hwid::HardwareId;

use super::PipelineOutcome;

/// Process exit code when at least one hardware identifier was found.
pub const EXIT_SUCCESS: u8 = 0;
/// Process exit code when device enumeration produced nothing.
pub const EXIT_FAILURE: u8 = 1;

/// Result of running the pipeline for one identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceReport {
    pub hardware_id: HardwareId,
    pub outcome: PipelineOutcome,
    /// Why the pipeline stopped, for anything but `Installed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<PathBuf>,
}

impl DeviceReport {
    pub fn new(hardware_id: HardwareId, outcome: PipelineOutcome) -> Self {
        Self {
            hardware_id,
            outcome,
            detail: None,
            download_uri: None,
            descriptor: None,
        }
    }
}

/// Outcome of a whole run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    /// Why no identifiers were found, if enumeration failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enumeration_error: Option<String>,
    pub devices: Vec<DeviceReport>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, device: DeviceReport) {
        self.devices.push(device);
    }

    /// Number of devices that ended with `outcome`.
    pub fn count(&self, outcome: PipelineOutcome) -> usize {
        self.devices
            .iter()
            .filter(|device| device.outcome == outcome)
            .count()
    }

    /// Exit status of the run.
    ///
    /// Success only means devices were found; individual install failures do
    /// not change it.
    pub fn exit_code(&self) -> u8 {
        if self.devices.is_empty() {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.enumeration_error {
            writeln!(f, "Device enumeration failed: {}", err)?;
        }
        if self.devices.is_empty() {
            return writeln!(f, "No hardware identifiers found.");
        }

        writeln!(f, "Summary: {} device(s)", self.devices.len())?;
        for outcome in PipelineOutcome::ALL {
            let count = self.count(outcome);
            if count > 0 {
                writeln!(f, "  {}: {}", outcome, count)?;
            }
        }

        writeln!(f)?;
        for device in &self.devices {
            match &device.detail {
                Some(detail) => writeln!(
                    f,
                    "  [{}] {} ({})",
                    device.outcome, device.hardware_id, detail
                )?,
                None => writeln!(f, "  [{}] {}", device.outcome, device.hardware_id)?,
            }
        }

        Ok(())
    }
}
