//! Batch orchestration: resolve, fetch, extract and install per identifier.
//!
//! Identifiers are processed one at a time. A stage failure stops the
//! pipeline for that identifier only; the batch always moves on to the next
//! one and nothing is retried.

pub mod outcome;
pub mod report;

use std::fmt;
use std::io::Write;

use tracing::{info, warn};

use crate::archive::ArchiveStage;
use crate::catalog::Resolver;
use crate::config::DriverFetchConfig;
use crate::hwid::{build_hardware_id_set, DeviceTreeProvider, HardwareId, HardwareIdSet};
use crate::install::Installer;
use crate::tool::ToolRunner;
use crate::transport::Transport;

pub use outcome::{PipelineOutcome, StageFailure};
pub use report::{DeviceReport, RunReport, EXIT_FAILURE, EXIT_SUCCESS};

macro_rules! progress {
    ($out:expr, $($arg:tt)*) => {
        write_progress($out, format_args!($($arg)*))
    };
}

/// Progress output is best effort: a closed stdout must not stop installs.
fn write_progress(out: &mut dyn Write, line: fmt::Arguments<'_>) {
    if let Err(err) = out.write_fmt(line).and_then(|()| out.write_all(b"\n")) {
        tracing::debug!(error = %err, "progress output failed");
    }
}

/// The per-identifier acquisition pipeline.
pub struct DriverPipeline<'a> {
    resolver: Box<dyn Resolver + 'a>,
    transport: &'a dyn Transport,
    archives: ArchiveStage<'a>,
    installer: Installer<'a>,
}

impl<'a> DriverPipeline<'a> {
    pub fn new(
        config: &'a DriverFetchConfig,
        resolver: Box<dyn Resolver + 'a>,
        transport: &'a dyn Transport,
        tools: &'a dyn ToolRunner,
    ) -> Self {
        Self {
            resolver,
            transport,
            archives: ArchiveStage::new(config, transport, tools),
            installer: Installer::new(config, tools),
        }
    }

    /// Drive one identifier as far as it goes.
    pub fn process(&mut self, hardware_id: &HardwareId, out: &mut dyn Write) -> DeviceReport {
        let mut report = DeviceReport::new(hardware_id.clone(), PipelineOutcome::Installed);

        match self.drive(hardware_id, &mut report, out) {
            Ok(()) => progress!(out, "    [+] Driver installed."),
            Err(failure) => {
                progress!(out, "    [!] {}", failure);
                report.outcome = failure.outcome;
                report.detail = Some(failure.detail);
            }
        }

        info!(hardware_id = %hardware_id, outcome = %report.outcome, "device processed");
        report
    }

    fn drive(
        &mut self,
        hardware_id: &HardwareId,
        report: &mut DeviceReport,
        out: &mut dyn Write,
    ) -> Result<(), StageFailure> {
        let entry = self.resolver.resolve(hardware_id, self.transport)?;
        if let Some(page) = &entry.product_page {
            progress!(out, "    Driver page: {}", page);
        }
        progress!(out, "    Download: {}", entry.download_uri);
        report.download_uri = Some(entry.download_uri.to_string());

        let descriptor = self
            .archives
            .fetch_and_extract(&entry.download_uri, hardware_id)?;
        progress!(out, "    Descriptor: {}", descriptor.path().display());
        report.descriptor = Some(descriptor.path().to_path_buf());

        self.installer.install(&descriptor)
    }

    /// Process every identifier in the set, regardless of earlier outcomes.
    pub fn run_batch(&mut self, hardware_ids: &HardwareIdSet, out: &mut dyn Write) -> RunReport {
        let mut report = RunReport::new();
        for hardware_id in hardware_ids {
            progress!(out, "");
            progress!(out, "Device: {}", hardware_id);
            report.add(self.process(hardware_id, out));
        }
        report
    }
}

/// Enumerate devices from `provider` and run the pipeline over all of them.
///
/// The returned report's [`RunReport::exit_code`] is a failure only when no
/// identifiers were found.
pub fn run<P>(provider: &P, pipeline: &mut DriverPipeline<'_>, out: &mut dyn Write) -> RunReport
where
    P: DeviceTreeProvider + ?Sized,
{
    let hardware_ids = match build_hardware_id_set(provider) {
        Ok(ids) => ids,
        Err(err) => {
            warn!(error = %err, "device enumeration failed");
            progress!(out, "Device enumeration failed: {}", err);
            return RunReport {
                enumeration_error: Some(err.to_string()),
                devices: Vec::new(),
            };
        }
    };

    if hardware_ids.is_empty() {
        progress!(out, "No hardware identifiers found.");
        return RunReport::new();
    }

    progress!(out, "Found {} hardware identifier(s).", hardware_ids.len());
    pipeline.run_batch(&hardware_ids, out)
}
