//! Driverfetch: find drivers for every attached device and install them.
//!
//! Driverfetch walks the machine's device tree, collects the hardware
//! identifiers of every device, and drives each identifier through a
//! resolve, fetch, extract and install pipeline. A failure for one device is
//! recorded and the batch moves on.
//!
//! # Modules
//!
//! - [`hwid`]: Device topology walk and hardware identifier set
//! - [`catalog`]: Identifier to download location resolution
//! - [`archive`]: Package download and driver description extraction
//! - [`install`]: OS installer invocation
//! - [`pipeline`]: Batch orchestration and run reports
//! - [`error`]: Error types for driverfetch operations

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hwid;
pub mod install;
pub mod logging;
pub mod pipeline;
pub mod tool;
pub mod transport;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::warn;

pub use config::{DriverFetchConfig, ResolutionStrategy};
pub use error::DriverFetchError;

use hwid::{DeviceTreeProvider, Topology};
use pipeline::{DriverPipeline, RunReport};
use tool::ProcessRunner;
use transport::HttpTransport;

/// The driverfetch CLI application.
///
/// Every flag is optional; with none, the host's device tree is scanned and
/// the live catalog is searched.
#[derive(Parser)]
#[command(name = "driverfetch")]
#[command(version, about)]
struct Cli {
    /// JSON config file. Flags override values from the file.
    #[arg(long, env = "DRIVERFETCH_CONFIG")]
    config: Option<PathBuf>,

    /// Resolution strategy. Defaults to 'manifest' when --manifest is given.
    #[arg(long, value_enum, env = "DRIVERFETCH_STRATEGY")]
    strategy: Option<ResolutionStrategy>,

    /// Catalog root URI searched by the live strategy.
    #[arg(long, env = "DRIVERFETCH_CATALOG")]
    catalog: Option<String>,

    /// Manifest URI listing identifiers with published packages.
    #[arg(long, env = "DRIVERFETCH_MANIFEST")]
    manifest: Option<String>,

    /// Base URI packages are published under (manifest strategy).
    #[arg(long, env = "DRIVERFETCH_PACKAGE_BASE")]
    package_base: Option<String>,

    /// Directory for downloaded pages, packages and extracted files.
    #[arg(long, env = "DRIVERFETCH_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Read the device tree from a JSON snapshot instead of the host.
    #[arg(long, conflicts_with = "sysfs_root")]
    topology: Option<PathBuf>,

    /// Root of the sysfs device hierarchy. Windows hosts walk the
    /// configuration manager unless this or --topology is given.
    #[arg(long)]
    sysfs_root: Option<PathBuf>,

    /// Only list the hardware identifiers found; resolve and install nothing.
    #[arg(long)]
    list: bool,

    /// Output format for the final report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,

    /// Log filter used when RUST_LOG is unset (e.g. 'info', 'driverfetch=debug').
    #[arg(long, env = "DRIVERFETCH_LOG")]
    log_level: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Result<Self, DriverFetchError> {
        match value {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(DriverFetchError::UnsupportedValue(format!(
                "output format '{}' (supported: text, json)",
                other
            ))),
        }
    }
}

impl Cli {
    /// Defaults, then the config file, then flags.
    fn resolve_config(&self) -> Result<DriverFetchConfig, DriverFetchError> {
        let mut config = match &self.config {
            Some(path) => DriverFetchConfig::read_json(path)?,
            None => DriverFetchConfig::default(),
        };

        if let Some(catalog) = &self.catalog {
            config.catalog_base_uri = catalog.clone();
        }
        if let Some(manifest) = &self.manifest {
            config.manifest_uri = Some(manifest.clone());
            if self.strategy.is_none() {
                config.strategy = ResolutionStrategy::Manifest;
            }
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(base) = &self.package_base {
            config.package_base_uri = Some(base.clone());
        }
        if let Some(dir) = &self.staging_dir {
            config.staging_directory = dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// The device tree to walk when it is not the Windows host tree. A sysfs
    /// tree that cannot be read yields an empty topology, which the run
    /// reports as "no root device node".
    fn load_topology(&self) -> Result<Topology, DriverFetchError> {
        if let Some(snapshot) = &self.topology {
            return Topology::read_snapshot(snapshot);
        }

        let root = self
            .sysfs_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(hwid::sysfs::DEFAULT_SYSFS_ROOT));
        match hwid::sysfs::capture(&root) {
            Ok(topology) => Ok(topology),
            Err(err) => {
                warn!(error = %err, "host device tree unavailable");
                Ok(Topology::new())
            }
        }
    }
}

/// Run the driverfetch CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<ExitCode, DriverFetchError> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref())?;

    let output = OutputFormat::parse(&cli.output)?;
    let config = cli.resolve_config()?;

    // Without an explicit tree, Windows hosts are walked live.
    #[cfg(windows)]
    {
        if cli.topology.is_none() && cli.sysfs_root.is_none() {
            return run_with(&cli, &config, output, &hwid::cfgmgr::ConfigManager);
        }
    }

    let topology = cli.load_topology()?;
    run_with(&cli, &config, output, &topology)
}

fn run_with<P>(
    cli: &Cli,
    config: &DriverFetchConfig,
    output: OutputFormat,
    provider: &P,
) -> Result<ExitCode, DriverFetchError>
where
    P: DeviceTreeProvider + ?Sized,
{
    if cli.list {
        return run_list(provider, output);
    }

    let report = run_install(config, provider, output)?;
    Ok(ExitCode::from(report.exit_code()))
}

/// Print the identifier set without touching the catalog.
fn run_list<P>(provider: &P, output: OutputFormat) -> Result<ExitCode, DriverFetchError>
where
    P: DeviceTreeProvider + ?Sized,
{
    let hardware_ids = match hwid::build_hardware_id_set(provider) {
        Ok(ids) => ids,
        Err(err) => {
            println!("Device enumeration failed: {}", err);
            return Ok(ExitCode::from(pipeline::EXIT_FAILURE));
        }
    };

    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&hardware_ids)
                .map_err(|source| DriverFetchError::ReportSerialize { source })?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for id in &hardware_ids {
                println!("{}", id);
            }
        }
    }

    Ok(ExitCode::from(if hardware_ids.is_empty() {
        pipeline::EXIT_FAILURE
    } else {
        pipeline::EXIT_SUCCESS
    }))
}

/// Execute the full acquisition pipeline.
fn run_install<P>(
    config: &DriverFetchConfig,
    provider: &P,
    output: OutputFormat,
) -> Result<RunReport, DriverFetchError>
where
    P: DeviceTreeProvider + ?Sized,
{
    ensure_staging_directory(&config.staging_directory)?;

    let transport = HttpTransport::new(config.http_timeout_secs.map(Duration::from_secs));
    let tools = ProcessRunner;
    let resolver = catalog::resolver_for(config)?;
    let mut driver_pipeline = DriverPipeline::new(config, resolver, &transport, &tools);

    let report = match output {
        OutputFormat::Text => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            writeln!(out, "=== driverfetch: driver acquisition ===")?;
            let report = pipeline::run(provider, &mut driver_pipeline, &mut out);
            if !report.devices.is_empty() {
                writeln!(out)?;
                write!(out, "{}", report)?;
                writeln!(out)?;
                writeln!(out, "All done. Please reboot to complete driver setup.")?;
            }
            report
        }
        OutputFormat::Json => {
            // Progress goes to stderr so stdout holds only the JSON document.
            let report = pipeline::run(provider, &mut driver_pipeline, &mut io::stderr());
            let json = serde_json::to_string_pretty(&report)
                .map_err(|source| DriverFetchError::ReportSerialize { source })?;
            println!("{}", json);
            report
        }
    };

    Ok(report)
}

fn ensure_staging_directory(dir: &Path) -> Result<(), DriverFetchError> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}
