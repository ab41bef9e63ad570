//! Fetching a driver package and pulling its driver description file out.
//!
//! Zip packages are read in-process. Anything else is treated as a cabinet
//! and handed to the configured extraction tool.

pub mod cabinet;
pub mod zip;

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::config::DriverFetchConfig;
use crate::hwid::HardwareId;
use crate::pipeline::StageFailure;
use crate::tool::ToolRunner;
use crate::transport::Transport;

const ZIP_LOCAL_HEADER: &[u8; 4] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8; 4] = b"PK\x05\x06";
const FALLBACK_ARCHIVE_NAME: &str = "package.bin";

/// Container family of a fetched package.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Cabinet,
}

/// A package downloaded into the staging directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedArchive {
    pub path: PathBuf,
    pub kind: ArchiveKind,
}

/// Path of an extracted driver description file.
///
/// Only constructed for files that opened for reading, so the installer never
/// sees a descriptor that does not exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverPackageDescriptor {
    path: PathBuf,
}

impl DriverPackageDescriptor {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = File::open(&path)?.metadata()?;
        if !metadata.is_file() {
            return Err(io::Error::other(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Classify by container signature, falling back to the `.zip` extension.
pub fn classify(path: &Path) -> io::Result<ArchiveKind> {
    let mut signature = [0u8; 4];
    let mut file = File::open(path)?;
    let read = file.read(&mut signature)?;
    let signature = &signature[..read];

    if signature == ZIP_LOCAL_HEADER || signature == ZIP_EMPTY_ARCHIVE {
        return Ok(ArchiveKind::Zip);
    }

    let zip_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    Ok(if zip_extension {
        ArchiveKind::Zip
    } else {
        ArchiveKind::Cabinet
    })
}

/// Local file name for a download: the URI's last non-empty path segment.
pub fn archive_file_name(location: &Url) -> String {
    location
        .path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
        .filter(|segment| *segment != "." && *segment != "..")
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_ARCHIVE_NAME.to_string())
}

/// Case-insensitive ASCII suffix test that never splits a UTF-8 sequence.
pub(crate) fn has_suffix_ignore_case(name: &str, suffix: &str) -> bool {
    let name = name.as_bytes();
    let suffix = suffix.as_bytes();
    name.len() >= suffix.len() && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Empty the extraction directory so stale files cannot be mistaken for the
/// current package's descriptor.
pub(crate) fn reset_directory(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    fs::create_dir_all(dir)
}

/// Download and extraction, one package at a time.
pub struct ArchiveStage<'a> {
    config: &'a DriverFetchConfig,
    transport: &'a dyn Transport,
    tools: &'a dyn ToolRunner,
}

impl<'a> ArchiveStage<'a> {
    pub fn new(
        config: &'a DriverFetchConfig,
        transport: &'a dyn Transport,
        tools: &'a dyn ToolRunner,
    ) -> Self {
        Self {
            config,
            transport,
            tools,
        }
    }

    /// Fetch `location` and extract the driver description file from it.
    pub fn fetch_and_extract(
        &self,
        location: &Url,
        hardware_id: &HardwareId,
    ) -> Result<DriverPackageDescriptor, StageFailure> {
        let archive = self.fetch(location)?;
        self.extract(&archive, hardware_id)
    }

    /// Download into the package directory, named after the URI's last segment.
    pub fn fetch(&self, location: &Url) -> Result<FetchedArchive, StageFailure> {
        let path = self
            .config
            .package_directory()
            .join(archive_file_name(location));

        self.transport
            .fetch_to_file(location, &path)
            .map_err(|err| StageFailure::fetch(err.to_string()))?;
        if !path.is_file() {
            return Err(StageFailure::fetch(format!(
                "{} missing after download",
                path.display()
            )));
        }

        let kind = classify(&path).map_err(|err| StageFailure::fetch(err.to_string()))?;
        debug!(path = %path.display(), ?kind, "package fetched");
        Ok(FetchedArchive { path, kind })
    }

    /// Extract the descriptor from a fetched package.
    pub fn extract(
        &self,
        archive: &FetchedArchive,
        hardware_id: &HardwareId,
    ) -> Result<DriverPackageDescriptor, StageFailure> {
        let output_dir = self.config.extract_directory();
        reset_directory(&output_dir).map_err(|err| {
            StageFailure::extract(format!("cannot prepare {}: {err}", output_dir.display()))
        })?;

        let extracted = match archive.kind {
            ArchiveKind::Zip => {
                zip::extract_descriptor(&archive.path, &self.config.descriptor_suffix, &output_dir)
            }
            ArchiveKind::Cabinet => cabinet::extract_descriptor(
                &archive.path,
                hardware_id,
                &output_dir,
                self.config,
                self.tools,
            ),
        }
        .map_err(|err| StageFailure::extract(err.to_string()))?;

        DriverPackageDescriptor::open(&extracted).map_err(|err| {
            StageFailure::extract(format!(
                "descriptor {} unreadable: {err}",
                extracted.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::DriverFetchError;
    use crate::pipeline::PipelineOutcome;
    use crate::tool::ToolExit;

    /// Reports success for every fetch, writing `body` only when present.
    struct StubTransport {
        body: Option<Vec<u8>>,
    }

    impl Transport for StubTransport {
        fn fetch_to_file(&self, _uri: &Url, dest: &Path) -> Result<(), DriverFetchError> {
            if let Some(body) = &self.body {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(dest, body)?;
            }
            Ok(())
        }
    }

    struct NoTools;

    impl ToolRunner for NoTools {
        fn run(&self, program: &str, _args: &[String]) -> Result<ToolExit, DriverFetchError> {
            panic!("unexpected tool run: {program}");
        }
    }

    fn zip_with_inf() -> Vec<u8> {
        let mut writer = ::zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        writer
            .start_file("net.inf", ::zip::write::SimpleFileOptions::default())
            .expect("start member");
        writer.write_all(b"[Version]\n").expect("write member");
        writer.finish().expect("finish zip").into_inner()
    }

    fn staging_config(temp: &tempfile::TempDir) -> DriverFetchConfig {
        DriverFetchConfig {
            staging_directory: temp.path().to_path_buf(),
            ..DriverFetchConfig::default()
        }
    }

    #[test]
    fn fetch_without_destination_file_is_fetch_failure() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let config = staging_config(&temp);
        let transport = StubTransport { body: None };
        let stage = ArchiveStage::new(&config, &transport, &NoTools);

        let location = Url::parse("https://dl.example.com/a.zip").expect("uri");
        let failure = stage
            .fetch_and_extract(&location, &HardwareId::new("PCI\\VEN_1"))
            .expect_err("nothing was written");

        assert_eq!(failure.outcome, PipelineOutcome::FetchFailed);
        assert!(failure.detail.contains("missing after download"));
    }

    #[test]
    fn packages_named_like_staging_artifacts_do_not_collide() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let config = staging_config(&temp);
        let transport = StubTransport {
            body: Some(zip_with_inf()),
        };
        let stage = ArchiveStage::new(&config, &transport, &NoTools);

        for name in ["extracted", "search.html", "driverpage.html", "manifest.txt"] {
            let location = Url::parse(&format!("https://dl.example.com/{name}")).expect("uri");
            let descriptor = stage
                .fetch_and_extract(&location, &HardwareId::new("PCI\\VEN_1"))
                .expect("fetch and extract");
            assert_eq!(descriptor.path(), config.extract_directory().join("net.inf"));
            assert!(config.package_directory().join(name).is_file());
        }
    }

    #[test]
    fn classify_prefers_signature_over_extension() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let disguised = temp.path().join("driver.cab");
        fs::write(&disguised, b"PK\x03\x04rest").expect("write");
        assert_eq!(classify(&disguised).expect("classify"), ArchiveKind::Zip);

        let cab = temp.path().join("driver.cab");
        fs::write(&cab, b"MSCF\0\0\0\0").expect("write");
        assert_eq!(classify(&cab).expect("classify"), ArchiveKind::Cabinet);

        let named_zip = temp.path().join("DRIVER.ZIP");
        fs::write(&named_zip, b"").expect("write");
        assert_eq!(classify(&named_zip).expect("classify"), ArchiveKind::Zip);
    }

    #[test]
    fn archive_name_is_last_path_segment() {
        let uri = Url::parse("https://dl.example.com/files/usb/ven2.zip?mirror=3").expect("uri");
        assert_eq!(archive_file_name(&uri), "ven2.zip");

        let trailing = Url::parse("https://dl.example.com/files/pkg/").expect("uri");
        assert_eq!(archive_file_name(&trailing), "pkg");

        let bare = Url::parse("https://dl.example.com/").expect("uri");
        assert_eq!(archive_file_name(&bare), FALLBACK_ARCHIVE_NAME);
    }

    #[test]
    fn suffix_match_is_case_insensitive() {
        assert!(has_suffix_ignore_case("drivers/NET.INF", ".inf"));
        assert!(!has_suffix_ignore_case("readme.txt", ".inf"));
        assert!(!has_suffix_ignore_case("ü", ".inf"));
    }

    #[test]
    fn descriptor_requires_existing_file() {
        let temp = tempfile::tempdir().expect("create temp dir");
        assert!(DriverPackageDescriptor::open(temp.path().join("missing.inf")).is_err());
        assert!(DriverPackageDescriptor::open(temp.path()).is_err());

        let inf = temp.path().join("net.inf");
        fs::write(&inf, "[Version]\n").expect("write");
        let descriptor = DriverPackageDescriptor::open(&inf).expect("open");
        assert_eq!(descriptor.path(), inf.as_path());
    }

    #[test]
    fn reset_directory_removes_stale_files() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dir = temp.path().join("extracted");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("old.inf"), "stale").expect("write");

        reset_directory(&dir).expect("reset");
        assert!(dir.is_dir());
        assert!(!dir.join("old.inf").exists());
    }
}
