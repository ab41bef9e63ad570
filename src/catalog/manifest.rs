use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};
use url::Url;

use crate::config::{parse_uri, DriverFetchConfig};
use crate::error::DriverFetchError;
use crate::hwid::HardwareId;
use crate::pipeline::StageFailure;
use crate::transport::Transport;

use super::{CatalogEntry, Resolver};

const MANIFEST_FILE: &str = "manifest.txt";

/// The set of identifiers a package host publishes drivers for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    ids: HashSet<String>,
}

impl Manifest {
    /// One identifier per line. Surrounding whitespace is trimmed; blank
    /// lines and `#` comments are ignored.
    pub fn parse(text: &str) -> Self {
        let ids = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self { ids }
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, hardware_id: &HardwareId) -> bool {
        self.ids.contains(hardware_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolves identifiers listed in a manifest to `<base>/<id><suffix>`.
///
/// The manifest is fetched on the first lookup and kept for the rest of the
/// run. A failed fetch is kept too, so every identifier then reports the
/// same resolution failure without refetching.
pub struct ManifestResolver {
    manifest_uri: Url,
    package_base: Url,
    package_suffix: String,
    local_copy: PathBuf,
    manifest: Option<Result<Manifest, String>>,
}

impl ManifestResolver {
    pub fn new(config: &DriverFetchConfig) -> Result<Self, DriverFetchError> {
        let manifest_uri = config.manifest_uri.as_deref().ok_or_else(|| {
            DriverFetchError::InvalidConfig("manifest strategy requires manifest_uri".to_string())
        })?;
        let package_base = config.package_base_uri.as_deref().ok_or_else(|| {
            DriverFetchError::InvalidConfig(
                "manifest strategy requires package_base_uri".to_string(),
            )
        })?;
        let package_base = parse_uri(package_base)?;
        if package_base.cannot_be_a_base() {
            return Err(DriverFetchError::InvalidConfig(format!(
                "package_base_uri '{package_base}' cannot hold path segments"
            )));
        }

        Ok(Self {
            manifest_uri: parse_uri(manifest_uri)?,
            package_base,
            package_suffix: config.package_suffix.clone(),
            local_copy: config.staging_directory.join(MANIFEST_FILE),
            manifest: None,
        })
    }

    /// Use an already loaded manifest instead of fetching one.
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(Ok(manifest));
        self
    }

    /// Package location for a listed identifier.
    pub fn package_uri(&self, hardware_id: &HardwareId) -> Url {
        let mut uri = self.package_base.clone();
        if let Ok(mut segments) = uri.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&format!("{}{}", hardware_id, self.package_suffix));
        }
        uri
    }

    fn load(&self, transport: &dyn Transport) -> Result<Manifest, String> {
        transport
            .fetch_to_file(&self.manifest_uri, &self.local_copy)
            .map_err(|err| err.to_string())?;
        let bytes = fs::read(&self.local_copy).map_err(|err| err.to_string())?;
        Ok(Manifest::parse(&String::from_utf8_lossy(&bytes)))
    }
}

impl Resolver for ManifestResolver {
    fn resolve(
        &mut self,
        hardware_id: &HardwareId,
        transport: &dyn Transport,
    ) -> Result<CatalogEntry, StageFailure> {
        if self.manifest.is_none() {
            let loaded = self.load(transport);
            match &loaded {
                Ok(manifest) => info!(uri = %self.manifest_uri, ids = manifest.len(), "manifest loaded"),
                Err(err) => warn!(uri = %self.manifest_uri, error = %err, "manifest unavailable"),
            }
            self.manifest = Some(loaded);
        }

        match &self.manifest {
            Some(Ok(manifest)) if manifest.contains(hardware_id) => Ok(CatalogEntry {
                hardware_id: hardware_id.clone(),
                download_uri: self.package_uri(hardware_id),
                product_page: None,
            }),
            Some(Ok(_)) => Err(StageFailure::not_found("not listed in manifest")),
            Some(Err(err)) => Err(StageFailure::resolution(format!("manifest unavailable: {err}"))),
            None => Err(StageFailure::resolution("manifest not loaded")),
        }
    }
}
