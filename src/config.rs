//! Run configuration: catalog locations, staging directory and external tools.
//!
//! Every field has a default so a JSON config file only needs to name what it
//! changes. Command-line flags are layered on top by the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DriverFetchError;

/// How hardware identifiers are turned into download locations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Query the catalog's search page, then follow the product page redirect.
    #[default]
    Live,
    /// Accept only identifiers listed in a manifest and build the URI directly.
    Manifest,
}

/// An external program plus argument templates.
///
/// Arguments may contain `{archive}`, `{output_dir}`, `{descriptor}`,
/// `{section}` and `{hardware_id}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
        }
    }

    /// Substitute placeholders in every argument.
    ///
    /// Each argument is scanned once, left to right; substituted values are
    /// never rescanned. Unknown `{name}` sequences are kept verbatim.
    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args.iter().map(|arg| render_arg(arg, vars)).collect()
    }
}

fn render_arg(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(var, _)| *var == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                rendered.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

/// Configuration for one driverfetch run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverFetchConfig {
    pub strategy: ResolutionStrategy,
    /// Catalog site root; searches go to this URI with one query parameter.
    pub catalog_base_uri: String,
    pub search_query_param: String,
    /// Flat list of recognised identifiers (manifest strategy).
    pub manifest_uri: Option<String>,
    /// Directory URI that packages are published under (manifest strategy).
    pub package_base_uri: Option<String>,
    pub package_suffix: String,
    /// Root for every working file: fetched pages, archives, extracted files.
    pub staging_directory: PathBuf,
    /// File name suffix of the driver description file, matched case-insensitively.
    pub descriptor_suffix: String,
    pub extractor: ToolCommand,
    pub installer: ToolCommand,
    pub install_section: String,
    pub install_success_code: i32,
    pub http_timeout_secs: Option<u64>,
}

impl Default for DriverFetchConfig {
    fn default() -> Self {
        Self {
            strategy: ResolutionStrategy::Live,
            catalog_base_uri: "https://driverscollection.com/".to_string(),
            search_query_param: "H".to_string(),
            manifest_uri: None,
            package_base_uri: None,
            package_suffix: ".zip".to_string(),
            staging_directory: default_staging_directory(),
            descriptor_suffix: ".inf".to_string(),
            extractor: ToolCommand::new("extract.exe", &["{archive}", "{output_dir}"]),
            installer: ToolCommand::new(
                "rundll32.exe",
                &["setupapi,InstallHinfSection", "{section}", "132", "{descriptor}"],
            ),
            install_section: "DefaultInstall".to_string(),
            install_success_code: 0,
            http_timeout_secs: None,
        }
    }
}

impl DriverFetchConfig {
    /// Load a config file; absent fields keep their defaults.
    pub fn read_json(path: &Path) -> Result<Self, DriverFetchError> {
        let input = std::fs::read_to_string(path)?;
        serde_json::from_str(&input).map_err(|source| DriverFetchError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject configurations that cannot drive the selected strategy.
    pub fn validate(&self) -> Result<(), DriverFetchError> {
        match self.strategy {
            ResolutionStrategy::Live => {
                parse_uri(&self.catalog_base_uri)?;
                if self.search_query_param.is_empty() {
                    return Err(DriverFetchError::InvalidConfig(
                        "search_query_param must not be empty".to_string(),
                    ));
                }
            }
            ResolutionStrategy::Manifest => {
                let manifest = self.manifest_uri.as_deref().ok_or_else(|| {
                    DriverFetchError::InvalidConfig(
                        "manifest strategy requires manifest_uri".to_string(),
                    )
                })?;
                parse_uri(manifest)?;
                let base = self.package_base_uri.as_deref().ok_or_else(|| {
                    DriverFetchError::InvalidConfig(
                        "manifest strategy requires package_base_uri".to_string(),
                    )
                })?;
                let base = parse_uri(base)?;
                if base.cannot_be_a_base() {
                    return Err(DriverFetchError::InvalidConfig(format!(
                        "package_base_uri '{base}' cannot hold path segments"
                    )));
                }
            }
        }

        if self.descriptor_suffix.is_empty() {
            return Err(DriverFetchError::InvalidConfig(
                "descriptor_suffix must not be empty".to_string(),
            ));
        }
        for (name, tool) in [("extractor", &self.extractor), ("installer", &self.installer)] {
            if tool.program.trim().is_empty() {
                return Err(DriverFetchError::InvalidConfig(format!(
                    "{name} program must not be empty"
                )));
            }
        }

        Ok(())
    }

    /// Directory archives are unpacked into.
    pub fn extract_directory(&self) -> PathBuf {
        self.staging_directory.join("extracted")
    }

    /// Directory downloaded packages are stored in, apart from the pages and
    /// manifest kept at the staging root.
    pub fn package_directory(&self) -> PathBuf {
        self.staging_directory.join("packages")
    }
}

/// `%WINDIR%\Inf` when running on a Windows install, else a temp subdirectory.
pub fn default_staging_directory() -> PathBuf {
    match std::env::var_os("WINDIR") {
        Some(windir) if !windir.is_empty() => PathBuf::from(windir).join("Inf"),
        _ => std::env::temp_dir().join("driverfetch"),
    }
}

pub(crate) fn parse_uri(input: &str) -> Result<Url, DriverFetchError> {
    Url::parse(input).map_err(|source| DriverFetchError::InvalidUri {
        uri: input.to_string(),
        source,
    })
}
