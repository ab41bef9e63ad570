//! Resolving a hardware identifier to a driver package download location.
//!
//! Two strategies exist and a run uses exactly one of them:
//!
//! - [`search::LiveCatalogResolver`] queries the catalog's search page and
//!   follows the product page's client-side redirect.
//! - [`manifest::ManifestResolver`] accepts only identifiers listed in a
//!   pre-published manifest and builds the package URI directly.

pub mod manifest;
pub mod search;

use url::Url;

use crate::config::{DriverFetchConfig, ResolutionStrategy};
use crate::error::DriverFetchError;
use crate::hwid::HardwareId;
use crate::pipeline::StageFailure;
use crate::transport::Transport;

pub use manifest::{Manifest, ManifestResolver};
pub use search::LiveCatalogResolver;

/// A resolved download location for one identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub hardware_id: HardwareId,
    pub download_uri: Url,
    /// Catalog page the download was found on, when the strategy has one.
    pub product_page: Option<Url>,
}

/// Maps identifiers to catalog entries.
///
/// A missing entry is reported as a `NotFound` failure; transport and parse
/// problems as `ResolutionFailed`.
pub trait Resolver {
    fn resolve(
        &mut self,
        hardware_id: &HardwareId,
        transport: &dyn Transport,
    ) -> Result<CatalogEntry, StageFailure>;
}

/// Build the resolver selected by `config.strategy`.
pub fn resolver_for(config: &DriverFetchConfig) -> Result<Box<dyn Resolver>, DriverFetchError> {
    Ok(match config.strategy {
        ResolutionStrategy::Live => Box::new(LiveCatalogResolver::new(config)?),
        ResolutionStrategy::Manifest => Box::new(ManifestResolver::new(config)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_strategy_needs_manifest_uri() {
        let config = DriverFetchConfig {
            strategy: ResolutionStrategy::Manifest,
            ..DriverFetchConfig::default()
        };
        assert!(matches!(
            resolver_for(&config),
            Err(DriverFetchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn live_strategy_builds_from_defaults() {
        assert!(resolver_for(&DriverFetchConfig::default()).is_ok());
    }
}
