use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::config::{parse_uri, DriverFetchConfig};
use crate::error::DriverFetchError;
use crate::hwid::HardwareId;
use crate::pipeline::StageFailure;
use crate::transport::Transport;

use super::{CatalogEntry, Resolver};

/// Catalog-relative link from a search result to a product page.
pub const PRODUCT_LINK_PATTERN: &str = r#"href="(/\?file_cid=[^"]+)""#;
/// Client-side redirect on a product page pointing at the package.
pub const REDIRECT_PATTERN: &str = r#"location\.href\s*=\s*"([^"]+)""#;

const SEARCH_PAGE_FILE: &str = "search.html";
const PRODUCT_PAGE_FILE: &str = "driverpage.html";

/// Resolves identifiers by scraping the catalog's search and product pages.
pub struct LiveCatalogResolver {
    base: Url,
    query_param: String,
    search_page: PathBuf,
    product_page: PathBuf,
    product_link: Regex,
    redirect: Regex,
}

impl LiveCatalogResolver {
    pub fn new(config: &DriverFetchConfig) -> Result<Self, DriverFetchError> {
        let product_link =
            Regex::new(PRODUCT_LINK_PATTERN).map_err(|source| DriverFetchError::Pattern {
                pattern: PRODUCT_LINK_PATTERN,
                source,
            })?;
        let redirect = Regex::new(REDIRECT_PATTERN).map_err(|source| DriverFetchError::Pattern {
            pattern: REDIRECT_PATTERN,
            source,
        })?;

        Ok(Self {
            base: parse_uri(&config.catalog_base_uri)?,
            query_param: config.search_query_param.clone(),
            search_page: config.staging_directory.join(SEARCH_PAGE_FILE),
            product_page: config.staging_directory.join(PRODUCT_PAGE_FILE),
            product_link,
            redirect,
        })
    }

    /// Search URI for an identifier; the identifier is percent-encoded.
    pub fn search_uri(&self, hardware_id: &HardwareId) -> Url {
        let mut uri = self.base.clone();
        uri.query_pairs_mut()
            .append_pair(&self.query_param, hardware_id.as_str());
        uri
    }

    /// First product page reference in a search results document.
    pub fn find_product_link<'h>(&self, html: &'h str) -> Option<&'h str> {
        self.product_link
            .captures(html)
            .and_then(|captures| captures.get(1))
            .map(|link| link.as_str())
    }

    /// Redirect target assigned on a product page.
    pub fn find_redirect_target<'h>(&self, html: &'h str) -> Option<&'h str> {
        self.redirect
            .captures(html)
            .and_then(|captures| captures.get(1))
            .map(|target| target.as_str())
    }
}

impl Resolver for LiveCatalogResolver {
    fn resolve(
        &mut self,
        hardware_id: &HardwareId,
        transport: &dyn Transport,
    ) -> Result<CatalogEntry, StageFailure> {
        let search_uri = self.search_uri(hardware_id);
        debug!(hardware_id = %hardware_id, uri = %search_uri, "searching catalog");

        let search = fetch_document(transport, &search_uri, &self.search_page)
            .map_err(|err| StageFailure::resolution(format!("search page: {err}")))?;
        let link = self
            .find_product_link(&search)
            .ok_or_else(|| StageFailure::not_found("no catalog entry"))?;
        let product_page = self.base.join(link).map_err(|err| {
            StageFailure::resolution(format!("bad product link '{link}': {err}"))
        })?;

        let page = fetch_document(transport, &product_page, &self.product_page)
            .map_err(|err| StageFailure::resolution(format!("product page: {err}")))?;
        let target = self
            .find_redirect_target(&page)
            .ok_or_else(|| StageFailure::resolution("no download link on product page"))?;
        let download_uri = product_page.join(target).map_err(|err| {
            StageFailure::resolution(format!("bad download link '{target}': {err}"))
        })?;

        Ok(CatalogEntry {
            hardware_id: hardware_id.clone(),
            download_uri,
            product_page: Some(product_page),
        })
    }
}

fn fetch_document(
    transport: &dyn Transport,
    uri: &Url,
    dest: &Path,
) -> Result<String, DriverFetchError> {
    transport.fetch_to_file(uri, dest)?;
    let bytes = fs::read(dest)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(feature = "fuzzing")]
/// Fuzzing entry point for search and product page scraping.
pub fn fuzz_scrape_catalog_html(html: &str) -> Result<(), DriverFetchError> {
    let resolver = LiveCatalogResolver::new(&DriverFetchConfig::default())?;
    if let Some(link) = resolver.find_product_link(html) {
        let _ = resolver.base.join(link);
    }
    let _ = resolver.find_redirect_target(html);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::pipeline::PipelineOutcome;

    /// Serves canned documents keyed by URI and records each request.
    #[derive(Default)]
    struct CannedTransport {
        pages: HashMap<String, String>,
        requests: RefCell<Vec<String>>,
    }

    impl CannedTransport {
        fn with(mut self, uri: &str, body: &str) -> Self {
            self.pages.insert(uri.to_string(), body.to_string());
            self
        }
    }

    impl Transport for CannedTransport {
        fn fetch_to_file(&self, uri: &Url, dest: &Path) -> Result<(), DriverFetchError> {
            self.requests.borrow_mut().push(uri.to_string());
            let body = self
                .pages
                .get(uri.as_str())
                .ok_or_else(|| DriverFetchError::Transport {
                    uri: uri.to_string(),
                    message: "404".to_string(),
                })?;
            fs::write(dest, body)?;
            Ok(())
        }
    }

    fn resolver(staging: &Path) -> LiveCatalogResolver {
        let config = DriverFetchConfig {
            staging_directory: staging.to_path_buf(),
            ..DriverFetchConfig::default()
        };
        LiveCatalogResolver::new(&config).expect("resolver")
    }

    #[test]
    fn search_uri_percent_encodes_identifier() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let uri = resolver(temp.path()).search_uri(&HardwareId::new("PCI\\VEN_8086&DEV_1237"));
        assert_eq!(
            uri.as_str(),
            "https://driverscollection.com/?H=PCI%5CVEN_8086%26DEV_1237"
        );
    }

    #[test]
    fn product_link_takes_first_match() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let html = r#"<a href="/about">x</a><a href="/?file_cid=11">a</a><a href="/?file_cid=22">b</a>"#;
        assert_eq!(
            resolver(temp.path()).find_product_link(html),
            Some("/?file_cid=11")
        );
    }

    #[test]
    fn redirect_allows_whitespace_around_assignment() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let html = "<script>window.location.href  =\t\"https://dl.example.com/a.zip\";</script>";
        assert_eq!(
            resolver(temp.path()).find_redirect_target(html),
            Some("https://dl.example.com/a.zip")
        );
    }

    #[test]
    fn resolves_through_product_page() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let transport = CannedTransport::default()
            .with(
                "https://driverscollection.com/?H=USB%5CVEN_2",
                r#"<a href="/?file_cid=42">USB driver</a>"#,
            )
            .with(
                "https://driverscollection.com/?file_cid=42",
                r#"location.href = "https://files.example.com/usb/ven2.zip""#,
            );

        let entry = resolver(temp.path())
            .resolve(&HardwareId::new("USB\\VEN_2"), &transport)
            .expect("resolve");
        assert_eq!(
            entry.download_uri.as_str(),
            "https://files.example.com/usb/ven2.zip"
        );
        assert_eq!(
            entry.product_page.as_ref().map(Url::as_str),
            Some("https://driverscollection.com/?file_cid=42")
        );
        assert!(temp.path().join("search.html").is_file());
        assert!(temp.path().join("driverpage.html").is_file());
    }

    #[test]
    fn missing_product_link_is_not_found() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let transport = CannedTransport::default().with(
            "https://driverscollection.com/?H=ACPI%5CPNP0000",
            "<p>No results</p>",
        );

        let failure = resolver(temp.path())
            .resolve(&HardwareId::new("ACPI\\PNP0000"), &transport)
            .expect_err("no entry");
        assert_eq!(failure.outcome, PipelineOutcome::NotFound);
        assert_eq!(transport.requests.borrow().len(), 1);
    }

    #[test]
    fn transport_failure_is_resolution_failure() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let failure = resolver(temp.path())
            .resolve(&HardwareId::new("PCI\\VEN_1"), &CannedTransport::default())
            .expect_err("offline");
        assert_eq!(failure.outcome, PipelineOutcome::ResolutionFailed);
    }

    #[test]
    fn missing_redirect_is_resolution_failure() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let transport = CannedTransport::default()
            .with(
                "https://driverscollection.com/?H=PCI%5CVEN_1",
                r#"<a href="/?file_cid=7">x</a>"#,
            )
            .with("https://driverscollection.com/?file_cid=7", "<p>gone</p>");

        let failure = resolver(temp.path())
            .resolve(&HardwareId::new("PCI\\VEN_1"), &transport)
            .expect_err("no redirect");
        assert_eq!(failure.outcome, PipelineOutcome::ResolutionFailed);
    }
}
