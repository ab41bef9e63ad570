//! Fuzz target for catalog page scraping.

#![no_main]

use driverfetch::catalog::search::fuzz_scrape_catalog_html;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let html = String::from_utf8_lossy(data);
    let _ = fuzz_scrape_catalog_html(&html);
});
