// ABOUTME: The metadata resolver: turns one Document into one MetadataRecord.
// ABOUTME: Runs the generic fallback chains, derives the domain, then the site-specific pass.

//! Metadata resolution.
//!
//! Resolution is pure and synchronous. The caller owns acquisition and error
//! classification; by the time [`resolve`] runs the page has been fetched.

pub mod chains;

use chrono::Utc;
use url::Url;

use crate::dom::Document;
use crate::extractors::custom::SiteRegistry;
use crate::result::{MetadataRecord, RecordStatus};
use chains::{first_present, DESCRIPTION_CHAIN, IMAGE_CHAIN, TITLE_CHAIN, URL_CHAIN};

/// Hostname of `url` without a leading `www.` label. `None` if `url` does not parse or has no host.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Resolves the preview record of `doc`, fetched from `original_url`.
pub fn resolve(doc: &Document, original_url: &str, registry: &SiteRegistry) -> MetadataRecord {
    let url = first_present(doc, URL_CHAIN).unwrap_or_else(|| original_url.to_string());
    let domain = domain_of(&url);

    let product_info = Url::parse(original_url)
        .ok()
        .and_then(|parsed| registry.extract(doc, &parsed));

    MetadataRecord {
        domain,
        title: first_present(doc, TITLE_CHAIN),
        description: first_present(doc, DESCRIPTION_CHAIN),
        image: first_present(doc, IMAGE_CHAIN),
        product_info,
        status: RecordStatus::Ok,
        timestamp: Utc::now(),
        error: None,
        url,
    }
}
