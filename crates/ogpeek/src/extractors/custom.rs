// ABOUTME: Site-specific extractors and the registry that maps URL patterns to them.
// ABOUTME: CatalogExtractor derives a product id from the URL path and a price from the DOM.

//! Site-specific extraction.
//!
//! Generic resolution never knows about individual sites. Instead a
//! [`SiteRegistry`] holds [`SiteExtractor`]s, each owning a URL predicate, and
//! the resolver asks the registry for product data after the fallback chains
//! have run. Adding a marketplace means registering another extractor.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::dom::Document;
use crate::result::ProductInfo;

/// A domain-specific extraction pass keyed by a URL predicate.
pub trait SiteExtractor: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns the URL-derived product data when `url` belongs to this site, `None` otherwise.
    ///
    /// Must not depend on the page: it also runs for URLs whose fetch failed.
    fn identify(&self, url: &Url) -> Option<ProductInfo>;

    /// Fills in page-derived data. Missing elements leave fields absent.
    fn enrich(&self, doc: &Document, info: &mut ProductInfo);
}

/// Product-detail pages recognized by host and path prefix, e.g. `https://www.amazon.co.jp/dp/<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CatalogExtractor {
    pub name: String,
    /// Primary host, compared case-insensitively.
    pub host: String,
    /// Additional hosts serving the same catalog
    #[serde(default)]
    pub supported_hosts: Vec<String>,
    /// Path prefix preceding the item id, including both slashes
    pub path_prefix: String,
    /// Class name of the element holding the whole-number part of the price
    #[serde(default)]
    pub price_class: Option<String>,
}

impl CatalogExtractor {
    fn matches_host(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        std::iter::once(&self.host)
            .chain(self.supported_hosts.iter())
            .any(|h| h.eq_ignore_ascii_case(host))
    }
}

impl SiteExtractor for CatalogExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn identify(&self, url: &Url) -> Option<ProductInfo> {
        if !self.matches_host(url) {
            return None;
        }
        let rest = url.path().strip_prefix(self.path_prefix.as_str())?;
        let id = rest.split('/').next().unwrap_or_default();
        if id.is_empty() {
            return None;
        }
        Some(ProductInfo {
            id: id.to_string(),
            price: None,
        })
    }

    fn enrich(&self, doc: &Document, info: &mut ProductInfo) {
        if let Some(class) = self.price_class.as_deref() {
            info.price = doc.first_text_by_class(class);
        }
    }
}

/// Ordered collection of site extractors. The first extractor identifying a URL wins.
#[derive(Debug, Default, Clone)]
pub struct SiteRegistry {
    extractors: Vec<Arc<dyn SiteExtractor>>,
}

impl SiteRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extractor after the existing ones.
    pub fn register<E: SiteExtractor + 'static>(&mut self, extractor: E) {
        self.extractors.push(Arc::new(extractor));
    }

    /// Parses a JSON array of catalog patterns and registers each of them.
    pub fn extend_from_json(&mut self, json: &str) -> anyhow::Result<()> {
        let catalogs: Vec<CatalogExtractor> = serde_json::from_str(json)?;
        for catalog in catalogs {
            if catalog.path_prefix.is_empty() || catalog.host.is_empty() {
                anyhow::bail!("catalog pattern {:?} needs a host and a path prefix", catalog.name);
            }
            self.register(catalog);
        }
        Ok(())
    }

    fn find(&self, url: &Url) -> Option<(&dyn SiteExtractor, ProductInfo)> {
        self.extractors
            .iter()
            .find_map(|e| e.identify(url).map(|info| (e.as_ref(), info)))
    }

    /// URL-only product data, used regardless of fetch outcome.
    pub fn identify(&self, url: &Url) -> Option<ProductInfo> {
        self.find(url).map(|(_, info)| info)
    }

    /// Full product data for an acquired page.
    pub fn extract(&self, doc: &Document, url: &Url) -> Option<ProductInfo> {
        let (extractor, mut info) = self.find(url)?;
        extractor.enrich(doc, &mut info);
        tracing::debug!(
            extractor = extractor.name(),
            id = %info.id,
            price = ?info.price,
            "site extractor applied"
        );
        Some(info)
    }

    /// Returns the number of registered extractors.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Returns true if no extractors are registered.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}
