// ABOUTME: Pre-compiled CSS selector cache shared by every Document query.
// ABOUTME: Fallback chains and catalog extractors reuse the same handful of selectors per batch.

//! Selector caching for repeated DOM queries.
//!
//! Every record resolves the same fallback chains, so the selector strings
//! repeat across pages. They are compiled once and cloned out of the cache.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use scraper::Selector;

static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a CSS selector, caching the result.
///
/// Returns `None` for selectors that fail to parse; the failure is cached too.
/// A poisoned lock degrades to compiling without the cache.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    if let Ok(cache) = SELECTOR_CACHE.read() {
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = Selector::parse(css).ok();
    if let Ok(mut cache) = SELECTOR_CACHE.write() {
        cache
            .entry(css.to_string())
            .or_insert_with(|| compiled.clone());
    }
    compiled
}

/// Precompiles a batch of selectors into the cache.
pub fn precompile_selectors<I, S>(selectors: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for css in selectors {
        let _ = get_or_compile(css.as_ref());
    }
}
