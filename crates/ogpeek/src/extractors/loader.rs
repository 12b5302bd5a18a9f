// ABOUTME: Loader for site extractor registries from embedded or user-supplied JSON.
// ABOUTME: Provides load_builtin_registry() and load_registry_file() for the client and CLI.

//! Site registry loader.

use std::path::Path;

use anyhow::Context;

use crate::extractors::custom::SiteRegistry;

/// Embedded JSON containing the builtin catalog patterns.
const BUILTIN_CATALOGS_JSON: &str = include_str!("../../data/catalog_patterns.json");

/// Loads the builtin registry from embedded JSON.
///
/// # Panics
///
/// Panics if the embedded JSON is malformed.
pub fn load_builtin_registry() -> SiteRegistry {
    let mut registry = SiteRegistry::new();
    registry
        .extend_from_json(BUILTIN_CATALOGS_JSON)
        .expect("failed to parse builtin catalog patterns");
    registry
}

/// Loads the builtin registry plus the catalog patterns stored in `path`.
pub fn load_registry_file(path: &Path) -> anyhow::Result<SiteRegistry> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog patterns from {}", path.display()))?;
    let mut registry = load_builtin_registry();
    registry
        .extend_from_json(&json)
        .with_context(|| format!("parsing catalog patterns from {}", path.display()))?;
    Ok(registry)
}
