// ABOUTME: Site-specific extraction: the SiteExtractor registry and its JSON loader.
// ABOUTME: Generic fallback chains live in the resolver; this module only knows about particular sites.

//! Site-specific extractors.
//!
//! Submodules:
//! - `custom`: the `SiteExtractor` trait, `CatalogExtractor` and `SiteRegistry`.
//! - `loader`: builtin and file-based registry loading.

pub mod custom;
pub mod loader;
