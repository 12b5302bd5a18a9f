// ABOUTME: Named, ordered fallback chains for every generic preview field.
// ABOUTME: Each chain lists its sources by priority; the resolver takes the first non-empty value.

//! Fallback chains.
//!
//! Page-native tags come before syndicated social tags. Among social tags the
//! Twitter card is consulted first for description and image, Open Graph first
//! for the title.

use crate::dom::Document;

/// One source of a field value within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorSpec {
    /// Text content of the first element matching the selector
    Css(&'static str),
    /// Text content of the first HTML-namespace element matching the selector
    HtmlCss(&'static str),
    /// Attribute of the first element matching the selector
    CssAttr(&'static str, &'static str),
}

impl SelectorSpec {
    /// Evaluates this source against `doc`.
    pub fn extract(&self, doc: &Document) -> Option<String> {
        match *self {
            SelectorSpec::Css(css) => doc.first_text(css),
            SelectorSpec::HtmlCss(css) => doc.first_html_text(css),
            SelectorSpec::CssAttr(css, attr) => doc.first_attr(css, attr),
        }
    }
}

/// Canonical URL sources. The input URL is the implicit last resort.
pub const URL_CHAIN: &[SelectorSpec] = &[SelectorSpec::CssAttr(
    "meta[property='og:url']",
    "content",
)];

pub const TITLE_CHAIN: &[SelectorSpec] = &[
    SelectorSpec::HtmlCss("title"),
    SelectorSpec::CssAttr("meta[property='og:title']", "content"),
    SelectorSpec::CssAttr("meta[name='twitter:title']", "content"),
];

pub const DESCRIPTION_CHAIN: &[SelectorSpec] = &[
    SelectorSpec::CssAttr("meta[name='description']", "content"),
    SelectorSpec::CssAttr("meta[name='twitter:description']", "content"),
    SelectorSpec::CssAttr("meta[property='og:description']", "content"),
];

pub const IMAGE_CHAIN: &[SelectorSpec] = &[
    SelectorSpec::CssAttr("meta[name='twitter:image']", "content"),
    SelectorSpec::CssAttr("meta[property='og:image']", "content"),
];

/// Every chain, in resolution order. Used to warm the selector cache.
pub const ALL_CHAINS: &[&[SelectorSpec]] = &[URL_CHAIN, TITLE_CHAIN, DESCRIPTION_CHAIN, IMAGE_CHAIN];

/// Returns the first value any source of `chain` yields.
pub fn first_present(doc: &Document, chain: &[SelectorSpec]) -> Option<String> {
    chain.iter().find_map(|spec| spec.extract(doc))
}

/// Selector strings of every chain.
pub fn all_selectors() -> impl Iterator<Item = &'static str> {
    ALL_CHAINS.iter().flat_map(|chain| {
        chain.iter().map(|spec| match *spec {
            SelectorSpec::Css(css) | SelectorSpec::HtmlCss(css) | SelectorSpec::CssAttr(css, _) => css,
        })
    })
}
