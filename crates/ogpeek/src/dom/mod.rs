// ABOUTME: The queryable Document built from an acquired page for one extraction.
// ABOUTME: Wraps scraper's Html with first-match attribute, text and class-name lookups.

//! Document queries used by the metadata resolver.
//!
//! Every lookup consults only the *first* element matching a selector, the way
//! `querySelector` does. Values are trimmed and an empty value counts as
//! absent, so fallback chains can move on to the next source.

pub mod compiled;

use scraper::{ElementRef, Html};

use crate::dom::compiled::get_or_compile;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Collapses runs of whitespace into single spaces and trims the ends.
pub(crate) fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// A parsed page. Not `Send`: build it after the last `.await` of a pipeline.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses an HTML document without executing scripts.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    fn first(&self, selector: &str) -> Option<ElementRef<'_>> {
        let sel = get_or_compile(selector)?;
        self.html.select(&sel).next()
    }

    /// Returns the trimmed `attr` value of the first element matching `selector`.
    pub fn first_attr(&self, selector: &str, attr: &str) -> Option<String> {
        let el = self.first(selector)?;
        let value = el.value().attr(attr)?;
        non_empty(value.trim().to_string())
    }

    /// Returns the whitespace-normalized text content of the first element matching `selector`.
    pub fn first_text(&self, selector: &str) -> Option<String> {
        let el = self.first(selector)?;
        non_empty(normalize_whitespace(&el.text().collect::<String>()))
    }

    /// Like [`Document::first_text`], but skips matches outside the HTML namespace.
    ///
    /// `<title>` inside inline SVG is an SVG element and never the page title.
    pub fn first_html_text(&self, selector: &str) -> Option<String> {
        let sel = get_or_compile(selector)?;
        let el = self
            .html
            .select(&sel)
            .find(|el| &*el.value().name.ns == HTML_NAMESPACE)?;
        non_empty(normalize_whitespace(&el.text().collect::<String>()))
    }

    /// Returns the text content of the first element carrying `class`, in document order.
    pub fn first_text_by_class(&self, class: &str) -> Option<String> {
        let el = self
            .html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().classes().any(|c| c == class))?;
        non_empty(normalize_whitespace(&el.text().collect::<String>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html>
        <head>
            <title>
                Sample   Page
            </title>
            <meta property="og:image" content="  https://example.com/og.jpg  ">
            <meta name="twitter:title" content="">
            <meta name="twitter:title" content="Second Twitter Title">
        </head>
        <body>
            <span class="a-price a-price-whole-wrapper">nope</span>
            <span class="a-offscreen a-price-whole">1,980<span class="a-price-decimal">.</span></span>
            <span class="a-price-whole">2,500</span>
        </body>
        </html>
    "#;

    #[test]
    fn first_attr_trims_value() {
        let doc = Document::parse(SAMPLE_HTML);
        assert_eq!(
            doc.first_attr("meta[property='og:image']", "content"),
            Some("https://example.com/og.jpg".to_string())
        );
    }

    #[test]
    fn first_attr_only_consults_first_match() {
        let doc = Document::parse(SAMPLE_HTML);
        assert_eq!(doc.first_attr("meta[name='twitter:title']", "content"), None);
    }

    #[test]
    fn first_attr_missing_element_or_attr() {
        let doc = Document::parse(SAMPLE_HTML);
        assert_eq!(doc.first_attr("meta[property='og:url']", "content"), None);
        assert_eq!(doc.first_attr("meta[property='og:image']", "href"), None);
    }

    #[test]
    fn first_text_normalizes_whitespace() {
        let doc = Document::parse(SAMPLE_HTML);
        assert_eq!(doc.first_text("title"), Some("Sample Page".to_string()));
    }

    #[test]
    fn first_text_by_class_matches_whole_class_names() {
        let doc = Document::parse(SAMPLE_HTML);
        assert_eq!(
            doc.first_text_by_class("a-price-whole"),
            Some("1,980.".to_string())
        );
        assert_eq!(doc.first_text_by_class("missing-class"), None);
    }

    #[test]
    fn first_html_text_ignores_svg_titles() {
        let doc = Document::parse(
            r#"<html><head></head><body>
                <svg><title>cart-icon</title></svg>
            </body></html>"#,
        );
        assert_eq!(doc.first_text("title"), Some("cart-icon".to_string()));
        assert_eq!(doc.first_html_text("title"), None);

        let doc = Document::parse(
            r#"<html><head><title>Shop</title></head><body><svg><title>icon</title></svg></body></html>"#,
        );
        assert_eq!(doc.first_html_text("title"), Some("Shop".to_string()));
    }

    #[test]
    fn invalid_selector_is_absent() {
        let doc = Document::parse(SAMPLE_HTML);
        assert_eq!(doc.first_text("[[[invalid"), None);
    }
}
