// ABOUTME: Page acquisition abstraction with interchangeable static and rendered strategies.
// ABOUTME: Defines the Acquirer trait, the AcquiredPage it yields and the Strategy selector.

//! Page acquisition.
//!
//! An [`Acquirer`] turns a validated URL into an [`AcquiredPage`]: the HTML the
//! resolver will parse plus where it came from. Acquirers never parse the
//! page themselves, so their futures stay `Send` and no DOM outlives the
//! pipeline that built it.

pub mod rendered;
pub mod static_fetch;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::dom::Document;
use crate::error::PreviewError;

pub use rendered::RenderedAcquirer;
pub use static_fetch::StaticAcquirer;

/// Which backend fetches pages. Chosen by configuration, never by the acquirer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Strategy {
    /// Plain HTTP GET and passive parse. Cheap; misses script-populated content.
    #[default]
    Static,
    /// Headless Chromium navigation. Needed wherever prices are filled in by scripts.
    #[value(alias = "browser", alias = "chromium")]
    Rendered,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Static => "static",
            Strategy::Rendered => "rendered",
        };
        write!(f, "{}", s)
    }
}

/// A page fetched by an acquirer.
#[derive(Debug, Clone)]
pub struct AcquiredPage {
    /// The URL that was requested.
    pub url: String,
    /// The URL after redirects.
    pub final_url: String,
    /// Status of the main document response.
    pub status: u16,
    pub html: String,
}

impl AcquiredPage {
    /// Parses the page into a queryable Document.
    pub fn document(&self) -> Document {
        Document::parse(&self.html)
    }
}

/// A backend that fetches pages.
///
/// Errors must be classified: fetch failures (`Fetch`, `Timeout`, `Ssrf`) are
/// recorded per URL, `Internal` errors abort the whole batch.
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Fetches `url`.
    async fn acquire(&self, url: &Url) -> Result<AcquiredPage, PreviewError>;

    /// Releases long-lived resources. Safe to call more than once.
    async fn shutdown(&self) -> Result<(), PreviewError> {
        Ok(())
    }

    fn strategy(&self) -> Strategy;

    /// Extra time, past the acquisition timeout, the acquirer needs to release
    /// what it holds after giving up on a page. The caller waits this long
    /// before abandoning the acquisition.
    fn cleanup_grace(&self) -> Duration {
        Duration::ZERO
    }
}
