// ABOUTME: Main library entry point for the ogpeek link preview metadata engine.
// ABOUTME: Re-exports the public API: Client, ClientBuilder, MetadataRecord, PreviewError, Strategy, Service.

//! ogpeek - link preview metadata extraction.
//!
//! Given a batch of URLs, ogpeek fetches each page (plain HTTP or headless
//! Chromium), resolves title, description, image, canonical URL and domain
//! through ordered fallback chains over social-preview tags, and adds item id
//! and price for recognized product-catalog URLs.
//!
//! # Example
//!
//! ```no_run
//! use ogpeek::{Client, PreviewError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PreviewError> {
//!     let client = Client::builder().build()?;
//!     let records = client
//!         .run(&["https://example.com/", "https://www.amazon.co.jp/dp/B000000000"])
//!         .await?;
//!     for record in &records {
//!         println!("{:?} {:?}", record.status, record.title);
//!     }
//!     client.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod acquire;
pub mod client;
pub mod dom;
pub mod error;
pub mod extractors;
pub mod options;
pub mod resolver;
pub mod resource;
pub mod result;
pub mod service;

pub use crate::acquire::{AcquiredPage, Acquirer, RenderedAcquirer, StaticAcquirer, Strategy};
pub use crate::client::{validate_url, Client};
pub use crate::dom::Document;
pub use crate::error::{ErrorCode, PreviewError};
pub use crate::extractors::custom::{CatalogExtractor, SiteExtractor, SiteRegistry};
pub use crate::extractors::loader::{load_builtin_registry, load_registry_file};
pub use crate::options::{ClientBuilder, Options};
pub use crate::resolver::resolve;
pub use crate::result::{MetadataRecord, ProductInfo, RecordStatus};
pub use crate::service::{ExtractionRequest, Gate, IncomingRequest, ResultLayout, Service, ServiceResponse};
