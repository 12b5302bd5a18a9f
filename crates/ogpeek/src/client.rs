// ABOUTME: The main Client struct for ogpeek: batch orchestration over acquirer and resolver.
// ABOUTME: Provides async run() for URL batches and resolve_html() for already-fetched pages.

use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::Semaphore;
use url::Url;

use crate::acquire::{AcquiredPage, Acquirer, RenderedAcquirer, StaticAcquirer, Strategy};
use crate::dom::compiled::precompile_selectors;
use crate::dom::Document;
use crate::error::PreviewError;
use crate::extractors::custom::SiteRegistry;
use crate::extractors::loader::load_builtin_registry;
use crate::options::{ClientBuilder, Options};
use crate::resolver::chains::all_selectors;
use crate::resolver::resolve;
use crate::result::MetadataRecord;

/// Validates one input string: it must parse and use http or https.
pub fn validate_url(input: &str) -> Result<Url, PreviewError> {
    if input.trim().is_empty() {
        return Err(PreviewError::invalid_url(
            input,
            "Validate",
            Some(anyhow::anyhow!("empty URL")),
        ));
    }

    let url = Url::parse(input).map_err(|e| {
        PreviewError::invalid_url(input, "Validate", Some(anyhow::anyhow!("malformed URL: {}", e)))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PreviewError::invalid_url(
            input,
            "Validate",
            Some(anyhow::anyhow!("unsupported scheme {:?}", other)),
        )),
    }
}

/// The main ogpeek client for resolving preview metadata.
pub struct Client {
    opts: Options,
    acquirer: Arc<dyn Acquirer>,
    registry: SiteRegistry,
    permits: Semaphore,
}

impl Client {
    /// Create a new ClientBuilder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a new Client with the given options.
    ///
    /// The rendered strategy does not start Chromium here; the browser is
    /// launched by the first batch that needs it.
    pub fn new(opts: Options) -> Result<Self, PreviewError> {
        let acquirer: Arc<dyn Acquirer> = match opts.acquirer.clone() {
            Some(acquirer) => acquirer,
            None => match opts.strategy {
                Strategy::Static => Arc::new(StaticAcquirer::new(&opts)?),
                Strategy::Rendered => Arc::new(RenderedAcquirer::new(&opts)),
            },
        };
        let registry = opts.registry.clone().unwrap_or_else(load_builtin_registry);
        let permits = Semaphore::new(opts.concurrency());
        precompile_selectors(all_selectors());

        Ok(Self {
            opts,
            acquirer,
            registry,
            permits,
        })
    }

    /// The options this client was built with.
    pub fn options(&self) -> &Options {
        &self.opts
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    /// Resolve metadata for every URL in `urls`.
    ///
    /// Returns exactly one record per input, in input order. Invalid URLs and
    /// pages that cannot be fetched become records with a failure status; only
    /// an internal fault (for example a browser that cannot start) fails the
    /// whole batch.
    pub async fn run<S: AsRef<str>>(&self, urls: &[S]) -> Result<Vec<MetadataRecord>, PreviewError> {
        tracing::info!(
            urls = urls.len(),
            strategy = %self.acquirer.strategy(),
            concurrency = self.opts.concurrency(),
            "starting batch"
        );

        let records = try_join_all(urls.iter().map(|u| self.process_one(u.as_ref()))).await?;

        let ok = records.iter().filter(|r| r.is_ok()).count();
        tracing::info!(urls = records.len(), ok, failed = records.len() - ok, "batch finished");
        Ok(records)
    }

    /// Resolve metadata from HTML that was fetched elsewhere.
    pub fn resolve_html(&self, html: &str, url: &str) -> Result<MetadataRecord, PreviewError> {
        validate_url(url)?;
        let doc = Document::parse(html);
        Ok(resolve(&doc, url, &self.registry))
    }

    /// Release the acquirer's long-lived resources, such as the browser.
    pub async fn shutdown(&self) -> Result<(), PreviewError> {
        self.acquirer.shutdown().await
    }

    async fn process_one(&self, input: &str) -> Result<MetadataRecord, PreviewError> {
        let url = match validate_url(input) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(url = input, error = %err, "rejected input");
                return Ok(MetadataRecord::invalid_url(input, &err));
            }
        };
        let product_info = self.registry.identify(&url);

        let acquired = {
            let _permit = self.permits.acquire().await.map_err(|e| {
                PreviewError::internal(input, "Acquire", Some(anyhow::anyhow!(e)))
            })?;
            tracing::debug!(url = %url, "acquiring page");
            let budget = self.opts.acquire_timeout + self.acquirer.cleanup_grace();
            match tokio::time::timeout(budget, self.acquirer.acquire(&url)).await {
                Ok(result) => result,
                Err(_) => Err(PreviewError::timeout(
                    input,
                    "Acquire",
                    Some(anyhow::anyhow!("no page within {}ms", budget.as_millis())),
                )),
            }
        };

        match acquired {
            Ok(page) => Ok(self.resolve_page(input, &page)),
            Err(err) if err.is_internal() => {
                tracing::error!(url = input, error = %err, "acquirer fault, aborting batch");
                Err(err)
            }
            Err(err) => {
                tracing::warn!(url = input, code = %err.code, error = %err, "fetch failed");
                Ok(MetadataRecord::fetch_failed(input, product_info, &err))
            }
        }
    }

    // The parsed Document is !Send; keeping it inside a sync fn keeps it off any await point.
    fn resolve_page(&self, input: &str, page: &AcquiredPage) -> MetadataRecord {
        let doc = page.document();
        let record = resolve(&doc, input, &self.registry);
        tracing::debug!(
            url = input,
            final_url = %page.final_url,
            title = ?record.title,
            "resolved page"
        );
        record
    }
}
