// ABOUTME: Configuration options for the ogpeek engine including Options and ClientBuilder.
// ABOUTME: ClientBuilder provides a fluent API for constructing Client instances with custom settings.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::acquire::{Acquirer, Strategy};
use crate::client::Client;
use crate::error::PreviewError;
use crate::extractors::custom::SiteRegistry;

/// Default per-acquisition timeout.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent sent by both strategies.
pub const DEFAULT_USER_AGENT: &str = "ogpeek/0.1 (+link preview)";

/// Concurrent pipelines allowed when `max_concurrency` is unset.
///
/// Browser pages are far heavier than HTTP requests, so the rendered strategy gets fewer.
pub fn default_concurrency(strategy: Strategy) -> usize {
    match strategy {
        Strategy::Static => 16,
        Strategy::Rendered => 4,
    }
}

/// Configuration options for the ogpeek client.
#[derive(Clone)]
pub struct Options {
    pub acquire_timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub strategy: Strategy,
    pub max_concurrency: Option<usize>,
    pub headers: HashMap<String, String>,
    pub http_client: Option<reqwest::Client>,
    pub registry: Option<SiteRegistry>,
    pub chrome_executable: Option<PathBuf>,
    /// Overrides the strategy with a caller-supplied backend.
    pub acquirer: Option<Arc<dyn Acquirer>>,
}

impl Options {
    /// The effective concurrency bound, never zero.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency
            .unwrap_or_else(|| default_concurrency(self.strategy))
            .max(1)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_networks: false,
            strategy: Strategy::Static,
            max_concurrency: None,
            headers: HashMap::new(),
            http_client: None,
            registry: None,
            chrome_executable: None,
            acquirer: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("acquire_timeout", &self.acquire_timeout)
            .field("user_agent", &self.user_agent)
            .field("allow_private_networks", &self.allow_private_networks)
            .field("strategy", &self.strategy)
            .field("max_concurrency", &self.max_concurrency)
            .field("headers", &self.headers)
            .field("http_client", &self.http_client.is_some())
            .field("registry", &self.registry)
            .field("chrome_executable", &self.chrome_executable)
            .field(
                "acquirer",
                &self.acquirer.as_ref().map(|a| a.strategy().to_string()),
            )
            .finish()
    }
}

/// Builder for constructing Client instances with custom configuration.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    opts: Options,
}

impl ClientBuilder {
    /// Create a new ClientBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the per-acquisition timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.acquire_timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Select the page acquisition strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.opts.strategy = strategy;
        self
    }

    /// Bound the number of pipelines acquiring at once.
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.opts.max_concurrency = Some(n);
        self
    }

    /// Use a custom HTTP client for the static strategy.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Add a custom header to all static requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Set a custom site registry in place of the builtin one.
    pub fn registry(mut self, reg: SiteRegistry) -> Self {
        self.opts.registry = Some(reg);
        self
    }

    /// Path to the Chromium binary used by the rendered strategy.
    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.opts.chrome_executable = Some(path.into());
        self
    }

    /// Use a custom acquisition backend. Takes precedence over `strategy`.
    pub fn acquirer(mut self, acquirer: Arc<dyn Acquirer>) -> Self {
        self.opts.acquirer = Some(acquirer);
        self
    }

    /// Build the Client with the configured options.
    pub fn build(self) -> Result<Client, PreviewError> {
        Client::new(self.opts)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
