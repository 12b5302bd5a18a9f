// ABOUTME: Static acquisition strategy: HTTP GET via reqwest and no script execution.
// ABOUTME: Builds the SSRF-aware HTTP client and delegates to resource::fetch.

use std::net::ToSocketAddrs;

use async_trait::async_trait;
use url::Url;

use crate::acquire::{AcquiredPage, Acquirer, Strategy};
use crate::error::PreviewError;
use crate::options::Options;
use crate::resource::{fetch, is_private_ip, FetchOptions};

/// Fetches pages with a plain HTTP client.
pub struct StaticAcquirer {
    http_client: reqwest::Client,
    fetch_opts: FetchOptions,
}

/// Redirect policy refusing hops to private addresses.
fn redirect_policy(allow_private: bool) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= 10 {
            return attempt.error("too many redirects");
        }
        if allow_private {
            return attempt.follow();
        }
        let next = attempt.url().clone();
        let Some(host) = next.host_str() else {
            return attempt.follow();
        };
        if let Ok(ip) = host.trim_matches(|c| c == '[' || c == ']').parse::<std::net::IpAddr>() {
            if is_private_ip(&ip) {
                return attempt.error("redirect to private IP blocked");
            }
            return attempt.follow();
        }
        // synchronous DNS resolution: redirect policies cannot await
        let port = next.port_or_known_default().unwrap_or(80);
        match (host, port).to_socket_addrs() {
            Ok(mut addrs) => {
                if addrs.any(|sa| is_private_ip(&sa.ip())) {
                    attempt.error("redirect to private IP blocked")
                } else {
                    attempt.follow()
                }
            }
            Err(_) => attempt.error("DNS lookup failed during redirect"),
        }
    })
}

impl StaticAcquirer {
    /// Creates an acquirer from client options, reusing `opts.http_client` when set.
    pub fn new(opts: &Options) -> Result<Self, PreviewError> {
        let http_client = match opts.http_client.clone() {
            Some(client) => client,
            None => reqwest::Client::builder()
                .redirect(redirect_policy(opts.allow_private_networks))
                .user_agent(&opts.user_agent)
                .timeout(opts.acquire_timeout)
                .cookie_store(true)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .map_err(|e| {
                    PreviewError::internal(
                        "",
                        "BuildHttpClient",
                        Some(anyhow::anyhow!("failed to build HTTP client: {}", e)),
                    )
                })?,
        };

        Ok(Self {
            http_client,
            fetch_opts: FetchOptions {
                headers: opts.headers.clone(),
                allow_private_networks: opts.allow_private_networks,
            },
        })
    }
}

#[async_trait]
impl Acquirer for StaticAcquirer {
    async fn acquire(&self, url: &Url) -> Result<AcquiredPage, PreviewError> {
        let fetched = fetch(&self.http_client, url.as_str(), &self.fetch_opts).await?;
        let html = fetched.text_utf8();
        Ok(AcquiredPage {
            url: fetched.url,
            final_url: fetched.final_url,
            status: fetched.status,
            html,
        })
    }

    fn strategy(&self) -> Strategy {
        Strategy::Static
    }
}
