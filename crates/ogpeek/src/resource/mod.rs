// ABOUTME: Static page fetching over HTTP for the static acquisition strategy.
// ABOUTME: Handles SSRF protection, success-status and HTML content-type checks, size limits and charset decoding.

use std::collections::HashMap;
use std::net::IpAddr;

use bytes::Bytes;
use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use url::Url;

use crate::error::PreviewError;

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Content types accepted as HTML. A missing header is accepted too.
const HTML_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Options for fetching a page.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
}

/// Result of a successful fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResult {
    /// Decode the body as UTF-8 text, using charset hints from the content-type header.
    pub fn text_utf8(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

static PRIVATE_RANGES: Lazy<(Vec<Ipv4Net>, Vec<Ipv6Net>)> = Lazy::new(|| {
    let v4 = ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "127.0.0.0/8", "169.254.0.0/16"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect();
    let v6 = ["fc00::/7", "fe80::/10"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect();
    (v4, v6)
});

/// Check if an IP address is in a private/reserved range.
pub(crate) fn is_private_ip(addr: &IpAddr) -> bool {
    let (v4, v6) = &*PRIVATE_RANGES;
    match addr {
        IpAddr::V4(ip) => v4.iter().any(|net| net.contains(ip)),
        IpAddr::V6(ip) => ip.is_loopback() || v6.iter().any(|net| net.contains(ip)),
    }
}

/// Rejects `target` when its host is, or resolves to, a private address.
pub(crate) async fn guard_private_host(url: &str, target: &Url, what: &str) -> Result<(), PreviewError> {
    let Some(host) = target.host_str() else {
        return Ok(());
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(ssrf_blocked(url, what));
        }
        return Ok(());
    }

    let port = target.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        PreviewError::fetch(
            url,
            "Fetch",
            Some(anyhow::anyhow!("DNS lookup failed for {}: {}", what, e)),
        )
    })?;
    for socket_addr in addrs {
        if is_private_ip(&socket_addr.ip()) {
            return Err(ssrf_blocked(url, what));
        }
    }
    Ok(())
}

fn ssrf_blocked(url: &str, what: &str) -> PreviewError {
    PreviewError::ssrf(
        url,
        "Fetch",
        Some(anyhow::anyhow!("{} resolves to a private address", what)),
    )
}

/// Decode body bytes to a String using charset from content-type header or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(encoding) = content_type
        .and_then(extract_charset)
        .and_then(|charset| encoding_rs::Encoding::for_label(charset.as_bytes()))
    {
        let (decoded, _, _) = encoding.decode(body);
        return decoded.into_owned();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    content_type.to_lowercase().split(';').find_map(|part| {
        part.trim()
            .strip_prefix("charset=")
            .map(|charset| charset.trim_matches('"').trim_matches('\'').to_string())
    })
}

/// Returns true if the content type denotes an HTML document.
fn is_html_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let mime = ct.split(';').next().unwrap_or_default().trim();
            HTML_CONTENT_TYPES.iter().any(|html| mime.eq_ignore_ascii_case(html))
        }
    }
}

/// Fetch an HTML page from the given URL.
///
/// Fails on network errors, non-success statuses, non-HTML content types,
/// oversize bodies and, unless allowed, private network targets.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<FetchResult, PreviewError> {
    if url.is_empty() {
        return Err(PreviewError::invalid_url(url, "Fetch", None));
    }

    let parsed_url = Url::parse(url).map_err(|e| {
        PreviewError::invalid_url(url, "Fetch", Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;

    let scheme = parsed_url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(PreviewError::invalid_url(
            url,
            "Fetch",
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    if !opts.allow_private_networks {
        guard_private_host(url, &parsed_url, "target").await?;
    }

    let mut request = client.get(url);
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            PreviewError::timeout(url, "Fetch", Some(anyhow::anyhow!("request timed out: {}", e)))
        } else {
            PreviewError::fetch(url, "Fetch", Some(anyhow::anyhow!("request failed: {}", e)))
        }
    })?;

    if !opts.allow_private_networks {
        guard_private_host(url, response.url(), "redirect target").await?;
    }

    let status = response.status().as_u16();
    if !response.status().is_success() {
        return Err(PreviewError::fetch(
            url,
            "Fetch",
            Some(anyhow::anyhow!("HTTP status {}", status)),
        ));
    }

    if let Some(len) = response.content_length() {
        if len as usize > MAX_CONTENT_LENGTH {
            return Err(PreviewError::fetch(
                url,
                "Fetch",
                Some(anyhow::anyhow!("content too large")),
            ));
        }
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    if !is_html_content_type(content_type.as_deref()) {
        return Err(PreviewError::fetch(
            url,
            "Fetch",
            Some(anyhow::anyhow!(
                "unsupported content type {}",
                content_type.as_deref().unwrap_or_default()
            )),
        ));
    }

    let body = response.bytes().await.map_err(|e| {
        PreviewError::fetch(
            url,
            "Fetch",
            Some(anyhow::anyhow!("failed to read body: {}", e)),
        )
    })?;

    if body.len() > MAX_CONTENT_LENGTH {
        return Err(PreviewError::fetch(
            url,
            "Fetch",
            Some(anyhow::anyhow!("content too large")),
        ));
    }

    Ok(FetchResult {
        status,
        url: url.to_string(),
        final_url,
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn create_test_client() -> reqwest::Client {
        reqwest::Client::builder()
            .user_agent("test-agent")
            .build()
            .unwrap()
    }

    fn private_ok() -> FetchOptions {
        FetchOptions {
            allow_private_networks: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_ok_html() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/page").header("x-preview", "1");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<title>hello</title>");
        });

        let client = create_test_client();
        let mut opts = private_ok();
        opts.headers.insert("x-preview".to_string(), "1".to_string());

        let result = fetch(&client, &server.url("/page"), &opts).await;
        mock.assert();

        let result = result.expect("fetch should succeed");
        assert_eq!(result.status, 200);
        assert_eq!(result.final_url, server.url("/page"));
        assert_eq!(result.text_utf8(), "<title>hello</title>");
    }

    #[tokio::test]
    async fn test_fetch_non_success_rejected() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/notfound");
            then.status(404).body("not found");
        });

        let result = fetch(&create_test_client(), &server.url("/notfound"), &private_ok()).await;
        mock.assert();

        let err = result.expect_err("should fail on 404");
        assert!(err.is_fetch());
        assert!(err.to_string().contains("HTTP status 404"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_html() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/image.png");
            then.status(200)
                .header("content-type", "image/png")
                .body("PNG");
        });

        let result = fetch(&create_test_client(), &server.url("/image.png"), &private_ok()).await;
        mock.assert();

        let err = result.expect_err("should fail on image content");
        assert!(err.is_fetch());
    }

    #[tokio::test]
    async fn test_fetch_accepts_xhtml() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/doc");
            then.status(200)
                .header("content-type", "application/xhtml+xml")
                .body("<html/>");
        });

        let result = fetch(&create_test_client(), &server.url("/doc"), &private_ok()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_scheme() {
        let err = fetch(&create_test_client(), "ftp://example.com/file", &private_ok())
            .await
            .expect_err("ftp must be rejected");
        assert!(err.is_invalid_url());
    }

    #[tokio::test]
    async fn test_private_ip_block() {
        let server = MockServer::start();
        let url = format!("http://127.0.0.1:{}/test", server.port());
        let result = fetch(&create_test_client(), &url, &FetchOptions::default()).await;

        let err = result.expect_err("should fail on private IP");
        assert!(err.is_ssrf());
    }

    #[test]
    fn test_max_content_length_constant() {
        assert_eq!(MAX_CONTENT_LENGTH, 10 * 1024 * 1024);
    }

    #[test]
    fn test_decode_iso_8859_1_with_chardetng() {
        let iso_bytes: &[u8] = &[0x63, 0x61, 0x66, 0xe9];
        assert_eq!(decode_body(iso_bytes, None), "café");
    }

    #[test]
    fn test_decode_shift_jis_with_charset() {
        // "価格" in Shift_JIS
        let sjis: &[u8] = &[0x89, 0xBF, 0x8A, 0x69];
        assert_eq!(decode_body(sjis, Some("text/html; charset=shift_jis")), "価格");
    }

    #[test]
    fn test_is_private_ip() {
        assert!(is_private_ip(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"172.31.255.255".parse().unwrap()));
        assert!(is_private_ip(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_ip(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"169.254.0.1".parse().unwrap()));
        assert!(is_private_ip(&"::1".parse().unwrap()));
        assert!(is_private_ip(&"fd00::1".parse().unwrap()));
        assert!(is_private_ip(&"fe80::1".parse().unwrap()));

        assert!(!is_private_ip(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_ip(&"172.32.0.1".parse().unwrap()));
        assert!(!is_private_ip(&"2001:4860:4860::8888".parse().unwrap()));
    }

    #[test]
    fn test_extract_charset() {
        assert_eq!(extract_charset("text/html; charset=utf-8"), Some("utf-8".to_string()));
        assert_eq!(
            extract_charset("text/html; charset=\"ISO-8859-1\""),
            Some("iso-8859-1".to_string())
        );
        assert_eq!(extract_charset("text/html"), None);
    }

    #[test]
    fn test_is_html_content_type() {
        assert!(is_html_content_type(None));
        assert!(is_html_content_type(Some("text/html; charset=utf-8")));
        assert!(is_html_content_type(Some("TEXT/HTML")));
        assert!(!is_html_content_type(Some("application/json")));
    }
}
