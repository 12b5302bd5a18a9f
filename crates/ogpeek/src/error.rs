// ABOUTME: Error types for ogpeek including the ErrorCode enum and PreviewError struct.
// ABOUTME: Provides categorized errors with convenience constructors, boolean helpers and HTTP mapping.

use std::fmt;

/// Error codes representing the different categories of preview failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUrl,
    Fetch,
    Timeout,
    Ssrf,
    AuthRejected,
    BadRequest,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::Fetch => "fetch error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Ssrf => "SSRF blocked",
            ErrorCode::AuthRejected => "unauthorized",
            ErrorCode::BadRequest => "bad request",
            ErrorCode::Internal => "internal fault",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for acquisition, extraction and request handling.
#[derive(Debug, thiserror::Error)]
pub struct PreviewError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for PreviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ogpeek: {} {}: {}", self.op, self.url, self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl PreviewError {
    fn with_code(
        code: ErrorCode,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::InvalidUrl, url, op, source)
    }

    /// Create a Fetch error.
    pub fn fetch(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Fetch, url, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Timeout, url, op, source)
    }

    /// Create an SSRF error.
    pub fn ssrf(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Ssrf, url, op, source)
    }

    /// Create an AuthRejected error. The url is empty since rejection happens per request.
    pub fn auth_rejected(op: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Self::with_code(ErrorCode::AuthRejected, String::new(), op, source)
    }

    /// Create a BadRequest error for malformed request envelopes.
    pub fn bad_request(op: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Self::with_code(ErrorCode::BadRequest, String::new(), op, source)
    }

    /// Create an Internal error: a fault of the engine itself, such as a browser that cannot launch.
    pub fn internal(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Internal, url, op, source)
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    /// Returns true if this is an SSRF error.
    pub fn is_ssrf(&self) -> bool {
        self.code == ErrorCode::Ssrf
    }

    /// Returns true if this is a Fetch error.
    pub fn is_fetch(&self) -> bool {
        self.code == ErrorCode::Fetch
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }

    /// Returns true if this is an AuthRejected error.
    pub fn is_auth_rejected(&self) -> bool {
        self.code == ErrorCode::AuthRejected
    }

    /// Returns true if the error must abort a whole batch instead of a single record.
    pub fn is_internal(&self) -> bool {
        self.code == ErrorCode::Internal
    }

    /// Returns true if the error describes a page that could not be acquired.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::Fetch | ErrorCode::Timeout | ErrorCode::Ssrf
        )
    }

    /// HTTP status a transport should answer with when this error escapes a request.
    pub fn http_status(&self) -> u16 {
        match self.code {
            ErrorCode::AuthRejected => 401,
            ErrorCode::BadRequest | ErrorCode::InvalidUrl => 400,
            ErrorCode::Fetch | ErrorCode::Timeout | ErrorCode::Ssrf => 502,
            ErrorCode::Internal => 500,
        }
    }
}
