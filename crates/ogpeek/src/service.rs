// ABOUTME: Transport-agnostic request handling: body parsing, the shared-secret gate and the response envelope.
// ABOUTME: A web framework only has to convert its request into IncomingRequest and write back ServiceResponse.

//! Request/response plumbing for serving the engine over HTTP.
//!
//! Nothing here opens a socket. [`Service::respond`] takes an
//! [`IncomingRequest`] and always yields a [`ServiceResponse`], so wiring the
//! engine into any HTTP server is a few lines of glue.

use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::PreviewError;
use crate::result::MetadataRecord;

/// Header carrying the shared secret. Matched case-insensitively.
pub const SECRET_HEADER: &str = "secret-token";

/// Cache directive on successful responses: results for a URL rarely change within a day.
pub const CACHE_CONTROL: &str = "s-maxage=86400";

/// The list of candidate URLs in a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionRequest {
    pub urls: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUrls {
    List(Vec<String>),
    Delimited(String),
}

#[derive(Deserialize)]
struct RawRequest {
    urls: RawUrls,
}

impl ExtractionRequest {
    /// Parses `{"urls": [...]}` or `{"urls": "a,b\nc"}`.
    ///
    /// Array entries are kept verbatim, including empty strings and duplicates,
    /// so each produces its own record. A delimited string is split on commas
    /// and whitespace and its empty pieces dropped.
    pub fn from_json(body: &str) -> Result<Self, PreviewError> {
        let raw: RawRequest = serde_json::from_str(body).map_err(|e| {
            PreviewError::bad_request("ParseBody", Some(anyhow::anyhow!("invalid request body: {}", e)))
        })?;

        let urls = match raw.urls {
            RawUrls::List(urls) => urls,
            RawUrls::Delimited(s) => s
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect(),
        };

        if urls.is_empty() {
            return Err(PreviewError::bad_request(
                "ParseBody",
                Some(anyhow::anyhow!("no URLs in request")),
            ));
        }
        Ok(Self { urls })
    }
}

/// A request as handed over by the transport.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl IncomingRequest {
    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Rejects requests that are not authenticated JSON POSTs.
#[derive(Clone)]
pub struct Gate {
    secret: String,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate").field("secret", &"<redacted>").finish()
    }
}

impl Gate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Checks method, content type and secret. Any mismatch is an `AuthRejected` error.
    pub fn authorize(&self, req: &IncomingRequest) -> Result<(), PreviewError> {
        if !req.method.eq_ignore_ascii_case("POST") {
            return Err(PreviewError::auth_rejected(
                "Authorize",
                Some(anyhow::anyhow!("method {} not allowed", req.method)),
            ));
        }

        let is_json = req
            .header("content-type")
            .and_then(|ct| ct.split(';').next())
            .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Err(PreviewError::auth_rejected(
                "Authorize",
                Some(anyhow::anyhow!("content type must be application/json")),
            ));
        }

        match req.header(SECRET_HEADER) {
            Some(token)
                if !self.secret.is_empty() && constant_time_eq(token.as_bytes(), self.secret.as_bytes()) =>
            {
                Ok(())
            }
            _ => Err(PreviewError::auth_rejected(
                "Authorize",
                Some(anyhow::anyhow!("missing or wrong {}", SECRET_HEADER)),
            )),
        }
    }
}

/// Byte comparison whose running time does not depend on where the inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// How records are arranged under `result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultLayout {
    /// One array in input order.
    #[default]
    Ordered,
    /// Split into `sitePreviews` and `productItems`, each keeping input order.
    Grouped,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupedRecords<'a> {
    site_previews: Vec<&'a MetadataRecord>,
    product_items: Vec<&'a MetadataRecord>,
}

/// What the transport writes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ServiceResponse {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        }
    }

    /// Error response with the status from [`PreviewError::http_status`].
    pub fn from_error(err: &PreviewError) -> Self {
        Self::json(err.http_status(), serde_json::json!({ "error": err.to_string() }))
    }
}

/// The engine behind a gate.
pub struct Service {
    gate: Gate,
    client: Client,
    layout: ResultLayout,
}

impl Service {
    pub fn new(gate: Gate, client: Client) -> Self {
        Self {
            gate,
            client,
            layout: ResultLayout::Ordered,
        }
    }

    pub fn with_layout(mut self, layout: ResultLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Gate, parse, run. A rejected request never reaches the engine.
    pub async fn handle(&self, req: &IncomingRequest) -> Result<ServiceResponse, PreviewError> {
        self.gate.authorize(req)?;
        let request = ExtractionRequest::from_json(&req.body)?;
        let records = self.client.run(&request.urls).await?;

        let result = match self.layout {
            ResultLayout::Ordered => serde_json::to_value(&records),
            ResultLayout::Grouped => {
                let (product_items, site_previews) = records.iter().partition(|r| r.is_product());
                serde_json::to_value(GroupedRecords {
                    site_previews,
                    product_items,
                })
            }
        }
        .map_err(|e| PreviewError::internal("", "EncodeResponse", Some(anyhow::anyhow!(e))))?;

        let mut response = ServiceResponse::json(200, serde_json::json!({ "result": result }));
        response
            .headers
            .push(("Cache-Control".to_string(), CACHE_CONTROL.to_string()));
        Ok(response)
    }

    /// Like [`Service::handle`], with errors rendered as responses.
    pub async fn respond(&self, req: &IncomingRequest) -> ServiceResponse {
        match self.handle(req).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(code = %err.code, error = %err, "request rejected");
                ServiceResponse::from_error(&err)
            }
        }
    }
}
