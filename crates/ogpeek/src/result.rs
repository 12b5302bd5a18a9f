// ABOUTME: MetadataRecord, ProductInfo and RecordStatus: the per-URL output of a batch.
// ABOUTME: Serialized as camelCase JSON with absent fields omitted rather than emitted as empty strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PreviewError;

/// Outcome of processing one input URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum RecordStatus {
    #[default]
    Ok,
    FetchFailed,
    InvalidUrl,
}

/// Catalog data for URLs matching a registered product pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProductInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

/// The resolved preview metadata for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_info: Option<ProductInfo>,
    pub status: RecordStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetadataRecord {
    /// Record for an input string that failed URL validation. No acquisition was attempted.
    pub fn invalid_url(input: &str, err: &PreviewError) -> Self {
        Self {
            url: input.to_string(),
            status: RecordStatus::InvalidUrl,
            timestamp: Utc::now(),
            error: Some(err.to_string()),
            ..Default::default()
        }
    }

    /// Record for a URL whose page could not be acquired.
    ///
    /// `product_info` carries only the catalog id: the price needs a page.
    pub fn fetch_failed(input: &str, product_info: Option<ProductInfo>, err: &PreviewError) -> Self {
        Self {
            url: input.to_string(),
            product_info: product_info.map(|p| ProductInfo {
                price: None,
                ..p
            }),
            status: RecordStatus::FetchFailed,
            timestamp: Utc::now(),
            error: Some(err.to_string()),
            ..Default::default()
        }
    }

    /// Returns true if the page was acquired and resolved.
    pub fn is_ok(&self) -> bool {
        self.status == RecordStatus::Ok
    }

    /// Returns true if the record carries catalog data.
    pub fn is_product(&self) -> bool {
        self.product_info.is_some()
    }
}
