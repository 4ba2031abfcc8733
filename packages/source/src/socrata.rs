//! Socrata SODA API source.
//!
//! Rows are fetched page by page from `/resource/{dataset}.json` using the
//! `$limit`, `$offset` and `$order` query parameters. Change detection uses
//! the dataset view metadata at `/api/views/{dataset}.json`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::parsing::parse_date_value;
use crate::{DEFAULT_REFRESH_INTERVAL, ProviderSource, SourceError, retry};

/// Default Socrata host for the San Francisco open-data portal.
pub const DEFAULT_BASE_URL: &str = "https://data.sfgov.org";

/// Mobile Food Facility Permit dataset id.
pub const DEFAULT_DATASET_ID: &str = "rqzj-sfat";

/// Default number of rows requested per page.
pub const DEFAULT_PAGE_SIZE: u64 = 2000;

/// Per-request timeout for upstream calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a Socrata dataset.
#[derive(Debug, Clone)]
pub struct SocrataConfig {
    /// Scheme and host, e.g. `"https://data.sfgov.org"`. No trailing slash
    /// required.
    pub base_url: String,
    /// Dataset four-by-four id, e.g. `"rqzj-sfat"`.
    pub dataset_id: String,
    /// Optional application token sent as `X-App-Token`.
    pub app_token: Option<String>,
    /// Rows per page.
    pub page_size: u64,
    /// How often the dataset should be polled.
    pub refresh_interval: Duration,
}

impl Default for SocrataConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            dataset_id: DEFAULT_DATASET_ID.to_string(),
            app_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl SocrataConfig {
    /// URL of the row endpoint.
    #[must_use]
    pub fn resource_url(&self) -> String {
        format!(
            "{}/resource/{}.json",
            self.base_url.trim_end_matches('/'),
            self.dataset_id
        )
    }

    /// URL of the view metadata endpoint.
    #[must_use]
    pub fn metadata_url(&self) -> String {
        format!(
            "{}/api/views/{}.json",
            self.base_url.trim_end_matches('/'),
            self.dataset_id
        )
    }
}

/// A [`ProviderSource`] backed by a Socrata dataset.
#[derive(Debug, Clone)]
pub struct SocrataSource {
    config: SocrataConfig,
    client: reqwest::Client,
}

impl SocrataSource {
    /// Creates a source for the given dataset.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(config: SocrataConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { config, client })
    }

    /// The configuration this source was built with.
    #[must_use]
    pub const fn config(&self) -> &SocrataConfig {
        &self.config
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.config.app_token {
            Some(token) => request.header("X-App-Token", token),
            None => request,
        }
    }
}

#[async_trait]
impl ProviderSource for SocrataSource {
    async fn fetch_all(&self) -> Result<Vec<serde_json::Value>, SourceError> {
        let url = self.config.resource_url();
        let page_size = self.config.page_size.max(1);
        let mut all_records: Vec<serde_json::Value> = Vec::new();
        let mut offset: u64 = 0;

        loop {
            log::debug!("Fetching {url}: offset={offset}, limit={page_size}");
            let limit = page_size.to_string();
            let offset_str = offset.to_string();
            let body = retry::send_json(|| {
                self.get(&url).query(&[
                    ("$limit", limit.as_str()),
                    ("$offset", offset_str.as_str()),
                    ("$order", ":id"),
                ])
            })
            .await?;

            let records = match body {
                serde_json::Value::Array(records) => records,
                other => {
                    return Err(SourceError::Status {
                        message: format!("expected a JSON array of rows, got {}", type_name(&other)),
                    });
                }
            };

            let count = records.len() as u64;
            all_records.extend(records);
            offset += count;

            if count < page_size {
                break;
            }
        }

        log::info!("Downloaded {} rows from {url}", all_records.len());
        Ok(all_records)
    }

    async fn last_update_time(&self) -> Result<DateTime<Utc>, SourceError> {
        let url = self.config.metadata_url();
        let body = retry::send_json(|| self.get(&url)).await?;
        parse_rows_updated_at(&body)
    }

    fn refresh_interval(&self) -> Duration {
        self.config.refresh_interval
    }
}

/// Extracts the dataset's last-update time from a view metadata document.
///
/// Uses `rowsUpdatedAt`, falling back to `viewLastModified`. Both are epoch
/// seconds, as a number or a numeric string.
///
/// # Errors
///
/// Returns [`SourceError::Metadata`] if neither field holds a timestamp.
pub fn parse_rows_updated_at(metadata: &serde_json::Value) -> Result<DateTime<Utc>, SourceError> {
    ["rowsUpdatedAt", "viewLastModified"]
        .iter()
        .filter_map(|field| metadata.get(field))
        .find_map(parse_date_value)
        .ok_or_else(|| SourceError::Metadata {
            message: "no rowsUpdatedAt or viewLastModified timestamp".to_string(),
        })
}

const fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
