#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Upstream food provider data sources and row mapping.
//!
//! A [`ProviderSource`] knows how to fetch the full raw dataset and when it
//! last changed. The [`mapper`] turns each raw row into a canonical
//! [`food_map_provider_models::Provider`], skipping rows it cannot use.

pub mod mapper;
pub mod parsing;
pub mod retry;
pub mod socrata;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use mapper::{MapError, map_row, map_rows};
pub use socrata::{SocrataConfig, SocrataSource};

/// Refresh interval used when a source does not specify one.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Errors that can occur during data source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream answered with a status the fetcher will not accept.
    #[error("Upstream error: {message}")]
    Status {
        /// Description of what went wrong.
        message: String,
    },

    /// The dataset metadata had no usable last-update timestamp.
    #[error("Metadata error: {message}")]
    Metadata {
        /// Description of what went wrong.
        message: String,
    },
}

/// Trait that all provider data sources must implement.
#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// Fetches every raw row of the dataset, paginating as needed.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if any page cannot be fetched or decoded.
    async fn fetch_all(&self) -> Result<Vec<serde_json::Value>, SourceError>;

    /// Returns when the upstream dataset was last modified.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the metadata cannot be fetched or carries
    /// no parseable timestamp.
    async fn last_update_time(&self) -> Result<DateTime<Utc>, SourceError>;

    /// How often the dataset should be polled for changes.
    fn refresh_interval(&self) -> Duration {
        DEFAULT_REFRESH_INTERVAL
    }
}
