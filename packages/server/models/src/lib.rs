#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the food map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the catalog's [`Provider`] type to allow independent evolution of
//! the API contract.

use chrono::{DateTime, Utc};
use food_map_provider_models::{Permit, PermitStatus, Provider};
use serde::{Deserialize, Serialize};

/// Default number of results for the closest-providers endpoint.
pub const DEFAULT_CLOSEST_LIMIT: usize = 5;

/// A provider's permit as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPermit {
    /// Permit status.
    pub permit_status: PermitStatus,
    /// Upstream permit number.
    pub permit_id: String,
    /// Approval date (ISO 8601).
    pub approval_date: Option<DateTime<Utc>>,
    /// Application received date (ISO 8601).
    pub received_date: Option<DateTime<Utc>>,
    /// Expiration date (ISO 8601).
    pub expiration_date: Option<DateTime<Utc>>,
}

impl From<&Permit> for ApiPermit {
    fn from(permit: &Permit) -> Self {
        Self {
            permit_status: permit.status,
            permit_id: permit.permit_id.clone(),
            approval_date: permit.approval_date,
            received_date: permit.received_date,
            expiration_date: permit.expiration_date,
        }
    }
}

/// A food provider as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProvider {
    /// Unique location ID.
    pub location_id: String,
    /// Business name.
    pub name: String,
    /// Free-text food items.
    pub food_items: String,
    /// Permit details.
    pub permit: ApiPermit,
    /// Latitude, `null` when the provider has no known location.
    pub latitude: Option<f64>,
    /// Longitude, `null` when the provider has no known location.
    pub longitude: Option<f64>,
    /// Location description.
    pub location_description: Option<String>,
    /// Street address.
    pub address: Option<String>,
    /// Assessor block + lot.
    pub blocklot: Option<String>,
    /// Assessor block.
    pub block: Option<String>,
    /// Assessor lot.
    pub lot: Option<String>,
    /// Street centerline network number.
    pub cnn: Option<i64>,
}

impl From<&Provider> for ApiProvider {
    fn from(provider: &Provider) -> Self {
        let (latitude, longitude) = if provider.has_location() {
            (Some(provider.coord.latitude), Some(provider.coord.longitude))
        } else {
            (None, None)
        };

        Self {
            location_id: provider.location_id.clone(),
            name: provider.name.clone(),
            food_items: provider.food_items.clone(),
            permit: ApiPermit::from(&provider.permit),
            latitude,
            longitude,
            location_description: provider.location_description.clone(),
            address: provider.address.clone(),
            blocklot: provider.blocklot.clone(),
            block: provider.block.clone(),
            lot: provider.lot.clone(),
            cnn: provider.cnn,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Providers currently in the catalog.
    pub provider_count: usize,
    /// Number of completed catalog replaces.
    pub generation: u64,
}

/// Error body returned for rejected requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable reason.
    pub error: String,
}

impl ApiError {
    /// Creates an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Query parameters shared by the name and status endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusQueryParams {
    /// Comma-separated permit statuses, combined with OR.
    pub status: Option<String>,
}

/// Query parameters for the closest-providers endpoint.
///
/// Numbers are taken as strings so bad input produces a JSON error body
/// instead of the framework's plain-text rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClosestQueryParams {
    /// Reference latitude.
    pub lat: Option<String>,
    /// Reference longitude.
    pub lng: Option<String>,
    /// Maximum number of results, default [`DEFAULT_CLOSEST_LIMIT`].
    pub limit: Option<String>,
    /// Comma-separated permit statuses. Absent means `APPROVED`; an empty
    /// value disables the status filter.
    pub status: Option<String>,
}
