#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical food provider types.
//!
//! Every upstream row that survives the row mapper becomes a [`Provider`].
//! The catalog, the query layer and the API all work in terms of these
//! types; nothing else reaches the catalog.

pub mod coordinate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use coordinate::{Coordinate, CoordinateError};

/// Lifecycle status of a mobile food facility permit.
///
/// Parsing via [`std::str::FromStr`] is case-insensitive (`"expired"`,
/// `"EXPIRED"` and `"Expired"` are all accepted).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum PermitStatus {
    /// Permit approved and active.
    Approved,
    /// Permit past its expiration.
    Expired,
    /// Application submitted, not yet decided.
    Requested,
    /// Permit suspended.
    Suspend,
    /// Permit issued.
    Issued,
}

impl PermitStatus {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Approved,
            Self::Expired,
            Self::Requested,
            Self::Suspend,
            Self::Issued,
        ]
    }
}

/// The permit attached to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit {
    /// Current permit status.
    pub status: PermitStatus,
    /// Upstream permit number (e.g. `"21MFF-00106"`). May be empty.
    pub permit_id: String,
    /// When the permit was approved.
    pub approval_date: Option<DateTime<Utc>>,
    /// When the application was received.
    pub received_date: Option<DateTime<Utc>>,
    /// When the permit expires.
    pub expiration_date: Option<DateTime<Utc>>,
}

impl Permit {
    /// Whether the permit has an expiration date strictly before `now`.
    /// A permit without an expiration date never counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|exp| exp < now)
    }
}

/// A mobile food provider location, keyed by [`Provider::location_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// Unique upstream location identifier. Never empty once mapped.
    pub location_id: String,
    /// Applicant (business) name.
    pub name: String,
    /// Free-text list of food items.
    pub food_items: String,
    /// Permit details.
    pub permit: Permit,
    /// Location. [`Coordinate::NULL`] when the row had none.
    pub coord: Coordinate,
    /// Human description of the location (e.g. cross streets).
    pub location_description: Option<String>,
    /// Assessor block + lot.
    pub blocklot: Option<String>,
    /// Assessor block.
    pub block: Option<String>,
    /// Assessor lot.
    pub lot: Option<String>,
    /// Centerline network number of the street segment.
    pub cnn: Option<i64>,
    /// Street address.
    pub address: Option<String>,
}

impl Provider {
    /// Whether the provider has a usable location (not the null sentinel).
    #[must_use]
    pub fn has_location(&self) -> bool {
        !self.coord.is_null()
    }
}
