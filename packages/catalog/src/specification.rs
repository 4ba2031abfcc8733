//! Composable query specifications over [`Provider`] records.
//!
//! A [`Specification`] is a boolean expression tree: leaf predicates
//! combined with [`Specification::And`], [`Specification::Or`] and
//! [`Specification::Not`] (or the `&`, `|` and `!` operators). A leaf may
//! also carry a [`ResultOrder`], which the catalog applies to the filtered
//! set. Composites expose the order of whichever child declares one,
//! preferring the left child when both do.

use std::borrow::Borrow;
use std::ops::{BitAnd, BitOr};

use chrono::{DateTime, Utc};
use food_map_provider_models::{Coordinate, PermitStatus, Provider};

/// A predicate over providers, optionally carrying a result ordering.
#[derive(Debug, Clone, PartialEq)]
pub enum Specification {
    /// Permit status equals the given status.
    HasPermitStatus(PermitStatus),
    /// Case-insensitive substring of the provider name.
    LikeName(String),
    /// Case-insensitive substring of the street address. Providers without
    /// an address never match.
    LikeStreetName(String),
    /// Permit expiration strictly before the evaluation instant.
    IsExpired,
    /// Providers with a known location, ranked by distance.
    ClosestToPoint(ResultOrder),
    /// Both sides satisfied.
    And(Box<Self>, Box<Self>),
    /// Either side satisfied.
    Or(Box<Self>, Box<Self>),
    /// Inner specification not satisfied.
    Not(Box<Self>),
}

/// An ordering attached to a leaf specification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultOrder {
    /// Ascending great-circle distance to `reference`, truncated to `limit`.
    NearestTo {
        /// Point distances are measured from.
        reference: Coordinate,
        /// Maximum number of results kept.
        limit: usize,
    },
}

impl Specification {
    /// Providers whose name contains `name`, ignoring case.
    #[must_use]
    pub fn like_name(name: impl Into<String>) -> Self {
        Self::LikeName(name.into())
    }

    /// Providers whose address contains `street`, ignoring case.
    #[must_use]
    pub fn like_street_name(street: impl Into<String>) -> Self {
        Self::LikeStreetName(street.into())
    }

    /// The `limit` located providers nearest to `reference`.
    #[must_use]
    pub const fn closest_to_point(reference: Coordinate, limit: usize) -> Self {
        Self::ClosestToPoint(ResultOrder::NearestTo { reference, limit })
    }

    /// Evaluates the predicate using the current time for time-dependent
    /// leaves.
    #[must_use]
    pub fn is_satisfied_by(&self, provider: &Provider) -> bool {
        self.is_satisfied_at(provider, Utc::now())
    }

    /// Evaluates the predicate as of `now`.
    #[must_use]
    pub fn is_satisfied_at(&self, provider: &Provider, now: DateTime<Utc>) -> bool {
        match self {
            Self::HasPermitStatus(status) => provider.permit.status == *status,
            Self::LikeName(name) => contains_ignore_case(&provider.name, name),
            Self::LikeStreetName(street) => provider
                .address
                .as_deref()
                .is_some_and(|address| contains_ignore_case(address, street)),
            Self::IsExpired => provider.permit.is_expired_at(now),
            Self::ClosestToPoint(_) => provider.has_location(),
            Self::And(left, right) => {
                left.is_satisfied_at(provider, now) && right.is_satisfied_at(provider, now)
            }
            Self::Or(left, right) => {
                left.is_satisfied_at(provider, now) || right.is_satisfied_at(provider, now)
            }
            Self::Not(inner) => !inner.is_satisfied_at(provider, now),
        }
    }

    /// The ordering this specification imposes on its results, if any.
    #[must_use]
    pub fn ordering(&self) -> Option<&ResultOrder> {
        match self {
            Self::ClosestToPoint(order) => Some(order),
            Self::And(left, right) | Self::Or(left, right) => {
                left.ordering().or_else(|| right.ordering())
            }
            Self::Not(inner) => inner.ordering(),
            Self::HasPermitStatus(_)
            | Self::LikeName(_)
            | Self::LikeStreetName(_)
            | Self::IsExpired => None,
        }
    }

    /// Applies [`Self::ordering`] to `items`, or returns them unchanged.
    #[must_use]
    pub fn order<P: Borrow<Provider>>(&self, items: Vec<P>) -> Vec<P> {
        match self.ordering() {
            Some(order) => order.apply(items),
            None => items,
        }
    }
}

impl ResultOrder {
    /// Orders and truncates `items`.
    ///
    /// Providers at the null coordinate are dropped. Equal distances keep
    /// their input order.
    #[must_use]
    pub fn apply<P: Borrow<Provider>>(&self, items: Vec<P>) -> Vec<P> {
        match self {
            Self::NearestTo { reference, limit } => {
                let mut ranked: Vec<(f64, P)> = items
                    .into_iter()
                    .filter(|p| p.borrow().has_location())
                    .map(|p| (reference.distance_to(&p.borrow().coord), p))
                    .collect();
                ranked.sort_by(|(a, _), (b, _)| a.total_cmp(b));
                ranked.truncate(*limit);
                ranked.into_iter().map(|(_, p)| p).collect()
            }
        }
    }
}

impl BitAnd for Specification {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Specification {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::Or(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Not for Specification {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
