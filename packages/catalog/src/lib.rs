#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory food provider catalog.
//!
//! The catalog holds one immutable snapshot of providers keyed by
//! `location_id`. [`Catalog::replace_all`] builds a complete new snapshot and
//! swaps it in with a single pointer store, so readers always see either the
//! whole previous dataset or the whole new one. Reads never take a lock.

pub mod specification;

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use food_map_provider_models::Provider;

pub use specification::{ResultOrder, Specification};

/// One complete generation of the catalog.
#[derive(Debug, Default)]
struct Snapshot {
    /// Incremented on every replace; `0` for the initial empty catalog.
    generation: u64,
    /// Providers in iteration order, unique by `location_id`.
    providers: Arc<[Arc<Provider>]>,
}

/// Atomically replaceable store of the current providers.
#[derive(Debug, Default)]
pub struct Catalog {
    current: ArcSwap<Snapshot>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole catalog with `providers` and returns how many
    /// records the new snapshot holds.
    ///
    /// Providers with an empty `location_id` are skipped. When a key repeats,
    /// the last record wins but keeps the position of the first occurrence.
    pub fn replace_all<I>(&self, providers: I) -> usize
    where
        I: IntoIterator<Item = Provider>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut ordered: Vec<Arc<Provider>> = Vec::new();
        let mut skipped = 0_usize;

        for provider in providers {
            if provider.location_id.is_empty() {
                skipped += 1;
                continue;
            }
            if let Some(&pos) = index.get(&provider.location_id) {
                ordered[pos] = Arc::new(provider);
            } else {
                index.insert(provider.location_id.clone(), ordered.len());
                ordered.push(Arc::new(provider));
            }
        }

        let providers: Arc<[Arc<Provider>]> = ordered.into();
        let count = providers.len();

        let previous = self.current.rcu(|old| Snapshot {
            generation: old.generation + 1,
            providers: Arc::clone(&providers),
        });

        log::info!(
            "Catalog replaced: {count} providers (generation {}, {skipped} without key)",
            previous.generation + 1
        );

        count
    }

    /// Returns every provider in the current snapshot.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<Provider>> {
        self.current.load().providers.to_vec()
    }

    /// Returns the providers satisfying `spec`, ordered by the
    /// specification's [`ResultOrder`] when it declares one and in catalog
    /// order otherwise.
    #[must_use]
    pub fn get_by_spec(&self, spec: &Specification) -> Vec<Arc<Provider>> {
        let snapshot = self.current.load_full();
        let now = Utc::now();

        let matched: Vec<Arc<Provider>> = snapshot
            .providers
            .iter()
            .filter(|p| spec.is_satisfied_at(p, now))
            .cloned()
            .collect();

        spec.order(matched)
    }

    /// Number of providers in the current snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.load().providers.len()
    }

    /// Whether the current snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times the catalog has been replaced.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }
}
