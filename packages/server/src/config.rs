//! Server configuration read from the environment.

use std::time::Duration;

use food_map_source::SocrataConfig;
use food_map_source::socrata::{DEFAULT_BASE_URL, DEFAULT_DATASET_ID};

/// Default bind address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// Default port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default seconds between upstream polls.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;

/// Default seconds the startup sync may take before the server gives up.
pub const DEFAULT_INITIAL_SYNC_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration of the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind (`BIND_ADDR`).
    pub bind_addr: String,
    /// Port to bind (`PORT`).
    pub port: u16,
    /// Upstream dataset (`SOCRATA_BASE_URL`, `SOCRATA_DATASET_ID`,
    /// `SOCRATA_APP_TOKEN`, `REFRESH_INTERVAL_SECS`).
    pub socrata: SocrataConfig,
    /// Upper bound on the startup sync (`INITIAL_SYNC_TIMEOUT_SECS`).
    pub initial_sync_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    /// Reads the configuration from process environment variables, using
    /// defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| non_empty(key).and_then(|v| v.trim().parse::<u64>().ok());

        let refresh_secs = parsed("REFRESH_INTERVAL_SECS")
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS)
            .max(1);

        Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            port: non_empty("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            socrata: SocrataConfig {
                base_url: non_empty("SOCRATA_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                dataset_id: non_empty("SOCRATA_DATASET_ID")
                    .unwrap_or_else(|| DEFAULT_DATASET_ID.to_string()),
                app_token: non_empty("SOCRATA_APP_TOKEN"),
                refresh_interval: Duration::from_secs(refresh_secs),
                ..SocrataConfig::default()
            },
            initial_sync_timeout: Duration::from_secs(
                parsed("INITIAL_SYNC_TIMEOUT_SECS").unwrap_or(DEFAULT_INITIAL_SYNC_TIMEOUT_SECS),
            ),
        }
    }

    /// Sets the refresh interval, clamped to at least one second.
    pub fn set_refresh_interval(&mut self, interval: Duration) {
        self.socrata.refresh_interval = interval.max(Duration::from_secs(1));
    }
}
