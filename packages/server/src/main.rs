#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Food map API server binary.
//!
//! Reads configuration from the environment, applies any command-line
//! overrides and runs [`food_map_server::run_server`].

use std::time::Duration;

use clap::Parser;
use food_map_server::ServerConfig;

/// Serve search queries over the SF mobile food facility permit dataset.
#[derive(Parser, Debug)]
#[command(name = "food_map_server", version, about)]
struct Cli {
    /// Address to bind (overrides `BIND_ADDR`).
    #[arg(long)]
    bind_addr: Option<String>,

    /// Port to bind (overrides `PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Socrata host, e.g. `https://data.sfgov.org` (overrides
    /// `SOCRATA_BASE_URL`).
    #[arg(long)]
    socrata_base_url: Option<String>,

    /// Socrata dataset id (overrides `SOCRATA_DATASET_ID`).
    #[arg(long)]
    dataset_id: Option<String>,

    /// Seconds between upstream polls (overrides `REFRESH_INTERVAL_SECS`).
    #[arg(long)]
    refresh_interval_secs: Option<u64>,

    /// Seconds allowed for the startup sync (overrides
    /// `INITIAL_SYNC_TIMEOUT_SECS`).
    #[arg(long)]
    initial_sync_timeout_secs: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(bind_addr) = self.bind_addr {
            config.bind_addr = bind_addr;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(base_url) = self.socrata_base_url {
            config.socrata.base_url = base_url;
        }
        if let Some(dataset_id) = self.dataset_id {
            config.socrata.dataset_id = dataset_id;
        }
        if let Some(secs) = self.refresh_interval_secs {
            config.set_refresh_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.initial_sync_timeout_secs {
            config.initial_sync_timeout = Duration::from_secs(secs);
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env();
    cli.apply(&mut config);

    food_map_server::run_server(config).await.map_err(|e| {
        log::error!("{e}");
        std::io::Error::other(e)
    })
}
