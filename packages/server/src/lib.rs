#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the food map application.
//!
//! Serves read-only search queries over the in-memory provider catalog.
//! The catalog is filled by one synchronous refresh at startup and kept
//! current by the background [`RefreshScheduler`].

pub mod config;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use food_map_catalog::Catalog;
use food_map_refresh::{RefreshError, RefreshOutcome, RefreshScheduler};
use food_map_source::{ProviderSource, SocrataSource, SourceError};

pub use config::ServerConfig;

/// Shared application state.
pub struct AppState {
    /// The provider catalog queried by every handler.
    pub catalog: Arc<Catalog>,
}

/// Errors that prevent the server from starting or keep it from running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The upstream source could not be built.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The startup refresh failed.
    #[error("Initial sync failed: {0}")]
    InitialSync(#[source] RefreshError),

    /// The startup refresh did not finish in time.
    #[error("Initial sync timed out after {0:?}")]
    InitialSyncTimeout(Duration),

    /// Binding or running the HTTP server failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the server owns for its lifetime.
pub struct AppContext {
    /// Runtime configuration.
    pub config: ServerConfig,
    /// The provider catalog.
    pub catalog: Arc<Catalog>,
    /// Background refresher for [`Self::catalog`].
    pub scheduler: RefreshScheduler,
}

impl AppContext {
    /// Wires a fresh catalog and a stopped scheduler to `source`.
    #[must_use]
    pub fn new(config: ServerConfig, source: Arc<dyn ProviderSource>) -> Self {
        let catalog = Arc::new(Catalog::new());
        let scheduler = RefreshScheduler::new(source, Arc::clone(&catalog));
        Self {
            config,
            catalog,
            scheduler,
        }
    }

    /// Runs one refresh cycle bounded by the configured initial-sync
    /// timeout and returns how many providers were loaded.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InitialSync`] if the cycle fails or
    /// [`ServerError::InitialSyncTimeout`] if it does not finish in time.
    pub async fn initial_sync(&self) -> Result<usize, ServerError> {
        let timeout = self.config.initial_sync_timeout;
        log::info!("Running initial sync (timeout {timeout:?})...");

        match tokio::time::timeout(timeout, self.scheduler.run_once()).await {
            Err(_) => Err(ServerError::InitialSyncTimeout(timeout)),
            Ok(RefreshOutcome::Failed(e)) => Err(ServerError::InitialSync(e)),
            Ok(RefreshOutcome::Unchanged | RefreshOutcome::Replaced { .. }) => {
                let count = self.catalog.len();
                log::info!("Initial sync loaded {count} providers");
                Ok(count)
            }
        }
    }
}

/// Registers the health check and the food provider routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health)).service(
        web::scope("/api/v1/food-providers")
            .route("/name/{name}", web::get().to(handlers::by_name))
            .route("/street/{street}", web::get().to(handlers::by_street))
            .route("/closest", web::get().to(handlers::closest))
            .route("/status", web::get().to(handlers::by_status)),
    );
}

/// Starts the food map API server.
///
/// Builds the Socrata source, runs the initial sync (refusing to start if
/// it fails), starts the refresh scheduler and serves until the server is
/// shut down, then stops the scheduler. This is a regular async function;
/// the caller provides the runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError`] if the source cannot be built, the initial sync
/// fails, or the HTTP server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let source = SocrataSource::new(config.socrata.clone())?;
    log::info!(
        "Using Socrata dataset {} at {}",
        config.socrata.dataset_id,
        config.socrata.base_url
    );

    let context = AppContext::new(config, Arc::new(source));
    context.initial_sync().await?;
    context.scheduler.start().await;

    let state = web::Data::new(AppState {
        catalog: Arc::clone(&context.catalog),
    });

    let bind_addr = context.config.bind_addr.clone();
    let port = context.config.port;
    log::info!("Starting server on {bind_addr}:{port}");

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port));

    let result = match server {
        Ok(server) => server.run().await,
        Err(e) => Err(e),
    };

    log::info!("Shutting down refresh scheduler...");
    context.scheduler.stop().await;

    result.map_err(ServerError::from)
}
