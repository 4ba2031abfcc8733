#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Background refresh of the provider catalog.
//!
//! The [`RefreshScheduler`] polls the upstream source's last-update time
//! and, whenever it changes, fetches every row, maps it and bulk-replaces
//! the [`Catalog`]. Between polls the worker sleeps for the refresh
//! interval or until [`RefreshScheduler::stop`] cancels it.
//!
//! ```text
//! STOPPED --start--> RUNNING --stop--> STOPPED
//! RUNNING: CHECK -> (FETCH + MAP + REPLACE | SKIP) -> WAIT -> CHECK
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use food_map_catalog::Catalog;
use food_map_source::{ProviderSource, SourceError, map_rows};
use futures::FutureExt as _;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shortest allowed wait between two cycles.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Why a refresh cycle was abandoned.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// The upstream last-update time could not be read.
    #[error("failed to read upstream update time: {0}")]
    LastUpdate(#[source] SourceError),

    /// The upstream rows could not be fetched.
    #[error("failed to fetch upstream rows: {0}")]
    Fetch(#[source] SourceError),
}

/// Result of a single refresh cycle.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Upstream has not changed since the last successful replace.
    Unchanged,
    /// The catalog was replaced.
    Replaced {
        /// Number of providers in the new catalog.
        providers: usize,
        /// Upstream last-update time that was loaded.
        updated_at: DateTime<Utc>,
    },
    /// The cycle failed; the catalog and last-seen time are untouched.
    Failed(RefreshError),
}

impl RefreshOutcome {
    /// Whether the cycle ended without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// State owned by the cycle lock.
#[derive(Debug, Default)]
struct CycleState {
    /// Upstream update time of the last successful replace.
    last_seen: Option<DateTime<Utc>>,
}

struct Inner {
    source: Arc<dyn ProviderSource>,
    catalog: Arc<Catalog>,
    cycle: Mutex<CycleState>,
}

impl Inner {
    async fn run_once(&self) -> RefreshOutcome {
        // Held for the whole cycle so cycles never overlap.
        let mut state = self.cycle.lock().await;

        let updated_at = match self.source.last_update_time().await {
            Ok(updated_at) => updated_at,
            Err(e) => {
                let e = RefreshError::LastUpdate(e);
                log::error!("Refresh cycle failed: {e}");
                return RefreshOutcome::Failed(e);
            }
        };

        if state.last_seen == Some(updated_at) {
            log::debug!("Upstream unchanged since {updated_at}");
            return RefreshOutcome::Unchanged;
        }

        log::info!("Upstream updated at {updated_at}, refreshing catalog");

        let rows = match self.source.fetch_all().await {
            Ok(rows) => rows,
            Err(e) => {
                let e = RefreshError::Fetch(e);
                log::error!("Refresh cycle failed: {e}");
                return RefreshOutcome::Failed(e);
            }
        };

        let providers = self.catalog.replace_all(map_rows(&rows));
        state.last_seen = Some(updated_at);

        RefreshOutcome::Replaced {
            providers,
            updated_at,
        }
    }
}

struct Worker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the background refresh worker for one catalog.
pub struct RefreshScheduler {
    inner: Arc<Inner>,
    interval: Option<Duration>,
    worker: Mutex<Option<Worker>>,
}

impl RefreshScheduler {
    /// Creates a stopped scheduler that refreshes `catalog` from `source`.
    #[must_use]
    pub fn new(source: Arc<dyn ProviderSource>, catalog: Arc<Catalog>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                catalog,
                cycle: Mutex::new(CycleState::default()),
            }),
            interval: None,
            worker: Mutex::new(None),
        }
    }

    /// Overrides the source's refresh interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Wait between cycles: the override if set, else the source's interval,
    /// never less than [`MIN_INTERVAL`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
            .unwrap_or_else(|| self.inner.source.refresh_interval())
            .max(MIN_INTERVAL)
    }

    /// Runs one refresh cycle now, waiting for any in-flight cycle first.
    ///
    /// Errors are logged and reported in the outcome, never propagated.
    pub async fn run_once(&self) -> RefreshOutcome {
        self.inner.run_once().await
    }

    /// Upstream update time of the last successful replace.
    pub async fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.inner.cycle.lock().await.last_seen
    }

    /// Starts the background worker. Does nothing if it is already running.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            log::debug!("Refresh scheduler already running");
            return;
        }

        let token = CancellationToken::new();
        let interval = self.interval();
        log::info!("Starting refresh scheduler (interval {interval:?})");
        let handle = tokio::spawn(run_loop(Arc::clone(&self.inner), interval, token.clone()));

        *worker = Some(Worker { token, handle });
    }

    /// Stops the background worker and waits for it to exit. An in-flight
    /// cycle is allowed to finish. Does nothing if the worker is not running.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        let Some(Worker { token, handle }) = worker.take() else {
            return;
        };

        token.cancel();
        if let Err(e) = handle.await {
            log::error!("Refresh worker ended abnormally: {e}");
        }
        log::info!("Refresh scheduler stopped");
    }

    /// Whether the background worker is running.
    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut() {
            worker.token.cancel();
        }
    }
}

async fn run_loop(inner: Arc<Inner>, interval: Duration, token: CancellationToken) {
    loop {
        if let Err(panic) = AssertUnwindSafe(inner.run_once()).catch_unwind().await {
            log::error!("Refresh cycle panicked: {}", panic_message(&*panic));
        }

        tokio::select! {
            biased;

            () = token.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeSource {
        updated_at: AtomicI64,
        fail_metadata: AtomicBool,
        fail_fetch: AtomicBool,
        panic_fetch: AtomicBool,
        hold_fetch: AtomicBool,
        release: Notify,
        metadata_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
    }

    impl FakeSource {
        fn at(ts: i64) -> Arc<Self> {
            let source = Self::default();
            source.updated_at.store(ts, Ordering::SeqCst);
            Arc::new(source)
        }

        fn fetches(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderSource for FakeSource {
        async fn fetch_all(&self) -> Result<Vec<serde_json::Value>, SourceError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            assert!(
                !self.panic_fetch.swap(false, Ordering::SeqCst),
                "simulated fetch panic"
            );
            if self.hold_fetch.load(Ordering::SeqCst) {
                self.release.notified().await;
            }
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(SourceError::Status {
                    message: "HTTP 503 Service Unavailable".to_string(),
                });
            }
            let ts = self.updated_at.load(Ordering::SeqCst);
            Ok(vec![
                json!({"locationid": "A", "applicant": format!("A@{ts}"), "latitude": "37.7", "longitude": "-122.4"}),
                json!({"locationid": "B", "applicant": "B", "status": "EXPIRED"}),
                json!({"applicant": "keyless"}),
            ])
        }

        async fn last_update_time(&self) -> Result<DateTime<Utc>, SourceError> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_metadata.load(Ordering::SeqCst) {
                return Err(SourceError::Metadata {
                    message: "no rowsUpdatedAt".to_string(),
                });
            }
            let ts = self.updated_at.load(Ordering::SeqCst);
            Ok(DateTime::from_timestamp(ts, 0).unwrap())
        }
    }

    fn scheduler(source: &Arc<FakeSource>) -> (RefreshScheduler, Arc<Catalog>) {
        let catalog = Arc::new(Catalog::new());
        let scheduler = RefreshScheduler::new(source.clone(), Arc::clone(&catalog));
        (scheduler, catalog)
    }

    async fn wait_for_fetches(source: &FakeSource, fetches: usize) {
        for _ in 0..200 {
            if source.fetches() >= fetches {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("source never reached {fetches} fetches");
    }

    async fn wait_for_generation(catalog: &Catalog, generation: u64) {
        for _ in 0..200 {
            if catalog.generation() >= generation {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("catalog never reached generation {generation}");
    }

    #[tokio::test]
    async fn unchanged_upstream_replaces_once() {
        let source = FakeSource::at(1_700_000_000);
        let (scheduler, catalog) = scheduler(&source);

        let first = scheduler.run_once().await;
        assert!(matches!(first, RefreshOutcome::Replaced { providers: 2, .. }));
        let second = scheduler.run_once().await;
        assert!(matches!(second, RefreshOutcome::Unchanged));

        assert_eq!(source.fetches(), 1);
        assert_eq!(source.metadata_calls.load(Ordering::SeqCst), 2);
        assert_eq!(catalog.generation(), 1);
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn changed_upstream_replaces_again() {
        let source = FakeSource::at(1_700_000_000);
        let (scheduler, catalog) = scheduler(&source);

        scheduler.run_once().await;
        source.updated_at.store(1_700_000_600, Ordering::SeqCst);
        let outcome = scheduler.run_once().await;

        assert!(matches!(outcome, RefreshOutcome::Replaced { .. }));
        assert_eq!(source.fetches(), 2);
        assert_eq!(catalog.generation(), 2);
        let a = catalog.get_all().into_iter().find(|p| p.location_id == "A").unwrap();
        assert_eq!(a.name, "A@1700000600");
        assert_eq!(
            scheduler.last_seen().await.map(|t| t.timestamp()),
            Some(1_700_000_600)
        );
    }

    #[tokio::test]
    async fn metadata_failure_keeps_catalog_and_last_seen() {
        let source = FakeSource::at(1_700_000_000);
        let (scheduler, catalog) = scheduler(&source);
        scheduler.run_once().await;
        let before = scheduler.last_seen().await;

        source.fail_metadata.store(true, Ordering::SeqCst);
        source.updated_at.store(1_800_000_000, Ordering::SeqCst);
        let outcome = scheduler.run_once().await;

        assert!(matches!(
            outcome,
            RefreshOutcome::Failed(RefreshError::LastUpdate(_))
        ));
        assert!(!outcome.is_success());
        assert_eq!(source.fetches(), 1);
        assert_eq!(catalog.generation(), 1);
        assert_eq!(catalog.len(), 2);
        assert_eq!(scheduler.last_seen().await, before);
    }

    #[tokio::test]
    async fn fetch_failure_is_retried_next_cycle() {
        let source = FakeSource::at(1_700_000_000);
        source.fail_fetch.store(true, Ordering::SeqCst);
        let (scheduler, catalog) = scheduler(&source);

        let outcome = scheduler.run_once().await;
        assert!(matches!(outcome, RefreshOutcome::Failed(RefreshError::Fetch(_))));
        assert!(catalog.is_empty());
        assert_eq!(scheduler.last_seen().await, None);

        source.fail_fetch.store(false, Ordering::SeqCst);
        let outcome = scheduler.run_once().await;
        assert!(outcome.is_success());
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn interval_prefers_override_and_has_floor() {
        let source = FakeSource::at(0);
        let (scheduler, _) = scheduler(&source);
        assert_eq!(scheduler.interval(), Duration::from_secs(3600));

        let scheduler = scheduler.with_interval(Duration::from_secs(30));
        assert_eq!(scheduler.interval(), Duration::from_secs(30));

        let scheduler = scheduler.with_interval(Duration::ZERO);
        assert_eq!(scheduler.interval(), MIN_INTERVAL);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let source = FakeSource::at(1_700_000_000);
        let (scheduler, catalog) = scheduler(&source);

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);

        scheduler.start().await;
        scheduler.start().await;
        assert!(scheduler.is_running().await);
        wait_for_generation(&catalog, 1).await;

        let stopped = tokio::time::timeout(Duration::from_secs(5), scheduler.stop()).await;
        assert!(stopped.is_ok(), "stop did not interrupt the wait");
        scheduler.stop().await;

        assert!(!scheduler.is_running().await);
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn restart_after_stop_runs_again() {
        let source = FakeSource::at(1_700_000_000);
        let (scheduler, catalog) = scheduler(&source);

        scheduler.start().await;
        wait_for_generation(&catalog, 1).await;
        scheduler.stop().await;

        source.updated_at.store(1_700_000_001, Ordering::SeqCst);
        scheduler.start().await;
        wait_for_generation(&catalog, 2).await;
        scheduler.stop().await;

        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_panicking_cycle() {
        let source = FakeSource::at(1_700_000_000);
        source.panic_fetch.store(true, Ordering::SeqCst);
        let (scheduler, catalog) = scheduler(&source);
        let scheduler = scheduler.with_interval(Duration::from_secs(1));

        scheduler.start().await;
        wait_for_generation(&catalog, 1).await;
        scheduler.stop().await;

        assert_eq!(source.fetches(), 2);
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_cycles_run_one_at_a_time() {
        let source = FakeSource::at(1_700_000_000);
        source.hold_fetch.store(true, Ordering::SeqCst);
        let (scheduler, catalog) = scheduler(&source);

        let release = async {
            wait_for_fetches(&source, 1).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(source.metadata_calls.load(Ordering::SeqCst), 1);
            source.release.notify_one();
        };

        let joined = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(scheduler.run_once(), scheduler.run_once(), release)
        })
        .await;
        let (first, second, ()) = joined.expect("cycles deadlocked");

        let replaced = [&first, &second]
            .iter()
            .filter(|o| matches!(o, RefreshOutcome::Replaced { .. }))
            .count();
        assert_eq!(replaced, 1);
        assert!(matches!(second, RefreshOutcome::Unchanged));
        assert_eq!(source.fetches(), 1);
        assert_eq!(catalog.generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_in_flight_cycle() {
        let source = FakeSource::at(1_700_000_000);
        source.hold_fetch.store(true, Ordering::SeqCst);
        let (scheduler, catalog) = scheduler(&source);
        let scheduler = scheduler.with_interval(Duration::from_secs(1));

        scheduler.start().await;
        wait_for_fetches(&source, 1).await;

        let stop = scheduler.stop();
        tokio::pin!(stop);
        let early = tokio::time::timeout(Duration::from_millis(500), &mut stop).await;
        assert!(early.is_err(), "stop returned while a fetch was in flight");
        assert_eq!(catalog.generation(), 0);

        source.release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), stop)
            .await
            .expect("stop never returned");
        assert_eq!(catalog.generation(), 1);
        assert!(!scheduler.is_running().await);

        source.hold_fetch.store(false, Ordering::SeqCst);
        source.updated_at.store(1_700_000_600, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(catalog.generation(), 1);
        assert_eq!(source.fetches(), 1);
    }
}
