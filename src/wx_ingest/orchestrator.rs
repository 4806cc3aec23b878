// wx_ingest - Aviation weather ingestion orchestrator
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! Ingestion orchestrator (C5, section 4.4) — the hard subsystem. Drives a
//! fixed state machine (`INIT -> FETCHING -> VALIDATING -> PROCESSING ->
//! DONE`, with `NO_DATA`/`FETCH_FAILED`/`INVALID_DATA`/`UPLOAD_FAILED` as
//! terminal failures) for a single station, a parallel batch, or a schedule.
//! The only source-specific step is [`SourceAdapter::fetch`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;

use crate::client::NoaaClient;
use crate::error::{IngestError, IngestErrorKind, IngestResult};
use crate::metrics::{IngestionMetrics, IngestionResult, MetricsSnapshot};
use crate::model::noaa::ReportType;
use crate::model::report::Report;
use crate::parser::Parser;
use crate::processor::enrich_and_upload;
use crate::upload::BlobStore;

const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 10;
const BATCH_BUDGET: Duration = Duration::from_secs(2 * 60);
const WORKER_SHUTDOWN_GRACE: Duration = Duration::from_secs(60);
const TIMER_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// The per-source fetch step the template algorithm defers to (section 4.4:
/// "the only subclassed step is `fetchFromSource(stationId)`"). A single
/// `fetch` method stands in for what would otherwise be an abstract base
/// class with one abstract method.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, station_id: &str) -> IngestResult<Report>;
}

/// A `SourceAdapter` over the upstream NOAA client and a pluggable text
/// parser, specialized by report type (NOAA METAR, NOAA TAF).
pub struct NoaaSourceAdapter {
    client: NoaaClient,
    parser: Arc<dyn Parser>,
    report_type: ReportType,
}

impl NoaaSourceAdapter {
    pub fn new(client: NoaaClient, parser: Arc<dyn Parser>, report_type: ReportType) -> Self {
        Self {
            client,
            parser,
            report_type,
        }
    }

    pub fn metar(client: NoaaClient, parser: Arc<dyn Parser>) -> Self {
        Self::new(client, parser, ReportType::Metar)
    }

    pub fn taf(client: NoaaClient, parser: Arc<dyn Parser>) -> Self {
        Self::new(client, parser, ReportType::Taf)
    }
}

#[async_trait]
impl SourceAdapter for NoaaSourceAdapter {
    async fn fetch(&self, station_id: &str) -> IngestResult<Report> {
        let records = self
            .client
            .fetch_reports(&self.report_type, &[station_id.to_string()])
            .await?;
        let record = records.into_iter().next().ok_or_else(|| IngestError::no_data(station_id))?;
        self.parser.parse(&self.report_type, &record.raw_data).into_ingest_result()
    }
}

/// A cancellation handle for a scheduled periodic ingestion run
/// (`schedulePeriodicIngestion`, section 4.4).
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Drives the state machine in section 4.4 for a single `SourceAdapter`.
pub struct IngestionOrchestrator<A: SourceAdapter> {
    adapter: A,
    store: Arc<dyn BlobStore>,
    metrics: Arc<IngestionMetrics>,
    fetch_workers: Arc<Semaphore>,
    max_concurrent_fetches: usize,
    shut_down: Arc<AtomicBool>,
    scheduled_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<A: SourceAdapter + 'static> IngestionOrchestrator<A> {
    pub fn new(adapter: A, store: Arc<dyn BlobStore>) -> Self {
        Self::with_concurrency(adapter, store, DEFAULT_MAX_CONCURRENT_FETCHES)
    }

    pub fn with_concurrency(adapter: A, store: Arc<dyn BlobStore>, max_concurrent_fetches: usize) -> Self {
        Self {
            adapter,
            store,
            metrics: Arc::new(IngestionMetrics::new()),
            fetch_workers: Arc::new(Semaphore::new(max_concurrent_fetches)),
            max_concurrent_fetches,
            shut_down: Arc::new(AtomicBool::new(false)),
            scheduled_tasks: Mutex::new(Vec::new()),
        }
    }

    fn check_not_shut_down(&self) -> IngestResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(IngestError::invalid_input("orchestrator has been shut down"));
        }
        Ok(())
    }

    /// `ingestStation(stationId) → report | error` (section 4.4): runs the
    /// full state machine and attaches `ingestion_duration_ms`.
    pub async fn ingest_station(&self, station_id: &str) -> IngestResult<Report> {
        self.check_not_shut_down()?;
        let start = std::time::Instant::now();

        // INIT -> FETCHING
        self.metrics.record_fetch_attempt();
        let report = match self.adapter.fetch(station_id).await {
            Ok(report) => report,
            Err(e) if matches!(e.kind(), IngestErrorKind::NoData) => {
                // FETCHING -> NO_DATA
                self.metrics.record_no_data();
                return Err(e);
            }
            Err(e) => {
                // FETCHING -> FETCH_FAILED
                self.metrics.record_fetch_failure();
                return Err(e);
            }
        };

        // FETCHING -> VALIDATING
        self.metrics.record_fetch_success();

        if let Err(e) = self.validate(station_id, &report) {
            // VALIDATING -> INVALID_DATA
            self.metrics.record_fetch_failure();
            return Err(e);
        }

        // VALIDATING -> PROCESSING -> DONE | UPLOAD_FAILED
        match enrich_and_upload(self.store.as_ref(), report).await {
            Ok(mut report) => {
                self.metrics.record_upload_success();
                let elapsed_ms = start.elapsed().as_millis() as u64;
                report.envelope_mut().add_metadata("ingestion_duration_ms", elapsed_ms);
                Ok(report)
            }
            Err(e) => {
                self.metrics.record_upload_failure();
                Err(e)
            }
        }
    }

    /// Source-specific validation (NOAA variant, section 4.4): `stationId`
    /// and `rawText` must be non-empty.
    fn validate(&self, station_id: &str, report: &Report) -> IngestResult<()> {
        let envelope = report.envelope();
        if envelope.station_id.trim().is_empty() {
            return Err(IngestError::invalid_data(station_id, "stationId must not be empty"));
        }
        if report.raw_text().trim().is_empty() {
            return Err(IngestError::invalid_data(station_id, "rawText must not be empty"));
        }
        Ok(())
    }

    /// `ingestStationsBatch(stationIds) → list<report>` (section 4.4): fans
    /// out over the fixed worker pool, waits with a 2-minute total budget.
    /// Per-station failures are swallowed; observe them via metrics.
    pub async fn ingest_stations_batch(&self, station_ids: &[String]) -> Vec<Report> {
        let fan_out = stream::iter(station_ids.iter().cloned())
            .map(|station_id| {
                let workers = Arc::clone(&self.fetch_workers);
                async move {
                    let _permit = workers.acquire().await.ok()?;
                    self.ingest_station(&station_id).await.ok()
                }
            })
            .buffer_unordered(station_ids.len().max(1));

        match tokio::time::timeout(BATCH_BUDGET, fan_out.collect::<Vec<_>>()).await {
            Ok(results) => results.into_iter().flatten().collect(),
            Err(_) => {
                tracing::warn!(message = "ingest_stations_batch exceeded its 2-minute budget");
                Vec::new()
            }
        }
    }

    /// `ingestStationsSequential(stationIds) → IngestionResult` (section
    /// 4.4): the failure-visible variant.
    pub async fn ingest_stations_sequential(&self, station_ids: &[String]) -> IngestionResult {
        let start = std::time::Instant::now();
        let mut successes = Vec::new();
        let mut failures = HashMap::new();

        for station_id in station_ids {
            match self.ingest_station(station_id).await {
                Ok(report) => successes.push(report),
                Err(e) => {
                    tracing::error!(message = "station ingestion failed", station_id = %station_id, error = %e);
                    failures.insert(station_id.clone(), e);
                }
            }
        }

        IngestionResult::new(successes, failures, start.elapsed())
    }

    /// `metricsSnapshot()` (section 4.4).
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The shared counter set backing [`Self::metrics_snapshot`], for wiring
    /// into the `/metrics` HTTP surface.
    pub fn metrics_handle(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// `isHealthy()` (section 4.4).
    pub fn is_healthy(&self) -> bool {
        self.metrics.snapshot().is_healthy()
    }

    /// `shutdown()` (section 4.4/5): two-phase graceful release (60 s for
    /// the worker pool, 10 s for the timer pool), then forceful
    /// cancellation of whatever remains.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);

        let drain = self.fetch_workers.acquire_many(self.max_concurrent_fetches as u32);
        if tokio::time::timeout(WORKER_SHUTDOWN_GRACE, drain).await.is_err() {
            tracing::warn!(message = "worker pool did not drain within the graceful window");
        }

        let mut tasks: Vec<JoinHandle<()>> = {
            let mut guard = self.scheduled_tasks.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        // Cancel tokens first so the loops exit on their own; only abort
        // whatever is still running once the grace window lapses.
        for task in &tasks {
            if !task.is_finished() {
                task.abort_handle().abort();
            }
        }
        tasks.retain(|t| !t.is_finished());
        if tokio::time::timeout(TIMER_SHUTDOWN_GRACE, futures::future::join_all(tasks)).await.is_err() {
            tracing::warn!(message = "timer pool did not release within the graceful window");
        }

        tracing::info!(message = "orchestrator shutdown complete");
    }
}

impl<A: SourceAdapter + Send + Sync + 'static> IngestionOrchestrator<A> {
    /// `schedulePeriodicIngestion(stationIds, intervalSeconds) →
    /// cancelToken` (section 4.4): first run immediate, subsequent runs
    /// fixed-rate at `intervalSeconds` after the start of the prior run.
    /// Overlapping runs are avoided by skipping a tick if the previous run
    /// has not completed (see DESIGN.md). `interval_seconds` is clamped to
    /// at least 1: `tokio::time::interval` panics on a zero period, and the
    /// spec forbids panicking on valid (including zero) CLI input.
    pub fn schedule_periodic_ingestion(self: &Arc<Self>, station_ids: Vec<String>, interval_seconds: u64) -> CancelToken {
        let token = CancelToken::new();
        let orchestrator = Arc::clone(self);
        let task_token = token.clone();
        let running = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = task_token.notify.notified() => break,
                }
                if task_token.is_cancelled() {
                    break;
                }

                if running.swap(true, Ordering::AcqRel) {
                    tracing::info!(message = "skipping scheduled tick: previous run still in progress");
                    continue;
                }

                let orchestrator = Arc::clone(&orchestrator);
                let running = Arc::clone(&running);
                let station_ids = station_ids.clone();
                tokio::spawn(async move {
                    let _ = orchestrator.ingest_stations_batch(&station_ids).await;
                    running.store(false, Ordering::Release);
                });
            }
        });

        self.scheduled_tasks.lock().unwrap().push(handle);
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RegexMetarParser;
    use crate::upload::in_memory_store;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_metar(station: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![serde_json::json!({
                "reportType": "METAR",
                "stationId": station,
                "rawData": format!("METAR {} 311200Z 18010KT 10SM CLR 25/18 A2992", station),
            })]))
            .mount(&server)
            .await;
        server
    }

    fn orchestrator(base_url: String) -> IngestionOrchestrator<NoaaSourceAdapter> {
        let client = NoaaClient::new(base_url).unwrap();
        let adapter = NoaaSourceAdapter::metar(client, Arc::new(RegexMetarParser));
        IngestionOrchestrator::new(adapter, Arc::new(in_memory_store()))
    }

    #[tokio::test]
    async fn ingest_station_happy_path_increments_fetch_and_upload_successes() {
        let server = server_with_metar("KJFK").await;
        let orchestrator = orchestrator(server.uri());

        let report = orchestrator.ingest_station("KJFK").await.unwrap();
        assert!(report.envelope().metadata.contains_key("ingestion_duration_ms"));

        let snapshot = orchestrator.metrics_snapshot();
        assert_eq!(snapshot.fetch_attempts, 1);
        assert_eq!(snapshot.fetch_successes, 1);
        assert_eq!(snapshot.upload_successes, 1);
    }

    #[tokio::test]
    async fn ingest_station_empty_upstream_yields_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
            .mount(&server)
            .await;
        let orchestrator = orchestrator(server.uri());

        let err = orchestrator.ingest_station("KZZZ").await.unwrap_err();
        assert!(matches!(err.kind(), IngestErrorKind::NoData));

        let snapshot = orchestrator.metrics_snapshot();
        assert_eq!(snapshot.no_data_count, 1);
        assert_eq!(snapshot.fetch_failures, 0);
    }

    #[tokio::test]
    async fn ingest_stations_batch_completes_with_partial_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![serde_json::json!({
                "reportType": "METAR",
                "stationId": "KJFK",
                "rawData": "METAR KJFK 311200Z 18010KT 10SM CLR 25/18 A2992",
            })]))
            .mount(&server)
            .await;
        let orchestrator = orchestrator(server.uri());

        let reports = orchestrator
            .ingest_stations_batch(&["KJFK".to_string(), "K1FK".to_string()])
            .await;
        assert_eq!(reports.len(), 1);

        let snapshot = orchestrator.metrics_snapshot();
        assert!(snapshot.fetch_attempts >= 2);
        assert!(snapshot.fetch_failures >= 1);
    }

    #[tokio::test]
    async fn ingest_stations_sequential_builds_a_full_result() {
        let server_metar = server_with_metar("KJFK").await;
        let orchestrator = orchestrator(server_metar.uri());

        let result = orchestrator
            .ingest_stations_sequential(&["KJFK".to_string(), "K1FK".to_string()])
            .await;
        assert_eq!(result.successes.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures.contains_key("K1FK"));
    }

    #[tokio::test]
    async fn shutdown_rejects_new_ingestion() {
        let server = server_with_metar("KJFK").await;
        let orchestrator = orchestrator(server.uri());
        orchestrator.shutdown().await;

        let err = orchestrator.ingest_station("KJFK").await.unwrap_err();
        assert!(matches!(err.kind(), IngestErrorKind::InvalidInput { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_periodic_ingestion_does_not_panic_on_a_zero_interval() {
        let server = server_with_metar("KJFK").await;
        let orchestrator = Arc::new(orchestrator(server.uri()));

        let token = orchestrator.schedule_periodic_ingestion(vec!["KJFK".to_string()], 0);
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        token.cancel();

        let snapshot = orchestrator.metrics_snapshot();
        assert!(snapshot.fetch_attempts >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_a_pool_smaller_than_the_default_promptly() {
        let server = server_with_metar("KJFK").await;
        let client = NoaaClient::new(server.uri()).unwrap();
        let adapter = NoaaSourceAdapter::metar(client, Arc::new(RegexMetarParser));
        let orchestrator = IngestionOrchestrator::with_concurrency(adapter, Arc::new(in_memory_store()), 3);

        orchestrator.ingest_station("KJFK").await.unwrap();

        let shutdown = tokio::time::timeout(Duration::from_secs(1), orchestrator.shutdown());
        assert!(shutdown.await.is_ok(), "shutdown should drain a 3-permit pool without waiting for the full grace window");
    }
}
