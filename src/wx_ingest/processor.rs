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

//! Speed-layer processor (C4, section 4.3): validates and enriches a parsed
//! report, stamps its processing layer, and delegates to the blob uploader.
//! Exposes the `processStation`/`processBatch`/`processRegion`/
//! `runContinuous` surface as a standalone pipeline; the ingestion
//! orchestrator (section 4.4) reuses [`enrich_and_upload`] for its own
//! PROCESSING state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;

use crate::client::NoaaClient;
use crate::error::{IngestError, IngestResult};
use crate::model::envelope::ProcessingLayer;
use crate::model::noaa::ReportType;
use crate::model::report::Report;
use crate::parser::Parser;
use crate::upload::{self, BlobStore};

const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 5;
const BATCH_BUDGET: Duration = Duration::from_secs(60);

/// Validates and enriches a report in place (section 4.3, steps 3-6), then
/// uploads it and records the storage key in `metadata.storage_location`.
pub async fn enrich_and_upload(store: &dyn BlobStore, mut report: Report) -> IngestResult<Report> {
    {
        let envelope = report.envelope();
        if envelope.station_id.trim().is_empty() {
            return Err(IngestError::invalid_data(envelope.station_id.clone(), "station_id must not be empty"));
        }
    }

    {
        let envelope = report.envelope_mut();
        envelope.add_metadata("validated", true);
        envelope.add_metadata("validation_timestamp", Utc::now().to_rfc3339());
        envelope.add_metadata("processor", "SpeedLayerProcessor");
        envelope.processing_layer = ProcessingLayer::SpeedLayer;
    }

    let key = upload::upload(store, &report).await?;
    report.envelope_mut().add_metadata("storage_location", key);
    Ok(report)
}

/// The speed-layer processing pipeline: fetch, parse, validate, enrich,
/// upload (section 4.3).
pub struct SpeedLayerProcessor {
    client: NoaaClient,
    parser: Arc<dyn Parser>,
    store: Arc<dyn BlobStore>,
    workers: Arc<Semaphore>,
    shutdown: std::sync::atomic::AtomicBool,
}

impl SpeedLayerProcessor {
    pub fn new(client: NoaaClient, parser: Arc<dyn Parser>, store: Arc<dyn BlobStore>) -> Self {
        Self::with_concurrency(client, parser, store, DEFAULT_MAX_CONCURRENT_REQUESTS)
    }

    pub fn with_concurrency(client: NoaaClient, parser: Arc<dyn Parser>, store: Arc<dyn BlobStore>, max_concurrent_requests: usize) -> Self {
        Self {
            client,
            parser,
            store,
            workers: Arc::new(Semaphore::new(max_concurrent_requests)),
            shutdown: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn check_not_shut_down(&self) -> IngestResult<()> {
        if self.shutdown.load(std::sync::atomic::Ordering::Acquire) {
            return Err(IngestError::invalid_input("processor has been shut down"));
        }
        Ok(())
    }

    /// `processStation(stationId) → report` (section 4.3, steps 1-7).
    pub async fn process_station(&self, report_type: &ReportType, station_id: &str) -> IngestResult<Report> {
        self.check_not_shut_down()?;

        let records = self
            .client
            .fetch_reports(report_type, &[station_id.to_string()])
            .await?;
        let record = records.into_iter().next().ok_or_else(|| IngestError::no_data(station_id))?;

        let report = self
            .parser
            .parse(report_type, &record.raw_data)
            .into_ingest_result()?;

        enrich_and_upload(self.store.as_ref(), report).await
    }

    /// `processBatch(stationIds) → list<report>` (section 4.3): fans out
    /// over a bounded worker pool, waits with a 60-second budget, returns
    /// whichever stations succeeded. Failures are logged, not surfaced.
    pub async fn process_batch(&self, report_type: &ReportType, station_ids: &[String]) -> Vec<Report> {
        let fan_out = stream::iter(station_ids.iter().cloned())
            .map(|station_id| {
                let permit_pool = Arc::clone(&self.workers);
                let report_type = report_type.clone();
                async move {
                    let _permit = permit_pool.acquire().await.ok()?;
                    match self.process_station(&report_type, &station_id).await {
                        Ok(report) => Some(report),
                        Err(e) => {
                            tracing::warn!(message = "station processing failed", station_id = %station_id, error = %e);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(station_ids.len().max(1));

        match tokio::time::timeout(BATCH_BUDGET, fan_out.collect::<Vec<_>>()).await {
            Ok(results) => results.into_iter().flatten().collect(),
            Err(_) => {
                tracing::warn!(message = "process_batch exceeded its 60s budget");
                Vec::new()
            }
        }
    }

    /// `processRegion(bbox) → list<report>` (section 4.3): one bounding-box
    /// fetch, per-record validate/enrich/tag, then a single `uploadBatch`
    /// call. Storage locations are attached back positionally, truncated to
    /// the shorter of the two sequences.
    pub async fn process_region(
        &self,
        report_type: &ReportType,
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
    ) -> IngestResult<Vec<Report>> {
        self.check_not_shut_down()?;

        let records = self
            .client
            .fetch_by_bounding_box(min_lat, min_lon, max_lat, max_lon, report_type)
            .await?;

        let mut reports = Vec::with_capacity(records.len());
        for record in records {
            match self.parser.parse(report_type, &record.raw_data).into_ingest_result() {
                Ok(mut report) => {
                    let envelope = report.envelope_mut();
                    envelope.add_metadata("validated", true);
                    envelope.add_metadata("validation_timestamp", Utc::now().to_rfc3339());
                    envelope.add_metadata("processor", "SpeedLayerProcessor");
                    envelope.processing_layer = ProcessingLayer::SpeedLayer;
                    reports.push(report);
                }
                Err(e) => tracing::warn!(message = "region record failed to parse", error = %e),
            }
        }

        let keys = upload::upload_batch(self.store.as_ref(), &reports).await.unwrap_or_default();
        for (report, key) in reports.iter_mut().zip(keys) {
            report.envelope_mut().add_metadata("storage_location", key);
        }

        Ok(reports)
    }

    /// `runContinuous(stationIds, intervalSeconds, durationMinutes)`
    /// (section 4.3): loops `processBatch` until `now + durationMinutes`
    /// elapses; sleeps `intervalSeconds` between runs.
    pub async fn run_continuous(
        &self,
        report_type: &ReportType,
        station_ids: &[String],
        interval: Duration,
        duration: Duration,
    ) {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            let reports = self.process_batch(report_type, station_ids).await;
            tracing::info!(message = "continuous batch completed", num_reports = reports.len());

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(interval.min(remaining)).await;
        }
    }

    /// Releases the worker pool; after this, the processor rejects further
    /// work (section 4.3).
    pub fn shutdown(&self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::Release);
    }
}
