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

//! Ambient HTTP surface: `/metrics` in Prometheus text format and `/healthz`
//! as JSON, both derived from [`IngestionMetrics`] at scrape/probe time.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use serde::Serialize;

use crate::metrics::IngestionMetrics;

/// Gauges bridged from [`IngestionMetrics`] on every scrape (section 4.4's
/// counters are the source of truth; these just mirror the latest snapshot).
struct ExporterGauges {
    fetch_attempts: Gauge,
    fetch_successes: Gauge,
    fetch_failures: Gauge,
    no_data_count: Gauge,
    upload_successes: Gauge,
    upload_failures: Gauge,
}

impl ExporterGauges {
    fn register(registry: &mut Registry) -> Self {
        let gauges = Self {
            fetch_attempts: Gauge::default(),
            fetch_successes: Gauge::default(),
            fetch_failures: Gauge::default(),
            no_data_count: Gauge::default(),
            upload_successes: Gauge::default(),
            upload_failures: Gauge::default(),
        };

        registry.register("wx_ingest_fetch_attempts", "Total fetch attempts", gauges.fetch_attempts.clone());
        registry.register("wx_ingest_fetch_successes", "Total successful fetches", gauges.fetch_successes.clone());
        registry.register("wx_ingest_fetch_failures", "Total failed fetches", gauges.fetch_failures.clone());
        registry.register("wx_ingest_no_data_total", "Total empty upstream results", gauges.no_data_count.clone());
        registry.register("wx_ingest_upload_successes", "Total successful uploads", gauges.upload_successes.clone());
        registry.register("wx_ingest_upload_failures", "Total failed uploads", gauges.upload_failures.clone());

        gauges
    }

    fn sync(&self, metrics: &IngestionMetrics) {
        let snapshot = metrics.snapshot();
        self.fetch_attempts.set(snapshot.fetch_attempts as i64);
        self.fetch_successes.set(snapshot.fetch_successes as i64);
        self.fetch_failures.set(snapshot.fetch_failures as i64);
        self.no_data_count.set(snapshot.no_data_count as i64);
        self.upload_successes.set(snapshot.upload_successes as i64);
        self.upload_failures.set(snapshot.upload_failures as i64);
    }
}

/// Global state shared between all HTTP requests via `Arc`.
pub struct RequestState {
    registry: Registry,
    gauges: ExporterGauges,
    metrics: Arc<IngestionMetrics>,
}

impl RequestState {
    pub fn new(metrics: Arc<IngestionMetrics>) -> Self {
        let mut registry = <Registry>::default();
        let gauges = ExporterGauges::register(&mut registry);
        Self {
            registry,
            gauges,
            metrics,
        }
    }
}

/// `GET /metrics`: Prometheus text-format exposition of [`IngestionMetrics`].
pub async fn metrics_handler(State(state): State<Arc<RequestState>>) -> Response {
    state.gauges.sync(&state.metrics);

    let mut buf = String::new();
    match encode(&mut buf, &state.registry) {
        Ok(_) => {
            tracing::debug!(message = "encoded prometheus metrics to text format", num_bytes = buf.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/openmetrics-text; version=1.0.0; charset=utf-8")],
                buf,
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    healthy: bool,
    fetch_attempts: u64,
    success_rate: f64,
}

/// `GET /healthz`: `isHealthy()` (section 4.4) as JSON, `200` when healthy
/// and `503` otherwise.
pub async fn health_handler(State(state): State<Arc<RequestState>>) -> Response {
    let snapshot = state.metrics.snapshot();
    let body = HealthBody {
        healthy: snapshot.is_healthy(),
        fetch_attempts: snapshot.fetch_attempts,
        success_rate: snapshot.success_rate(),
    };
    let status = if body.healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(body)).into_response()
}

/// Builds the router: `/metrics` and `/healthz`, both backed by `state`.
pub fn router(state: Arc<RequestState>) -> Router {
    use axum::routing::get;
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn metrics_endpoint_reports_current_counters() {
        let metrics = Arc::new(IngestionMetrics::new());
        metrics.record_fetch_attempt();
        metrics.record_upload_success();
        let state = Arc::new(RequestState::new(metrics));

        let response = router(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("wx_ingest_fetch_attempts"));
    }

    #[tokio::test]
    async fn health_endpoint_is_unhealthy_after_only_failures() {
        let metrics = Arc::new(IngestionMetrics::new());
        metrics.record_fetch_attempt();
        metrics.record_fetch_failure();
        let state = Arc::new(RequestState::new(metrics));

        let response = router(state)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
