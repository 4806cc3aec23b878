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

//! Shared CLI scaffolding for `metar_ingest`/`taf_ingest` (spec section 6.4):
//! argument parsing, wiring an [`IngestionOrchestrator`] to a `NoaaClient`
//! and a `Parser`, and the `/metrics`+`/healthz` HTTP surface for continuous
//! runs.

use std::error::Error;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::{Parser as ClapParser, Subcommand};
use tracing::Level;

use crate::client::{validate_station_code, NoaaClient};
use crate::http::{router, RequestState};
use crate::orchestrator::{IngestionOrchestrator, NoaaSourceAdapter};
use crate::parser::Parser as ReportParser;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9783);
const DEFAULT_API_TIMEOUT_MILLIS: u64 = 10_000;

#[derive(Debug, ClapParser)]
pub struct IngestArgs {
    #[command(subcommand)]
    pub command: IngestCommand,

    /// Base URL for the upstream aviation weather API
    #[arg(long, global = true, default_value_t = String::from("https://aviationweather.gov/api/data/"))]
    pub api_url: String,

    /// Timeout for a single upstream request, in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_API_TIMEOUT_MILLIS)]
    pub timeout_millis: u64,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    #[arg(long, global = true, default_value_t = DEFAULT_LOG_LEVEL)]
    pub log_level: Level,
}

#[derive(Debug, Subcommand)]
pub enum IngestCommand {
    /// Fetch and upload a comma-separated list of stations in parallel
    Batch {
        /// Comma-separated station ids, e.g. KJFK,KLGA,KBOS
        stations: String,

        /// Use the failure-visible sequential variant instead of the
        /// parallel fan-out; exits 1 if any station failed
        #[arg(long)]
        sequential: bool,
    },

    /// Fetch and upload every report within a bounding box
    Region {
        #[arg(long)]
        min_lat: f64,
        #[arg(long)]
        min_lon: f64,
        #[arg(long)]
        max_lat: f64,
        #[arg(long)]
        max_lon: f64,
    },

    /// Run ingestion on a fixed-rate schedule until `--duration-minutes` elapses,
    /// exposing `/metrics` and `/healthz` over HTTP
    Continuous {
        /// Comma-separated station ids, e.g. KJFK,KLGA,KBOS
        stations: String,

        /// Seconds between the start of one scheduled run and the next
        #[arg(long, default_value_t = 300)]
        interval_seconds: u64,

        /// Total wall-clock minutes to run before exiting
        #[arg(long, default_value_t = 60)]
        duration_minutes: u64,

        /// Address to bind the metrics/health HTTP server to
        #[arg(long, default_value_t = DEFAULT_BIND_ADDR.into())]
        bind: SocketAddr,
    },
}

impl IngestArgs {
    pub fn parse_for(_bin_name: &str) -> Self {
        Self::parse()
    }
}

/// Runs the given subcommand against a `NoaaClient`/`Parser` pair for a
/// single NOAA report type, and exits the process with the code spec.md
/// section 6.4/7 specifies.
pub async fn run(
    args: IngestArgs,
    adapter_name: &'static str,
    parser: Arc<dyn ReportParser>,
    make_adapter: impl Fn(NoaaClient, Arc<dyn ReportParser>) -> NoaaSourceAdapter,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(args.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let client = NoaaClient::with_timeout(&args.api_url, Duration::from_millis(args.timeout_millis)).unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize upstream client", adapter = adapter_name, error = %e);
        process::exit(1)
    });

    let adapter = make_adapter(client, parser);
    let store = Arc::new(crate::upload::filesystem_store("./wx-ingest-data").unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize blob store", error = %e);
        process::exit(1)
    }));
    let orchestrator = Arc::new(IngestionOrchestrator::new(adapter, store));

    match args.command {
        IngestCommand::Batch { stations, sequential } => {
            let ids = split_stations(&stations);
            if sequential {
                let result = orchestrator.ingest_stations_sequential(&ids).await;
                tracing::info!(
                    message = "sequential batch complete",
                    successes = result.successes.len(),
                    failures = result.failures.len(),
                );
                if !result.failures.is_empty() {
                    process::exit(1);
                }
            } else {
                let reports = orchestrator.ingest_stations_batch(&ids).await;
                tracing::info!(message = "batch complete", num_reports = reports.len());
            }
        }

        IngestCommand::Region { min_lat, min_lon, max_lat, max_lon } => {
            let report_type = orchestrator_report_type(adapter_name);
            let client = NoaaClient::with_timeout(&args.api_url, Duration::from_millis(args.timeout_millis))?;
            let processor = crate::processor::SpeedLayerProcessor::new(
                client,
                parser_for(adapter_name),
                Arc::new(crate::upload::filesystem_store("./wx-ingest-data")?),
            );
            let reports = processor.process_region(&report_type, min_lat, min_lon, max_lat, max_lon).await?;
            tracing::info!(message = "region ingestion complete", num_reports = reports.len());
        }

        IngestCommand::Continuous { stations, interval_seconds, duration_minutes, bind } => {
            let ids = split_stations(&stations);
            for id in &ids {
                validate_station_code(id).unwrap_or_else(|e| {
                    tracing::error!(message = "invalid station id in continuous ingestion list", station_id = %id, error = %e);
                    process::exit(1)
                });
            }

            let state = Arc::new(RequestState::new(orchestrator.metrics_handle()));
            let app: Router = router(state);
            let server = axum::Server::try_bind(&bind)
                .map(|s| {
                    s.serve(app.into_make_service()).with_graceful_shutdown(async {
                        tokio::select! {
                            _ = sigterm() => {}
                            _ = sigint() => {}
                        }
                    })
                })
                .unwrap_or_else(|e| {
                    tracing::error!(message = "error starting metrics server", address = %bind, error = %e);
                    process::exit(1)
                });

            tracing::info!(message = "starting metrics server", address = %bind);
            let server_handle = tokio::spawn(server);

            let deadline = Duration::from_secs(duration_minutes * 60);
            let token = orchestrator.schedule_periodic_ingestion(ids, interval_seconds);
            tokio::time::sleep(deadline).await;
            token.cancel();
            orchestrator.shutdown().await;
            server_handle.abort();
        }
    }

    Ok(())
}

fn split_stations(stations: &str) -> Vec<String> {
    stations.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn orchestrator_report_type(adapter_name: &str) -> crate::model::noaa::ReportType {
    match adapter_name {
        "metar" => crate::model::noaa::ReportType::Metar,
        "taf" => crate::model::noaa::ReportType::Taf,
        other => crate::model::noaa::ReportType::Other(other.to_string()),
    }
}

fn parser_for(adapter_name: &str) -> Arc<dyn ReportParser> {
    match adapter_name {
        "taf" => Arc::new(crate::parser::RegexTafParser),
        _ => Arc::new(crate::parser::RegexMetarParser),
    }
}

async fn sigint() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(unix)]
async fn sigterm() -> std::io::Result<()> {
    use tokio::signal::unix::{self, SignalKind};
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn sigterm() -> std::io::Result<()> {
    std::future::pending::<std::io::Result<()>>().await
}
