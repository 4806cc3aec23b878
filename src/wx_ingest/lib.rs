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

//! Ingestion orchestrator for NOAA aviation weather reports (METAR, TAF)
//!
//! ## Overview
//!
//! `wx_ingest` fetches raw reports for a fleet of stations from an upstream
//! aviation weather API, parses them into a typed domain model, validates
//! and enriches each report, and uploads the result to an object store under
//! a partitioned key layout. The orchestrator (see [`orchestrator`]) runs
//! this pipeline for single stations, parallel batches, bounding-box
//! regions, and on a schedule, under bounded concurrency and fixed time
//! budgets.
//!
//! The text-to-model parser and the object-store client are treated as
//! pluggable collaborators ([`parser::Parser`], [`upload::BlobStore`]) so a
//! production-grade parser or storage backend can be swapped in without
//! touching the orchestrator.
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run() -> wx_ingest::error::IngestResult<()> {
//! use std::sync::Arc;
//! use wx_ingest::client::NoaaClient;
//! use wx_ingest::orchestrator::{IngestionOrchestrator, NoaaSourceAdapter};
//! use wx_ingest::parser::RegexMetarParser;
//! use wx_ingest::upload::in_memory_store;
//!
//! let client = NoaaClient::new("https://example.invalid/api")?;
//! let adapter = NoaaSourceAdapter::metar(client, Arc::new(RegexMetarParser));
//! let orchestrator = IngestionOrchestrator::new(adapter, Arc::new(in_memory_store()));
//! let report = orchestrator.ingest_station("KJFK").await?;
//! println!("{}", report.station_id());
//! # Ok(())
//! # }
//! ```
//!
//! ## Run
//!
//! Two binaries are provided, one per NOAA report type:
//!
//! ```text
//! metar_ingest batch KJFK,KLGA,KBOS
//! taf_ingest continuous --interval-seconds 60 --duration-minutes 120 -- KJFK
//! ```

pub mod cli;
pub mod client;
pub mod error;
pub mod http;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod processor;
pub mod upload;
