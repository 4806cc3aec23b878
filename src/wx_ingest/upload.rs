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

//! Blob uploader (C3, section 4.2/6.2): serializes reports to JSON, derives
//! a partitioned key, and uploads through a `BlobStore` collaborator.
//! `BlobStore` mirrors the spec's black-box object-store contract (`Put`,
//! `HeadBucket`) over the `object_store` crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::ObjectStore;

use crate::error::{IngestError, IngestResult};
use crate::model::report::Report;

/// Storage-backend collaborator. Mirrors the spec's `Put(key, bytes,
/// metadata)`/`HeadBucket()` contract; `metadata` is persisted as a JSON
/// sidecar object since `object_store` has no backend-agnostic notion of
/// custom object metadata (see DESIGN.md).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, metadata: HashMap<String, String>) -> IngestResult<()>;

    async fn head_bucket(&self) -> IngestResult<()>;
}

/// `BlobStore` over any `object_store::ObjectStore` implementation.
pub struct ObjectStoreBlobStore {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, metadata: HashMap<String, String>) -> IngestResult<()> {
        let path = StorePath::from(key);
        self.store
            .put(&path, Bytes::from(bytes))
            .await
            .map_err(|e| IngestError::storage().with_cause(e))?;

        if !metadata.is_empty() {
            let sidecar = StorePath::from(format!("{}.metadata.json", key));
            let body = serde_json::to_vec(&metadata).map_err(|e| IngestError::storage().with_cause(e))?;
            self.store
                .put(&sidecar, Bytes::from(body))
                .await
                .map_err(|e| IngestError::storage().with_cause(e))?;
        }

        tracing::debug!(message = "uploaded object", key = %key, num_metadata_fields = metadata.len());
        Ok(())
    }

    async fn head_bucket(&self) -> IngestResult<()> {
        // object_store has no bucket-level health probe; listing the root
        // with a limit of one entry is the closest equivalent and exercises
        // the same network path a real `HeadBucket` call would.
        use futures::StreamExt;
        let mut stream = self.store.list(None);
        let _ = stream.next().await;
        Ok(())
    }
}

/// A local-filesystem-backed store rooted at `root`, for operators.
pub fn filesystem_store(root: impl AsRef<std::path::Path>) -> IngestResult<ObjectStoreBlobStore> {
    let fs = LocalFileSystem::new_with_prefix(root).map_err(|e| IngestError::storage().with_cause(e))?;
    Ok(ObjectStoreBlobStore::new(Arc::new(fs)))
}

/// An in-memory store, for tests and the crate-level doctest.
pub fn in_memory_store() -> ObjectStoreBlobStore {
    ObjectStoreBlobStore::new(Arc::new(InMemory::new()))
}

/// Derives the speed-layer key for a report (section 6.2):
/// `speed-layer/{source-lower}/{type-lower}/{YYYY}/{MM}/{DD}/{stationId}_{YYYYMMDD_HHmm}.json`.
pub fn speed_layer_key(report: &Report, now: DateTime<Utc>) -> String {
    let envelope = report.envelope();
    let source = envelope.source.as_key_fragment();
    let type_fragment = report.data_type().to_ascii_lowercase();
    format!(
        "speed-layer/{}/{}/{}/{}/{}/{}_{}.json",
        source,
        type_fragment,
        now.format("%Y"),
        now.format("%m"),
        now.format("%d"),
        report.station_id(),
        now.format("%Y%m%d_%H%M"),
    )
}

/// Derives the raw-data key for a station's verbatim upstream text (section
/// 6.2): `raw-data/{source-lower}/{stationId}_{YYYYMMDD_HHmm}.txt`.
pub fn raw_data_key(source_fragment: &str, station_id: &str, now: DateTime<Utc>) -> String {
    format!(
        "raw-data/{}/{}_{}.txt",
        source_fragment,
        station_id,
        now.format("%Y%m%d_%H%M"),
    )
}

/// Object metadata attached to speed-layer uploads (section 6.2).
fn speed_layer_metadata(report: &Report, now: DateTime<Utc>) -> HashMap<String, String> {
    let envelope = report.envelope();
    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), envelope.source.as_key_fragment().to_string());
    metadata.insert("station-id".to_string(), report.station_id().to_string());
    metadata.insert("report-type".to_string(), report.data_type().to_string());
    metadata.insert("ingestion-time".to_string(), now.to_rfc3339());
    metadata
}

/// Uploads a single report (section 4.2). Returns the key it was stored
/// under.
pub async fn upload(store: &dyn BlobStore, report: &Report) -> IngestResult<String> {
    let now = report.envelope().ingestion_time;
    let key = speed_layer_key(report, now);
    let metadata = speed_layer_metadata(report, now);
    let body = serde_json::to_vec(report).map_err(|e| IngestError::storage().with_cause(e))?;
    store.put(&key, body, metadata).await?;
    Ok(key)
}

/// Uploads each report independently (section 4.2). Fails only when every
/// upload failed and at least one was attempted.
pub async fn upload_batch(store: &dyn BlobStore, reports: &[Report]) -> IngestResult<Vec<String>> {
    if reports.is_empty() {
        return Ok(Vec::new());
    }

    let mut keys = Vec::new();
    for report in reports {
        match upload(store, report).await {
            Ok(key) => keys.push(key),
            Err(e) => tracing::warn!(message = "upload failed", station_id = %report.station_id(), error = %e),
        }
    }

    if keys.is_empty() {
        return Err(IngestError::storage());
    }
    Ok(keys)
}

/// Uploads the verbatim upstream text for a station (section 4.2). Rejects
/// empty inputs with `InvalidInput`.
pub async fn upload_raw(store: &dyn BlobStore, source_fragment: &str, raw: &str, station_id: &str) -> IngestResult<String> {
    if raw.trim().is_empty() {
        return Err(IngestError::invalid_input("raw text must not be empty"));
    }
    if station_id.trim().is_empty() {
        return Err(IngestError::invalid_input("station id must not be empty"));
    }

    let now = Utc::now();
    let key = raw_data_key(source_fragment, station_id, now);
    store.put(&key, raw.as_bytes().to_vec(), HashMap::new()).await?;
    Ok(key)
}
