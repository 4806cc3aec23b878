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

//! Orchestrator counters (C6, section 3.5/4.4): monotonic atomics, an
//! immutable point-in-time snapshot, and the per-run result aggregate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::IngestError;
use crate::model::report::Report;

/// Monotonic counters incremented exactly at the state transitions named in
/// section 4.4. Snapshots are atomic per-counter but not cross-counter, per
/// the spec's explicit acknowledgment that rates may be computed from a
/// slightly skewed snapshot.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    pub fetch_attempts: AtomicU64,
    pub fetch_successes: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub no_data_count: AtomicU64,
    pub upload_successes: AtomicU64,
    pub upload_failures: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch_attempt(&self) {
        self.fetch_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_success(&self) {
        self.fetch_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_data(&self) {
        self.no_data_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload_success(&self) {
        self.upload_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload_failure(&self) {
        self.upload_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fetch_attempts: self.fetch_attempts.load(Ordering::Relaxed),
            fetch_successes: self.fetch_successes.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            no_data_count: self.no_data_count.load(Ordering::Relaxed),
            upload_successes: self.upload_successes.load(Ordering::Relaxed),
            upload_failures: self.upload_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of [`IngestionMetrics`] at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub fetch_attempts: u64,
    pub fetch_successes: u64,
    pub fetch_failures: u64,
    pub no_data_count: u64,
    pub upload_successes: u64,
    pub upload_failures: u64,
}

impl MetricsSnapshot {
    /// Derived success rate over fetch attempts, or `0.0` if none were made.
    pub fn success_rate(&self) -> f64 {
        if self.fetch_attempts == 0 {
            return 0.0;
        }
        self.upload_successes as f64 / self.fetch_attempts as f64
    }

    /// Cheap liveness check: the orchestrator is healthy as long as it has
    /// not accumulated an unbroken run of only failures once it has made at
    /// least one attempt. Used by `is_healthy()`.
    pub fn is_healthy(&self) -> bool {
        self.fetch_attempts == 0 || self.upload_successes > 0 || self.fetch_failures < self.fetch_attempts
    }
}

/// Aggregate of a sequential batch run (section 3.5): successful reports,
/// per-station typed failures, wall-clock duration, and a derived success
/// rate.
#[derive(Debug)]
pub struct IngestionResult {
    pub successes: Vec<Report>,
    pub failures: HashMap<String, IngestError>,
    pub duration: Duration,
}

impl IngestionResult {
    pub fn new(successes: Vec<Report>, failures: HashMap<String, IngestError>, duration: Duration) -> Self {
        Self {
            successes,
            failures,
            duration,
        }
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.successes.len() as f64 / total as f64
    }
}
