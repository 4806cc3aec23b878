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

//! Typed error taxonomy (C7). Every boundary in this crate returns one of
//! these kinds instead of an opaque string; callers match on `kind()` to
//! decide operator action (rerun, investigate upstream, page on-call).

use std::fmt;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The structured error kinds named in spec section 4.5.
#[derive(Debug, thiserror::Error)]
pub enum IngestErrorKind {
    /// Bad station id format at the boundary (not 3-4 ASCII letters).
    #[error("invalid station code")]
    InvalidStationCode,

    /// A fetched record was missing a required field.
    #[error("invalid data: {reason}")]
    InvalidData { reason: String },

    /// Upstream returned an empty result for an otherwise valid station.
    #[error("no data available")]
    NoData,

    /// Transport failure, non-2xx response, or malformed response body.
    #[error("network error: {message}")]
    NetworkError { status: Option<u16>, message: String },

    /// Deadline exceeded or an interruption signal was observed.
    #[error("request timed out")]
    Timeout,

    /// The object store rejected or failed an upload.
    #[error("storage error")]
    StorageError,

    /// Reserved for the external parser collaborator (spec section 6.3).
    #[error("parse error: {message}")]
    ParseError { message: String },

    /// A caller passed a null/empty argument across an API boundary.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
}

/// A single typed error with optional station context and cause chaining.
///
/// No error crosses the public API as an opaque string: every fallible
/// operation in this crate returns `IngestError` (or a `Result` of it), and
/// its `kind` is the thing callers are expected to match on.
#[derive(Debug)]
pub struct IngestError {
    pub station_id: Option<String>,
    pub kind: IngestErrorKind,
    pub source: Option<BoxError>,
}

impl IngestError {
    pub fn new(kind: IngestErrorKind) -> Self {
        Self {
            station_id: None,
            kind,
            source: None,
        }
    }

    pub fn with_station(mut self, station_id: impl Into<String>) -> Self {
        self.station_id = Some(station_id.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.source = Some(cause.into());
        self
    }

    pub fn invalid_station_code(station_id: impl Into<String>) -> Self {
        Self::new(IngestErrorKind::InvalidStationCode).with_station(station_id)
    }

    pub fn invalid_data(station_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(IngestErrorKind::InvalidData { reason: reason.into() }).with_station(station_id)
    }

    pub fn no_data(station_id: impl Into<String>) -> Self {
        Self::new(IngestErrorKind::NoData).with_station(station_id)
    }

    pub fn network(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(IngestErrorKind::NetworkError {
            status,
            message: message.into(),
        })
    }

    pub fn timeout() -> Self {
        Self::new(IngestErrorKind::Timeout)
    }

    pub fn storage() -> Self {
        Self::new(IngestErrorKind::StorageError)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(IngestErrorKind::ParseError { message: message.into() })
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::new(IngestErrorKind::InvalidInput { reason: reason.into() })
    }

    pub fn kind(&self) -> &IngestErrorKind {
        &self.kind
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.station_id {
            Some(station) => write!(f, "{} (station={})", self.kind, station),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
