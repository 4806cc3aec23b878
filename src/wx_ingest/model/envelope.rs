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

//! Common report envelope (`WeatherData`, section 3.1) shared by every
//! report regardless of source or type.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{IngestError, IngestResult};

/// Where an observation or forecast came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Noaa,
    OpenWeatherMap,
    WeatherApi,
    VisualCrossing,
    Internal,
    Unknown,
}

impl Source {
    /// Lowercased form used in object-store key prefixes (section 6.2).
    pub fn as_key_fragment(&self) -> &'static str {
        match self {
            Source::Noaa => "noaa",
            Source::OpenWeatherMap => "openweathermap",
            Source::WeatherApi => "weatherapi",
            Source::VisualCrossing => "visual_crossing",
            Source::Internal => "internal",
            Source::Unknown => "unknown",
        }
    }
}

/// Two-tier (plus raw/serving) storage role, section 3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingLayer {
    /// Low-latency, recent-only. Retention 24 hours.
    #[default]
    SpeedLayer,
    /// Historical, unbounded retention.
    BatchLayer,
    /// Unbounded retention, query-optimized.
    ServingLayer,
    /// No retention guarantee; transient.
    Raw,
}

impl ProcessingLayer {
    /// Retention window, or `None` for "unbounded".
    pub fn retention(&self) -> Option<chrono::Duration> {
        match self {
            ProcessingLayer::SpeedLayer => Some(chrono::Duration::hours(24)),
            ProcessingLayer::BatchLayer | ProcessingLayer::ServingLayer => None,
            ProcessingLayer::Raw => Some(chrono::Duration::zero()),
        }
    }
}

/// Meters-to-feet factor used throughout the model (spec section 3.1).
pub const METERS_TO_FEET: f64 = 1.0 / 0.3048;
pub const FEET_TO_METERS: f64 = 0.3048;

/// Geographic location of a station or observation, with an optional
/// elevation. Latitude/longitude are range-validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_meters: Option<f64>,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64, elevation_meters: Option<f64>) -> IngestResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(IngestError::invalid_input(format!(
                "latitude {} out of range [-90, 90]",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(IngestError::invalid_input(format!(
                "longitude {} out of range [-180, 180]",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            elevation_meters,
        })
    }

    /// Construct from an elevation expressed in feet instead of meters.
    pub fn from_feet(latitude: f64, longitude: f64, elevation_feet: f64) -> IngestResult<Self> {
        Self::new(latitude, longitude, Some(elevation_feet * FEET_TO_METERS))
    }

    /// Elevation in feet, rounded to the nearest foot, or `None` if unset.
    pub fn elevation_feet(&self) -> Option<f64> {
        self.elevation_meters.map(|m| (m * METERS_TO_FEET).round())
    }
}

/// The common envelope for every ingested report (section 3.1).
///
/// Immutable after construction except for `metadata`, which may only grow
/// through `add_metadata`. `id` and `ingestion_time` are generated once at
/// construction and never change; equality and hashing are derived from `id`
/// alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherData {
    pub id: Uuid,
    pub ingestion_time: DateTime<Utc>,
    pub source: Source,
    #[serde(default)]
    pub processing_layer: ProcessingLayer,
    pub station_id: String,
    pub observation_time: Option<DateTime<Utc>>,
    pub location: Option<GeoLocation>,
    pub raw_data: Option<String>,
    pub quality_flags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl WeatherData {
    /// Construct a new envelope. `id` and `ingestion_time` are always freshly
    /// generated here — they are never accepted as caller-supplied overrides,
    /// per the deserialization contract in spec section 6.2.
    pub fn new(source: Source, station_id: impl Into<String>, observation_time: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ingestion_time: Utc::now(),
            source,
            processing_layer: ProcessingLayer::default(),
            station_id: station_id.into(),
            observation_time,
            location: None,
            raw_data: None,
            quality_flags: None,
            metadata: HashMap::new(),
        }
    }

    /// Lazily initializes metadata storage and inserts `key` -> `value`.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn with_processing_layer(mut self, layer: ProcessingLayer) -> Self {
        self.processing_layer = layer;
        self
    }

    pub fn with_location(mut self, location: GeoLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_raw_data(mut self, raw_data: impl Into<String>) -> Self {
        self.raw_data = Some(raw_data.into());
        self
    }

    pub fn with_quality_flags(mut self, flags: Vec<String>) -> Self {
        self.quality_flags = Some(flags);
        self
    }
}

impl PartialEq for WeatherData {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WeatherData {}

impl Hash for WeatherData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_ingestion_time_is_not_in_the_future() {
        let before = Utc::now();
        let a = WeatherData::new(Source::Noaa, "KJFK", None);
        let b = WeatherData::new(Source::Noaa, "KJFK", None);

        assert_ne!(a.id, b.id);
        assert!(a.ingestion_time >= before);
        assert!(a.ingestion_time <= Utc::now());
    }

    #[test]
    fn equality_and_hash_are_by_id_alone() {
        use std::collections::HashSet;

        let mut a = WeatherData::new(Source::Noaa, "KJFK", None);
        let b = a.clone();
        a.add_metadata("validated", true);

        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn geo_location_rejects_out_of_range_coordinates() {
        assert!(GeoLocation::new(90.0, 180.0, None).is_ok());
        assert!(GeoLocation::new(-90.0, -180.0, None).is_ok());
        assert!(GeoLocation::new(90.001, 0.0, None).is_err());
        assert!(GeoLocation::new(0.0, 180.001, None).is_err());
    }

    #[test]
    fn elevation_round_trips_through_feet() {
        let loc = GeoLocation::from_feet(40.0, -70.0, 1000.0).unwrap();
        assert_eq!(loc.elevation_feet(), Some(1000.0));
    }
}
