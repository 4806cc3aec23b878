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

//! NOAA specialization of the report envelope (section 3.2): adds
//! `reportType`, a raw text payload, runway visual range entries, and
//! a remarks block on top of `WeatherData`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conditions::WeatherConditions;
use super::envelope::WeatherData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportType {
    Metar,
    Taf,
    Pirep,
    Other(String),
}

impl ReportType {
    /// Lowercased form used in object-store key prefixes (section 6.2).
    pub fn as_key_fragment(&self) -> String {
        match self {
            ReportType::Metar => "metar".to_string(),
            ReportType::Taf => "taf".to_string(),
            ReportType::Pirep => "pirep".to_string(),
            ReportType::Other(s) => s.to_lowercase(),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportType::Metar => write!(f, "METAR"),
            ReportType::Taf => write!(f, "TAF"),
            ReportType::Pirep => write!(f, "PIREP"),
            ReportType::Other(s) => write!(f, "{}", s),
        }
    }
}

impl std::str::FromStr for ReportType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "METAR" => ReportType::Metar,
            "TAF" => ReportType::Taf,
            "PIREP" => ReportType::Pirep,
            other => ReportType::Other(other.to_string()),
        })
    }
}

impl Serialize for ReportType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReportType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportModifier {
    Auto,
    Cor,
    Amd,
}

/// A single runway visual range entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunwayVisualRange {
    pub runway: String,
    pub visibility_feet: u32,
    pub variable_max_feet: Option<u32>,
}

/// Supplemental observations carried in the METAR remarks section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remarks {
    pub raw: Option<String>,
    pub sea_level_pressure_hpa: Option<f64>,
    pub precipitation_last_hour_in: Option<f64>,
    pub six_hour_max_temp_c: Option<f64>,
    pub six_hour_min_temp_c: Option<f64>,
}

/// A NOAA METAR observation: the envelope plus the universal conditions
/// record and METAR-specific extras (section 3.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoaaReport {
    #[serde(flatten)]
    pub envelope: WeatherData,
    pub report_type: ReportType,
    pub report_modifier: Option<ReportModifier>,
    pub raw_text: String,
    pub quality_control_flags: Option<Vec<String>>,
    pub conditions: WeatherConditions,
    pub runway_visual_range: Vec<RunwayVisualRange>,
    pub remarks: Remarks,
}

impl NoaaReport {
    pub fn new(envelope: WeatherData, report_type: ReportType, raw_text: impl Into<String>, conditions: WeatherConditions) -> Self {
        Self {
            envelope,
            report_type,
            report_modifier: None,
            raw_text: raw_text.into(),
            quality_control_flags: None,
            conditions,
            runway_visual_range: Vec::new(),
            remarks: Remarks::default(),
        }
    }

    /// True iff `observation_time` is set and the observation's age is
    /// strictly less than 2 hours (section 3.2, testable property 6).
    pub fn is_current(&self) -> bool {
        self.is_current_at(Utc::now())
    }

    /// Same as [`Self::is_current`] but evaluated against a caller-supplied
    /// "now", for deterministic testing.
    pub fn is_current_at(&self, now: DateTime<Utc>) -> bool {
        match self.envelope.observation_time {
            Some(observed) => now - observed < chrono::Duration::hours(2),
            None => false,
        }
    }

    /// Returns `reportType`, defaulting to `"NOAA"`.
    pub fn data_type(&self) -> String {
        match &self.report_type {
            ReportType::Metar => "METAR".to_string(),
            ReportType::Taf => "TAF".to_string(),
            ReportType::Pirep => "PIREP".to_string(),
            ReportType::Other(s) if s.is_empty() => "NOAA".to_string(),
            ReportType::Other(s) => s.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::envelope::Source;

    fn sample(observation_time: Option<DateTime<Utc>>) -> NoaaReport {
        let envelope = WeatherData::new(Source::Noaa, "KJFK", observation_time);
        NoaaReport::new(envelope, ReportType::Metar, "METAR KJFK ...", WeatherConditions::builder().build())
    }

    #[test]
    fn is_current_true_just_under_two_hours() {
        let now = Utc::now();
        let report = sample(Some(now - chrono::Duration::minutes(119)));
        assert!(report.is_current_at(now));
    }

    #[test]
    fn is_current_false_at_exactly_two_hours() {
        let now = Utc::now();
        let report = sample(Some(now - chrono::Duration::hours(2)));
        assert!(!report.is_current_at(now));
    }

    #[test]
    fn is_current_false_without_observation_time() {
        let report = sample(None);
        assert!(!report.is_current());
    }

    #[test]
    fn data_type_defaults_to_noaa() {
        let mut report = sample(None);
        report.report_type = ReportType::Other(String::new());
        assert_eq!(report.data_type(), "NOAA");
    }
}
