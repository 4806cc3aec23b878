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

//! The text-to-model parser boundary (section 6.3). `Parser` is an external
//! collaborator: the orchestrator only ever calls `parse` and treats a
//! `Failure` as a `ParseError` at its boundary. The reference implementations
//! here (`RegexMetarParser`, `RegexTafParser`) exist so the rest of the crate
//! is runnable end-to-end without a second crate; they are not a complete
//! METAR/TAF grammar and operators are expected to supply their own.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::model::conditions::{
    DistanceUnit, Pressure, PressureUnit, SkyCondition, SkyCoverage, Temperature, Visibility, Wind,
    WindUnit, WeatherConditions,
};
use crate::model::envelope::{Source, WeatherData};
use crate::model::noaa::{NoaaReport, ReportType};
use crate::model::report::Report;
use crate::model::taf::{ChangeIndicator, ForecastPeriod, TafReport};

/// A discriminated union of `success(data)` and `failure(message, cause)`
/// (section 6.3). `or_else_throw` is provided for completeness but the core
/// must not rely on it — callers should prefer `map`/`if_success`/`if_failure`.
#[derive(Debug, Clone)]
pub enum ParseResult<T> {
    Success(T),
    Failure {
        message: String,
        cause: Option<String>,
    },
}

impl<T> ParseResult<T> {
    pub fn failure(message: impl Into<String>, cause: Option<String>) -> Self {
        ParseResult::Failure {
            message: message.into(),
            cause,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseResult<U> {
        match self {
            ParseResult::Success(v) => ParseResult::Success(f(v)),
            ParseResult::Failure { message, cause } => ParseResult::Failure { message, cause },
        }
    }

    pub fn if_success(self, f: impl FnOnce(&T)) -> Self {
        if let ParseResult::Success(ref v) = self {
            f(v);
        }
        self
    }

    pub fn if_failure(self, f: impl FnOnce(&str, Option<&str>)) -> Self {
        if let ParseResult::Failure { ref message, ref cause } = self {
            f(message, cause.as_deref());
        }
        self
    }

    pub fn or_else(self, default: T) -> T {
        match self {
            ParseResult::Success(v) => v,
            ParseResult::Failure { .. } => default,
        }
    }

    /// Panics on `Failure`. The core must never call this — it exists only
    /// because the interface names it (section 6.3).
    pub fn or_else_throw(self) -> T {
        match self {
            ParseResult::Success(v) => v,
            ParseResult::Failure { message, cause } => {
                panic!("parse failure: {} (cause: {:?})", message, cause)
            }
        }
    }

    /// Converts a `Failure` into a typed [`crate::error::IngestError`]
    /// (always `ParseError`), the boundary conversion the orchestrator
    /// applies per spec section 4.5.
    pub fn into_ingest_result(self) -> crate::error::IngestResult<T> {
        match self {
            ParseResult::Success(v) => Ok(v),
            ParseResult::Failure { message, cause } => {
                let mut err = crate::error::IngestError::parse(message);
                if let Some(cause) = cause {
                    err = err.with_cause(std::io::Error::new(std::io::ErrorKind::InvalidData, cause));
                }
                Err(err)
            }
        }
    }
}

/// Converts raw upstream text plus a report type into a typed [`Report`].
pub trait Parser: Send + Sync {
    fn parse(&self, report_type: &ReportType, raw_text: &str) -> ParseResult<Report>;
}

lazy_static! {
    static ref HEADER_RE: Regex = Regex::new(
        r"(?x)
        ^(?:METAR|TAF)?\s*
        (?P<station>[A-Z][A-Z0-9]{3})
        \s+
        (?P<day>\d\d)(?P<hour>\d\d)(?P<minute>\d\d)Z
    "
    )
    .unwrap();

    static ref WIND_RE: Regex = Regex::new(
        r"(?x)
        (?P<direction>\d{3}|VRB)
        (?P<speed>\d\d\d?)
        (?:G(?P<gust>\d\d\d?))?
        (?P<units>KT|MPS)
    "
    )
    .unwrap();

    static ref VISIBILITY_SM_RE: Regex = Regex::new(r"(?P<value>\d+(?:/\d+)?)SM").unwrap();

    static ref TEMP_DEWPOINT_RE: Regex = Regex::new(
        r"(?P<temp>M?\d\d)/(?P<dew>M?\d\d)(?:\s|$)"
    )
    .unwrap();

    static ref ALTIMETER_RE: Regex = Regex::new(r"A(?P<value>\d{4})").unwrap();

    static ref CLOUD_RE: Regex = Regex::new(
        r"(?P<cover>FEW|SCT|BKN|OVC|CLR|SKC)(?P<height>\d{3})?"
    )
    .unwrap();
}

fn parse_temp_value(raw: &str) -> Option<f64> {
    if let Some(stripped) = raw.strip_prefix('M') {
        stripped.parse::<f64>().ok().map(|v| -v)
    } else {
        raw.parse::<f64>().ok()
    }
}

fn parse_header(raw_text: &str, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>), String> {
    let caps = HEADER_RE
        .captures(raw_text)
        .ok_or_else(|| "missing station/time header".to_string())?;
    let station = caps["station"].to_string();
    let day: u32 = caps["day"].parse().map_err(|_| "bad day field")?;
    let hour: u32 = caps["hour"].parse().map_err(|_| "bad hour field")?;
    let minute: u32 = caps["minute"].parse().map_err(|_| "bad minute field")?;
    let observed = Utc
        .with_ymd_and_hms(now.year(), now.month(), day, hour, minute, 0)
        .single()
        .ok_or_else(|| "invalid observation timestamp".to_string())?;
    Ok((station, observed))
}

fn parse_wind(raw_text: &str) -> Option<Wind> {
    let caps = WIND_RE.captures(raw_text)?;
    let direction = if &caps["direction"] == "VRB" {
        None
    } else {
        caps["direction"].parse::<u16>().ok()
    };
    let speed: f64 = caps["speed"].parse().ok()?;
    let gust = caps.name("gust").and_then(|m| m.as_str().parse::<f64>().ok());
    let units = if &caps["units"] == "MPS" {
        WindUnit::Mps
    } else {
        WindUnit::Kt
    };
    Wind::new(direction, speed, gust, units).ok()
}

fn parse_visibility(raw_text: &str) -> Option<Visibility> {
    if raw_text.split_whitespace().any(|tok| tok == "CAVOK") {
        return Some(Visibility::new(9999.0, DistanceUnit::M));
    }
    let caps = VISIBILITY_SM_RE.captures(raw_text)?;
    let value = &caps["value"];
    let miles = if let Some((num, den)) = value.split_once('/') {
        num.parse::<f64>().ok()? / den.parse::<f64>().ok()?
    } else {
        value.parse::<f64>().ok()?
    };
    Some(Visibility::new(miles, DistanceUnit::Sm))
}

fn parse_temperature(raw_text: &str) -> Option<Temperature> {
    let caps = TEMP_DEWPOINT_RE.captures(raw_text)?;
    let temp = parse_temp_value(&caps["temp"])?;
    let dew = parse_temp_value(&caps["dew"])?;
    Temperature::new(temp, Some(dew)).ok()
}

fn parse_pressure(raw_text: &str) -> Option<Pressure> {
    let caps = ALTIMETER_RE.captures(raw_text)?;
    let raw: f64 = caps["value"].parse().ok()?;
    Pressure::new(raw / 100.0, PressureUnit::InchesHg).ok()
}

fn parse_sky_conditions(raw_text: &str) -> Vec<(SkyCoverage, Option<u32>)> {
    CLOUD_RE
        .captures_iter(raw_text)
        .filter_map(|caps| {
            let coverage = match &caps["cover"] {
                "FEW" => SkyCoverage::Few,
                "SCT" => SkyCoverage::Sct,
                "BKN" => SkyCoverage::Bkn,
                "OVC" => SkyCoverage::Ovc,
                "CLR" => SkyCoverage::Clr,
                "SKC" => SkyCoverage::Skc,
                _ => return None,
            };
            let height = caps
                .name("height")
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .map(|h| h * 100);
            Some((coverage, height))
        })
        .collect()
}

fn build_conditions(raw_text: &str) -> WeatherConditions {
    let mut builder = WeatherConditions::builder();
    if let Some(wind) = parse_wind(raw_text) {
        builder = builder.wind(wind);
    }
    if let Some(visibility) = parse_visibility(raw_text) {
        builder = builder.visibility(visibility);
    }
    if let Some(temperature) = parse_temperature(raw_text) {
        builder = builder.temperature(temperature);
    }
    if let Some(pressure) = parse_pressure(raw_text) {
        builder = builder.pressure(pressure);
    }
    for (coverage, height_feet) in parse_sky_conditions(raw_text) {
        builder = builder.add_sky_condition(SkyCondition::new(coverage, height_feet, None));
    }
    builder.build()
}

/// Minimal reference METAR parser. Understands wind, visibility (statute
/// miles or `CAVOK`), temperature/dewpoint, altimeter, and sky-condition
/// groups; does not decode runway visual range trend groups or remarks.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexMetarParser;

impl Parser for RegexMetarParser {
    fn parse(&self, report_type: &ReportType, raw_text: &str) -> ParseResult<Report> {
        let now = Utc::now();
        let (station, observed) = match parse_header(raw_text, now) {
            Ok(v) => v,
            Err(message) => return ParseResult::failure(message, None),
        };

        let envelope = WeatherData::new(Source::Noaa, station, Some(observed));
        let conditions = build_conditions(raw_text);
        let report = NoaaReport::new(envelope, report_type.clone(), raw_text, conditions);
        ParseResult::Success(Report::Metar(report))
    }
}

/// Minimal reference TAF parser. Decodes only the issue header and the
/// `BASE` forecast period; `FM`/`TEMPO`/`BECMG`/`PROB` change groups are left
/// to a production parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexTafParser;

impl Parser for RegexTafParser {
    fn parse(&self, _report_type: &ReportType, raw_text: &str) -> ParseResult<Report> {
        let now = Utc::now();
        let (station, issue_time) = match parse_header(raw_text, now) {
            Ok(v) => v,
            Err(message) => return ParseResult::failure(message, None),
        };

        let validity_end = issue_time + chrono::Duration::hours(24);
        let envelope = WeatherData::new(Source::Noaa, station.clone(), Some(issue_time));
        let conditions = build_conditions(raw_text);
        let base_period = match ForecastPeriod::new(
            ChangeIndicator::Base,
            None,
            Some(issue_time),
            Some(validity_end),
            None,
            conditions,
        ) {
            Ok(p) => p,
            Err(e) => return ParseResult::failure(e.to_string(), None),
        };

        match TafReport::new(envelope, raw_text, issue_time, issue_time, validity_end, vec![base_period]) {
            Ok(taf) => ParseResult::Success(Report::Taf(taf)),
            Err(e) => ParseResult::failure(e.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_metar() {
        let parser = RegexMetarParser;
        let result = parser.parse(
            &ReportType::Metar,
            "METAR KJFK 311200Z 18010G20KT 10SM CLR 25/18 A2992",
        );
        match result {
            ParseResult::Success(Report::Metar(report)) => {
                assert_eq!(report.envelope.station_id, "KJFK");
                let wind = report.conditions.wind.unwrap();
                assert_eq!(wind.direction_degrees, Some(180));
                assert_eq!(wind.gust, Some(20.0));
                assert_eq!(report.conditions.temperature.unwrap().temp_c, 25.0);
            }
            other => panic!("expected a successful METAR parse, got {:?}", other),
        }
    }

    #[test]
    fn fails_without_a_recognizable_header() {
        let parser = RegexMetarParser;
        let result = parser.parse(&ReportType::Metar, "garbage input with no header");
        assert!(!result.is_success());
    }

    #[test]
    fn parses_a_simple_taf_base_period() {
        let parser = RegexTafParser;
        let result = parser.parse(
            &ReportType::Taf,
            "TAF KJFK 311200Z 18010KT 10SM CLR 25/18",
        );
        match result {
            ParseResult::Success(Report::Taf(taf)) => {
                assert_eq!(taf.periods.len(), 1);
                assert_eq!(taf.periods[0].change_indicator, ChangeIndicator::Base);
            }
            other => panic!("expected a successful TAF parse, got {:?}", other),
        }
    }

    #[test]
    fn map_transforms_success_without_touching_failure() {
        let success: ParseResult<i32> = ParseResult::Success(1);
        assert!(matches!(success.map(|v| v + 1), ParseResult::Success(2)));

        let failure: ParseResult<i32> = ParseResult::failure("bad", None);
        assert!(matches!(failure.map(|v| v + 1), ParseResult::Failure { .. }));
    }
}
