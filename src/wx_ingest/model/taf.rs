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

//! TAF specialization (section 3.4): an issue time, a validity period, an
//! ordered sequence of forecast periods, and optional 24-hour temperature
//! extremes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conditions::WeatherConditions;
use super::envelope::WeatherData;
use crate::error::{IngestError, IngestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeIndicator {
    Base,
    Fm,
    Tempo,
    Becmg,
    Prob,
}

/// A single forecast period within a TAF (section 3.4).
///
/// Construction enforces every invariant in spec section 3.4 and testable
/// property 2: `FM` requires a change time and forbids both period
/// endpoints; `TEMPO`/`BECMG`/`PROB` require both endpoints in order with a
/// duration no longer than 12 hours and forbid a change time; `PROB`
/// requires a probability of 30 or 40 and every other indicator forbids one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPeriod {
    pub change_indicator: ChangeIndicator,
    pub change_time: Option<DateTime<Utc>>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub probability: Option<u8>,
    pub conditions: WeatherConditions,
}

impl ForecastPeriod {
    pub fn new(
        change_indicator: ChangeIndicator,
        change_time: Option<DateTime<Utc>>,
        period_start: Option<DateTime<Utc>>,
        period_end: Option<DateTime<Utc>>,
        probability: Option<u8>,
        conditions: WeatherConditions,
    ) -> IngestResult<Self> {
        match change_indicator {
            ChangeIndicator::Fm => {
                if change_time.is_none() {
                    return Err(IngestError::invalid_data("forecast_period", "FM requires a change time"));
                }
                if period_start.is_some() || period_end.is_some() {
                    return Err(IngestError::invalid_data(
                        "forecast_period",
                        "FM forbids period start/end",
                    ));
                }
            }
            ChangeIndicator::Tempo | ChangeIndicator::Becmg | ChangeIndicator::Prob => {
                if change_time.is_some() {
                    return Err(IngestError::invalid_data(
                        "forecast_period",
                        "TEMPO/BECMG/PROB forbid a change time",
                    ));
                }
                match (period_start, period_end) {
                    (Some(start), Some(end)) => {
                        if start >= end {
                            return Err(IngestError::invalid_data(
                                "forecast_period",
                                "period start/end must satisfy start < end",
                            ));
                        }
                        if end - start > chrono::Duration::hours(12) {
                            return Err(IngestError::invalid_data(
                                "forecast_period",
                                "period start/end duration must not exceed 12 hours",
                            ));
                        }
                    }
                    _ => {
                        return Err(IngestError::invalid_data(
                            "forecast_period",
                            "TEMPO/BECMG/PROB require both period start and end",
                        ))
                    }
                }
            }
            ChangeIndicator::Base => {
                if change_time.is_some() {
                    return Err(IngestError::invalid_data("forecast_period", "BASE forbids a change time"));
                }
                if let (Some(start), Some(end)) = (period_start, period_end) {
                    if start >= end {
                        return Err(IngestError::invalid_data(
                            "forecast_period",
                            "period start/end must satisfy start < end",
                        ));
                    }
                }
            }
        }

        match (change_indicator, probability) {
            (ChangeIndicator::Prob, Some(p)) if p == 30 || p == 40 => {}
            (ChangeIndicator::Prob, _) => {
                return Err(IngestError::invalid_data("forecast_period", "PROB requires probability of 30 or 40"))
            }
            (_, None) => {}
            (_, Some(_)) => {
                return Err(IngestError::invalid_data(
                    "forecast_period",
                    "probability is only valid for PROB",
                ))
            }
        }

        Ok(Self {
            change_indicator,
            change_time,
            period_start,
            period_end,
            probability,
            conditions,
        })
    }
}

/// A TAF forecast (section 3.4): the envelope, issue time, validity window,
/// ordered forecast periods, and optional 24-hour temperature extremes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TafReport {
    #[serde(flatten)]
    pub envelope: WeatherData,
    pub raw_text: String,
    pub issue_time: DateTime<Utc>,
    pub validity_start: DateTime<Utc>,
    pub validity_end: DateTime<Utc>,
    pub periods: Vec<ForecastPeriod>,
    pub max_temp_c: Option<f64>,
    pub max_temp_time: Option<DateTime<Utc>>,
    pub min_temp_c: Option<f64>,
    pub min_temp_time: Option<DateTime<Utc>>,
}

impl TafReport {
    pub fn new(
        envelope: WeatherData,
        raw_text: impl Into<String>,
        issue_time: DateTime<Utc>,
        validity_start: DateTime<Utc>,
        validity_end: DateTime<Utc>,
        periods: Vec<ForecastPeriod>,
    ) -> IngestResult<Self> {
        if validity_start >= validity_end {
            return Err(IngestError::invalid_data("taf", "validity period must satisfy start < end"));
        }
        Ok(Self {
            envelope,
            raw_text: raw_text.into(),
            issue_time,
            validity_start,
            validity_end,
            periods,
            max_temp_c: None,
            max_temp_time: None,
            min_temp_c: None,
            min_temp_time: None,
        })
    }

    pub fn with_temperature_extremes(
        mut self,
        max_temp_c: Option<f64>,
        max_temp_time: Option<DateTime<Utc>>,
        min_temp_c: Option<f64>,
        min_temp_time: Option<DateTime<Utc>>,
    ) -> Self {
        self.max_temp_c = max_temp_c;
        self.max_temp_time = max_temp_time;
        self.min_temp_c = min_temp_c;
        self.min_temp_time = min_temp_time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(hour: u32) -> DateTime<Utc> {
        "2026-07-31T00:00:00Z"
            .parse::<DateTime<Utc>>()
            .unwrap()
            + chrono::Duration::hours(hour as i64)
    }

    fn conditions() -> WeatherConditions {
        WeatherConditions::builder().build()
    }

    #[test]
    fn fm_requires_change_time_and_forbids_period_bounds() {
        assert!(ForecastPeriod::new(ChangeIndicator::Fm, Some(t(1)), None, None, None, conditions()).is_ok());
        let err = ForecastPeriod::new(ChangeIndicator::Fm, Some(t(1)), Some(t(1)), Some(t(2)), None, conditions())
            .unwrap_err();
        assert!(matches!(err.kind(), crate::error::IngestErrorKind::InvalidData { reason } if reason.contains("period start/end")));
    }

    #[test]
    fn tempo_requires_bounded_ordered_period_under_twelve_hours() {
        assert!(ForecastPeriod::new(ChangeIndicator::Tempo, None, Some(t(0)), Some(t(6)), None, conditions()).is_ok());
        assert!(ForecastPeriod::new(ChangeIndicator::Tempo, None, Some(t(0)), Some(t(13)), None, conditions()).is_err());
        assert!(ForecastPeriod::new(ChangeIndicator::Tempo, None, Some(t(6)), Some(t(0)), None, conditions()).is_err());
        assert!(ForecastPeriod::new(ChangeIndicator::Tempo, Some(t(0)), Some(t(0)), Some(t(6)), None, conditions()).is_err());
    }

    #[test]
    fn prob_requires_thirty_or_forty() {
        assert!(ForecastPeriod::new(ChangeIndicator::Prob, None, Some(t(0)), Some(t(6)), Some(30), conditions()).is_ok());
        assert!(ForecastPeriod::new(ChangeIndicator::Prob, None, Some(t(0)), Some(t(6)), Some(50), conditions()).is_err());
        assert!(ForecastPeriod::new(ChangeIndicator::Prob, None, Some(t(0)), Some(t(6)), None, conditions()).is_err());
    }

    #[test]
    fn non_prob_forbids_probability() {
        assert!(ForecastPeriod::new(ChangeIndicator::Becmg, None, Some(t(0)), Some(t(6)), Some(30), conditions()).is_err());
    }
}
