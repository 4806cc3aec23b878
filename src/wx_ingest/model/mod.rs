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

//! The domain model (C1): immutable value types for observations and
//! forecasts, their invariants, and the factory methods that enforce them.

pub mod conditions;
pub mod envelope;
pub mod noaa;
pub mod report;
pub mod taf;

pub use conditions::{
    CloudType, DistanceUnit, Phenomenon, Pressure, PressureUnit, SkyCondition, SkyCoverage,
    SpecialCondition, Temperature, Visibility, Wind, WindUnit, WeatherConditions, WeatherConditionsBuilder,
};
pub use envelope::{GeoLocation, ProcessingLayer, Source, WeatherData};
pub use noaa::{NoaaReport, Remarks, ReportModifier, ReportType, RunwayVisualRange};
pub use report::Report;
pub use taf::{ChangeIndicator, ForecastPeriod, TafReport};
