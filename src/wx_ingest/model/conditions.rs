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

//! Universal conditions record (`WeatherConditions`, section 3.3), used by
//! both METAR (current state) and each TAF forecast period.

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WindUnit {
    Kt,
    Mps,
    Kmh,
    Mph,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wind {
    /// Direction in degrees [0, 359], `None` for calm/variable.
    pub direction_degrees: Option<u16>,
    pub speed: f64,
    pub gust: Option<f64>,
    pub unit: WindUnit,
}

impl Wind {
    pub fn new(direction_degrees: Option<u16>, speed: f64, gust: Option<f64>, unit: WindUnit) -> IngestResult<Self> {
        if let Some(dir) = direction_degrees {
            if dir > 359 {
                return Err(IngestError::invalid_input(format!("wind direction {} out of range [0, 359]", dir)));
            }
        }
        if speed < 0.0 {
            return Err(IngestError::invalid_input("wind speed must be >= 0"));
        }
        Ok(Self {
            direction_degrees,
            speed,
            gust,
            unit,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DistanceUnit {
    Sm,
    Km,
    M,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialCondition {
    Cavok,
    Ndv,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    pub distance: f64,
    pub unit: DistanceUnit,
    pub less_than: bool,
    pub greater_than: bool,
    pub special_condition: Option<SpecialCondition>,
}

impl Visibility {
    pub fn new(distance: f64, unit: DistanceUnit) -> Self {
        Self {
            distance,
            unit,
            less_than: false,
            greater_than: false,
            special_condition: None,
        }
    }

    pub fn with_less_than(mut self, less_than: bool) -> Self {
        self.less_than = less_than;
        self
    }

    pub fn with_special_condition(mut self, condition: SpecialCondition) -> Self {
        self.special_condition = Some(condition);
        self
    }

    /// Visibility expressed in statute miles, for IMC/VMC threshold checks.
    fn statute_miles(&self) -> f64 {
        match self.unit {
            DistanceUnit::Sm => self.distance,
            DistanceUnit::Km => self.distance / 1.609344,
            DistanceUnit::M => self.distance / 1609.344,
        }
    }

    /// Visibility expressed in kilometers, for IMC/VMC threshold checks.
    fn kilometers(&self) -> f64 {
        match self.unit {
            DistanceUnit::Km => self.distance,
            DistanceUnit::Sm => self.distance * 1.609344,
            DistanceUnit::M => self.distance / 1000.0,
        }
    }
}

/// A present-weather phenomenon, stored as its raw coded token (e.g. `"RA"`,
/// `"TSRA"`, `"FZDZ"`). Classification predicates match on substrings rather
/// than a closed enum because the METAR phenomenon grammar is combinatorial
/// (intensity + descriptor + up to three phenomena).
pub type Phenomenon = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SkyCoverage {
    Skc,
    Clr,
    Nsc,
    Few,
    Sct,
    Bkn,
    Ovc,
    Vv,
}

impl SkyCoverage {
    /// Oktas of sky covered, used to rank coverage values (Glossary).
    pub fn oktas(&self) -> u8 {
        match self {
            SkyCoverage::Skc | SkyCoverage::Clr | SkyCoverage::Nsc => 0,
            SkyCoverage::Few => 1,
            SkyCoverage::Sct => 3,
            SkyCoverage::Bkn => 5,
            SkyCoverage::Ovc | SkyCoverage::Vv => 8,
        }
    }

    /// Whether this coverage can constitute a ceiling (section 3.3).
    pub fn is_ceiling_coverage(&self) -> bool {
        matches!(self, SkyCoverage::Bkn | SkyCoverage::Ovc | SkyCoverage::Vv)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloudType {
    Cb,
    Tcu,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkyCondition {
    pub coverage: SkyCoverage,
    pub height_feet: Option<u32>,
    pub cloud_type: Option<CloudType>,
}

impl SkyCondition {
    pub fn new(coverage: SkyCoverage, height_feet: Option<u32>, cloud_type: Option<CloudType>) -> Self {
        Self {
            coverage,
            height_feet,
            cloud_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Temperature {
    pub temp_c: f64,
    pub dewpoint_c: Option<f64>,
}

impl Temperature {
    /// Construct a temperature reading. Fails if `dewpoint_c > temp_c`
    /// (testable property 3).
    pub fn new(temp_c: f64, dewpoint_c: Option<f64>) -> IngestResult<Self> {
        if let Some(dewpoint) = dewpoint_c {
            if dewpoint > temp_c {
                return Err(IngestError::invalid_input(format!(
                    "dewpoint {} must not exceed temperature {}",
                    dewpoint, temp_c
                )));
            }
        }
        Ok(Self { temp_c, dewpoint_c })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PressureUnit {
    InchesHg,
    Hectopascals,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pressure {
    pub value: f64,
    pub unit: PressureUnit,
}

impl Pressure {
    /// Plausible operating range per unit, range-validated at construction
    /// (testable property 12).
    pub fn new(value: f64, unit: PressureUnit) -> IngestResult<Self> {
        let valid = match unit {
            PressureUnit::InchesHg => (25.0..=35.0).contains(&value),
            PressureUnit::Hectopascals => (850.0..=1085.0).contains(&value),
        };
        if !valid {
            return Err(IngestError::invalid_data("pressure", format!("{:?} value {} out of range", unit, value)));
        }
        Ok(Self { value, unit })
    }

    pub fn inches_hg(value: f64) -> IngestResult<Self> {
        Self::new(value, PressureUnit::InchesHg)
    }

    pub fn hectopascals(value: f64) -> IngestResult<Self> {
        Self::new(value, PressureUnit::Hectopascals)
    }

    /// Standard sea-level pressure, 1013.25 hPa.
    pub fn standard() -> Self {
        Self {
            value: 1013.25,
            unit: PressureUnit::Hectopascals,
        }
    }

    /// The METAR altimeter group encodes inches-Hg to two decimal places
    /// with the decimal point removed, e.g. `2992` for 29.92 inHg.
    pub fn to_metar_altimeter(&self) -> u32 {
        let inches = match self.unit {
            PressureUnit::InchesHg => self.value,
            PressureUnit::Hectopascals => self.value / 33.8639,
        };
        (inches * 100.0).round() as u32
    }

    pub fn from_metar_altimeter(altimeter: u32) -> IngestResult<Self> {
        Self::inches_hg(altimeter as f64 / 100.0)
    }

    /// The METAR QNH group encodes whole hectopascals, e.g. `1013`.
    pub fn to_metar_qnh(&self) -> u32 {
        let hpa = match self.unit {
            PressureUnit::Hectopascals => self.value,
            PressureUnit::InchesHg => self.value * 33.8639,
        };
        hpa.round() as u32
    }

    pub fn from_metar_qnh(qnh: u32) -> IngestResult<Self> {
        Self::hectopascals(qnh as f64)
    }
}

/// The universal current-conditions record shared by METAR observations and
/// each TAF forecast period (section 3.3). `present_weather` and
/// `sky_conditions` are defensively copied at construction time and exposed
/// only as immutable slices afterward (testable property 4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherConditions {
    pub wind: Option<Wind>,
    pub visibility: Option<Visibility>,
    present_weather: Vec<Phenomenon>,
    sky_conditions: Vec<SkyCondition>,
    pub temperature: Option<Temperature>,
    pub pressure: Option<Pressure>,
}

impl WeatherConditions {
    pub fn builder() -> WeatherConditionsBuilder {
        WeatherConditionsBuilder::default()
    }

    pub fn present_weather(&self) -> &[Phenomenon] {
        &self.present_weather
    }

    pub fn sky_conditions(&self) -> &[SkyCondition] {
        &self.sky_conditions
    }

    /// Any BKN/OVC/VV layer present (section 3.3).
    pub fn has_ceiling(&self) -> bool {
        self.sky_conditions.iter().any(|c| c.coverage.is_ceiling_coverage())
    }

    /// Minimum height among ceiling layers with a known height, or `None`
    /// if there is no ceiling (testable property 5).
    pub fn ceiling_feet(&self) -> Option<u32> {
        self.sky_conditions
            .iter()
            .filter(|c| c.coverage.is_ceiling_coverage())
            .filter_map(|c| c.height_feet)
            .min()
    }

    pub fn has_precipitation(&self) -> bool {
        const PRECIP_TOKENS: &[&str] = &["RA", "SN", "DZ", "SG", "PL", "GR", "GS", "IC", "UP"];
        self.present_weather
            .iter()
            .any(|p| PRECIP_TOKENS.iter().any(|token| p.contains(token)))
    }

    pub fn has_thunderstorms(&self) -> bool {
        self.present_weather.iter().any(|p| p.contains("TS"))
    }

    pub fn has_freezing_conditions(&self) -> bool {
        self.present_weather.iter().any(|p| p.contains("FZ"))
            || self.temperature.map(|t| t.temp_c <= 0.0).unwrap_or(false)
    }

    /// Visibility < 3 SM or < 5 KM, or ceiling < 1000 ft (section 3.3).
    pub fn is_likely_imc(&self) -> bool {
        let low_visibility = self
            .visibility
            .map(|v| match v.unit {
                DistanceUnit::Sm => v.statute_miles() < 3.0,
                DistanceUnit::Km | DistanceUnit::M => v.kilometers() < 5.0,
            })
            .unwrap_or(false);
        let low_ceiling = self.ceiling_feet().map(|h| h < 1000).unwrap_or(false);
        low_visibility || low_ceiling
    }

    pub fn is_likely_vmc(&self) -> bool {
        !self.is_likely_imc()
    }

    pub fn is_clear_and_calm(&self) -> bool {
        let calm_wind = self
            .wind
            .map(|w| w.speed == 0.0 && w.gust.is_none())
            .unwrap_or(true);
        let clear_sky = self
            .sky_conditions
            .iter()
            .all(|c| matches!(c.coverage, SkyCoverage::Skc | SkyCoverage::Clr | SkyCoverage::Nsc));
        calm_wind && clear_sky && self.present_weather.is_empty()
    }

    pub fn has_any_conditions(&self) -> bool {
        self.wind.is_some()
            || self.visibility.is_some()
            || !self.present_weather.is_empty()
            || !self.sky_conditions.is_empty()
            || self.temperature.is_some()
            || self.pressure.is_some()
    }
}

/// Single-threaded mutable builder for `WeatherConditions`; the built value
/// is deep-immutable (design note: keep the builder, make the product
/// immutable).
#[derive(Debug, Default)]
pub struct WeatherConditionsBuilder {
    wind: Option<Wind>,
    visibility: Option<Visibility>,
    present_weather: Vec<Phenomenon>,
    sky_conditions: Vec<SkyCondition>,
    temperature: Option<Temperature>,
    pressure: Option<Pressure>,
}

impl WeatherConditionsBuilder {
    pub fn wind(mut self, wind: Wind) -> Self {
        self.wind = Some(wind);
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn present_weather(mut self, phenomena: Vec<Phenomenon>) -> Self {
        self.present_weather = phenomena;
        self
    }

    pub fn add_present_weather(mut self, phenomenon: impl Into<Phenomenon>) -> Self {
        self.present_weather.push(phenomenon.into());
        self
    }

    pub fn sky_conditions(mut self, conditions: Vec<SkyCondition>) -> Self {
        self.sky_conditions = conditions;
        self
    }

    pub fn add_sky_condition(mut self, condition: SkyCondition) -> Self {
        self.sky_conditions.push(condition);
        self
    }

    pub fn temperature(mut self, temperature: Temperature) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn pressure(mut self, pressure: Pressure) -> Self {
        self.pressure = Some(pressure);
        self
    }

    pub fn build(self) -> WeatherConditions {
        WeatherConditions {
            wind: self.wind,
            visibility: self.visibility,
            present_weather: self.present_weather,
            sky_conditions: self.sky_conditions,
            temperature: self.temperature,
            pressure: self.pressure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pressure_altimeter_round_trip_holds_across_the_valid_range(inches in 25.0f64..=35.0) {
            let p = Pressure::inches_hg(inches).unwrap();
            let back = Pressure::from_metar_altimeter(p.to_metar_altimeter()).unwrap();
            prop_assert!((back.value - p.value).abs() < 0.01);
        }

        #[test]
        fn temperature_never_accepts_a_dewpoint_above_the_temperature(temp in -80.0f64..60.0, delta in 0.1f64..50.0) {
            prop_assert!(Temperature::new(temp, Some(temp + delta)).is_err());
            prop_assert!(Temperature::new(temp, Some(temp - delta)).is_ok());
        }
    }

    #[test]
    fn ceiling_feet_is_minimum_of_ceiling_layer_heights() {
        let conditions = WeatherConditions::builder()
            .add_sky_condition(SkyCondition::new(SkyCoverage::Few, Some(2000), None))
            .add_sky_condition(SkyCondition::new(SkyCoverage::Bkn, Some(1200), None))
            .add_sky_condition(SkyCondition::new(SkyCoverage::Ovc, Some(800), None))
            .add_sky_condition(SkyCondition::new(SkyCoverage::Vv, None, None))
            .build();

        assert!(conditions.has_ceiling());
        assert_eq!(conditions.ceiling_feet(), Some(800));
    }

    #[test]
    fn no_ceiling_layer_yields_none() {
        let conditions = WeatherConditions::builder()
            .add_sky_condition(SkyCondition::new(SkyCoverage::Few, Some(2000), None))
            .build();

        assert!(!conditions.has_ceiling());
        assert_eq!(conditions.ceiling_feet(), None);
    }

    #[test]
    fn temperature_rejects_dewpoint_above_temperature() {
        assert!(Temperature::new(10.0, Some(5.0)).is_ok());
        assert!(Temperature::new(10.0, Some(10.0)).is_ok());
        assert!(Temperature::new(10.0, Some(10.1)).is_err());
    }

    #[test]
    fn pressure_rejects_out_of_range_values() {
        assert!(Pressure::inches_hg(50.0).is_err());
        assert!(Pressure::hectopascals(2000.0).is_err());
        assert_eq!(Pressure::hectopascals(1013.25).unwrap(), Pressure::standard());
    }

    #[test]
    fn pressure_altimeter_round_trips() {
        let p = Pressure::inches_hg(29.92).unwrap();
        let altimeter = p.to_metar_altimeter();
        let back = Pressure::from_metar_altimeter(altimeter).unwrap();
        assert!((back.value - p.value).abs() < 0.001);
    }

    #[test]
    fn pressure_qnh_round_trips_within_rounding() {
        let p = Pressure::hectopascals(1013.0).unwrap();
        let qnh = p.to_metar_qnh();
        let back = Pressure::from_metar_qnh(qnh).unwrap();
        assert!((back.value - p.value).abs() < 1.0);
    }

    #[test]
    fn is_likely_imc_on_low_ceiling() {
        let conditions = WeatherConditions::builder()
            .add_sky_condition(SkyCondition::new(SkyCoverage::Ovc, Some(500), None))
            .build();
        assert!(conditions.is_likely_imc());
        assert!(!conditions.is_likely_vmc());
    }

    #[test]
    fn is_clear_and_calm_requires_no_wind_weather_or_cloud() {
        let calm = WeatherConditions::builder()
            .wind(Wind::new(None, 0.0, None, WindUnit::Kt).unwrap())
            .add_sky_condition(SkyCondition::new(SkyCoverage::Clr, None, None))
            .build();
        assert!(calm.is_clear_and_calm());

        let windy = WeatherConditions::builder()
            .wind(Wind::new(Some(270), 15.0, None, WindUnit::Kt).unwrap())
            .build();
        assert!(!windy.is_clear_and_calm());
    }
}
