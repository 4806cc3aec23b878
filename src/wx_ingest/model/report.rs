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

//! Tagged union over the two report kinds this crate ingests, discriminated
//! by a `dataType` property (section 6.2). Downstream dispatch is always on
//! this discriminator, never on a class identity — there is no class
//! hierarchy to dispatch on in the first place.

use serde::{Deserialize, Serialize};

use super::envelope::WeatherData;
use super::noaa::NoaaReport;
use super::taf::TafReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dataType")]
pub enum Report {
    #[serde(rename = "METAR")]
    Metar(NoaaReport),
    #[serde(rename = "TAF")]
    Taf(TafReport),
}

impl Report {
    pub fn envelope(&self) -> &WeatherData {
        match self {
            Report::Metar(r) => &r.envelope,
            Report::Taf(r) => &r.envelope,
        }
    }

    pub fn envelope_mut(&mut self) -> &mut WeatherData {
        match self {
            Report::Metar(r) => &mut r.envelope,
            Report::Taf(r) => &mut r.envelope,
        }
    }

    pub fn station_id(&self) -> &str {
        &self.envelope().station_id
    }

    /// Discriminator value as written to/read from the `dataType` property.
    pub fn data_type(&self) -> &'static str {
        match self {
            Report::Metar(_) => "METAR",
            Report::Taf(_) => "TAF",
        }
    }

    /// Raw upstream text, used for raw-data archival (section 6.2).
    pub fn raw_text(&self) -> &str {
        match self {
            Report::Metar(r) => &r.raw_text,
            Report::Taf(r) => &r.raw_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::conditions::WeatherConditions;
    use crate::model::envelope::Source;
    use crate::model::noaa::ReportType;

    #[test]
    fn round_trips_through_json_modulo_id_and_ingestion_time() {
        let envelope = WeatherData::new(Source::Noaa, "KJFK", None);
        let report = Report::Metar(NoaaReport::new(
            envelope,
            ReportType::Metar,
            "METAR KJFK 311200Z 00000KT 10SM CLR 25/18 A2992",
            WeatherConditions::builder().build(),
        ));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"dataType\":\"METAR\""));

        let round_tripped: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped.station_id(), report.station_id());
        assert_eq!(round_tripped.raw_text(), report.raw_text());
        assert_eq!(round_tripped.envelope().id, report.envelope().id);
    }

    #[test]
    fn unknown_properties_are_ignored_on_read() {
        let json = r#"{
            "dataType": "METAR",
            "id": "00000000-0000-0000-0000-000000000000",
            "ingestionTime": "2026-01-01T00:00:00Z",
            "source": "NOAA",
            "processingLayer": "SPEED_LAYER",
            "stationId": "KJFK",
            "observationTime": null,
            "location": null,
            "rawData": null,
            "qualityFlags": null,
            "metadata": {},
            "reportType": "METAR",
            "reportModifier": null,
            "rawText": "METAR KJFK ...",
            "qualityControlFlags": null,
            "conditions": {"wind": null, "visibility": null, "presentWeather": [], "skyConditions": [], "temperature": null, "pressure": null},
            "runwayVisualRange": [],
            "remarks": {},
            "totallyUnknownExtraField": 42
        }"#;

        let report: Report = serde_json::from_str(json).unwrap();
        assert_eq!(report.station_id(), "KJFK");
    }
}
