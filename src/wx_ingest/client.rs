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

//! Upstream HTTP client (C2, section 4.1/6.1): a single HTTPS GET per call,
//! JSON in, raw records out. Stateless except for its HTTP session.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{IngestError, IngestResult};
use crate::model::noaa::ReportType;

const USER_AGENT_STRING: &str = "wx_ingest/0.1 (aviation weather ingestion orchestrator)";

/// A single record from the upstream aviation weather API, before it has
/// been run through the (external) text parser. `raw_data` carries the
/// verbatim report text; everything else is upstream bookkeeping used to
/// pick the right parser and build the envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(default)]
    pub report_type: Option<String>,
    pub station_id: String,
    pub raw_data: String,
}

/// Validates a station code per testable property 10: 3-4 ASCII letters,
/// case-insensitive, normalized to uppercase.
pub fn validate_station_code(station_id: &str) -> IngestResult<String> {
    let trimmed = station_id.trim();
    let valid = (3..=4).contains(&trimmed.len()) && trimmed.chars().all(|c| c.is_ascii_alphabetic());
    if !valid {
        return Err(IngestError::invalid_station_code(station_id));
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// HTTP client for the upstream aviation weather API (section 6.1).
#[derive(Debug, Clone)]
pub struct NoaaClient {
    http: Client,
    base_url: Url,
}

impl NoaaClient {
    pub fn new(base_url: impl AsRef<str>) -> IngestResult<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> IngestResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::network(None, e.to_string()).with_cause(e))?;
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| IngestError::invalid_input(format!("invalid base url: {}", e)))?;
        Ok(Self { http, base_url })
    }

    /// Fetches the latest reports for a set of station ids (section 4.1).
    /// Fails with `InvalidStationCode` if any id fails validation before any
    /// request is sent.
    pub async fn fetch_reports(&self, report_type: &ReportType, station_ids: &[String]) -> IngestResult<Vec<RawRecord>> {
        let mut normalized = Vec::with_capacity(station_ids.len());
        for id in station_ids {
            normalized.push(validate_station_code(id)?);
        }

        let url = self.station_list_url(report_type, &normalized);
        tracing::debug!(message = "fetching reports", url = %url, stations = ?normalized);
        self.get_records(url).await
    }

    /// Fetches reports within a bounding box (section 4.1). An empty result
    /// is not a failure.
    pub async fn fetch_by_bounding_box(
        &self,
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
        report_type: &ReportType,
    ) -> IngestResult<Vec<RawRecord>> {
        let url = self.bounding_box_url(report_type, min_lat, min_lon, max_lat, max_lon);
        tracing::debug!(message = "fetching reports by bounding box", url = %url);
        self.get_records(url).await
    }

    async fn get_records(&self, url: Url) -> IngestResult<Vec<RawRecord>> {
        let response = self
            .http
            .get(url.clone())
            .header(USER_AGENT, USER_AGENT_STRING)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(Self::classify_transport_error)?;

        Self::check_status(&response, &url)?;

        response
            .json::<Vec<RawRecord>>()
            .await
            .map_err(|e| IngestError::network(None, format!("malformed response body: {}", e)).with_cause(e))
    }

    fn classify_transport_error(e: reqwest::Error) -> IngestError {
        if e.is_timeout() {
            IngestError::timeout().with_cause(e)
        } else {
            let message = e.to_string();
            IngestError::network(None, message).with_cause(e)
        }
    }

    fn check_status(response: &Response, url: &Url) -> IngestResult<()> {
        let status = response.status();
        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(IngestError::network(
                Some(status.as_u16()),
                format!("unexpected status {} for {}", status, url),
            ))
        }
    }

    fn station_list_url(&self, report_type: &ReportType, station_ids: &[String]) -> Url {
        let joined = station_ids.join(",");
        let encoded = utf8_percent_encode(&joined, NON_ALPHANUMERIC).to_string();
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map(|mut p| {
                p.push(&report_type.as_key_fragment());
            })
            .expect("unable to modify request URL path segments");
        url.query_pairs_mut().append_pair("ids", &encoded);
        url
    }

    fn bounding_box_url(&self, report_type: &ReportType, min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map(|mut p| {
                p.push(&report_type.as_key_fragment());
            })
            .expect("unable to modify request URL path segments");
        url.query_pairs_mut()
            .append_pair("bbox", &format!("{},{},{},{}", min_lat, min_lon, max_lat, max_lon));
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn validate_station_code_accepts_three_and_four_letter_codes() {
        assert_eq!(validate_station_code("KJFK").unwrap(), "KJFK");
        assert_eq!(validate_station_code("kjfk").unwrap(), "KJFK");
        assert_eq!(validate_station_code("EGLL").unwrap(), "EGLL");
        assert_eq!(validate_station_code("LFPG").unwrap(), "LFPG");
    }

    #[test]
    fn validate_station_code_rejects_malformed_input() {
        assert!(validate_station_code("").is_err());
        assert!(validate_station_code("  ").is_err());
        assert!(validate_station_code("K1FK").is_err());
        assert!(validate_station_code("KJFKK").is_err());
    }

    #[tokio::test]
    async fn fetch_reports_returns_records_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![serde_json::json!({
                "reportType": "METAR",
                "stationId": "KJFK",
                "rawData": "METAR KJFK ...",
            })]))
            .mount(&server)
            .await;

        let client = NoaaClient::new(server.uri()).unwrap();
        let records = client
            .fetch_reports(&ReportType::Metar, &["KJFK".to_string()])
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].station_id, "KJFK");
    }

    #[tokio::test]
    async fn fetch_reports_maps_non_200_to_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metar"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = NoaaClient::new(server.uri()).unwrap();
        let err = client
            .fetch_reports(&ReportType::Metar, &["KJFK".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(
            err.kind(),
            crate::error::IngestErrorKind::NetworkError { status: Some(503), .. }
        ));
    }

    #[tokio::test]
    async fn fetch_reports_rejects_invalid_station_before_sending_a_request() {
        let server = MockServer::start().await;
        let client = NoaaClient::new(server.uri()).unwrap();
        let err = client
            .fetch_reports(&ReportType::Metar, &["K1FK".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err.kind(), crate::error::IngestErrorKind::InvalidStationCode));
    }

    #[tokio::test]
    async fn fetch_by_bounding_box_returns_empty_result_not_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
            .mount(&server)
            .await;

        let client = NoaaClient::new(server.uri()).unwrap();
        let records = client
            .fetch_by_bounding_box(40.0, -75.0, 41.0, -73.0, &ReportType::Metar)
            .await
            .unwrap();

        assert!(records.is_empty());
    }
}
