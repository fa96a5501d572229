//! services/watcher/src/adapters/schedule_api.rs
//!
//! This module contains the adapter for the league's public schedule API.
//! It implements the `ScheduleSource` port from the `core` crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use owl_watcher_core::{
    domain::{MatchRecord, MatchState},
    ports::{PortError, PortResult, ScheduleSource},
};
use serde::Deserialize;
use tracing::debug;

//=========================================================================================
// Wire Format
//=========================================================================================
// Only `data.stages[].matches[]` is read; everything else in the payload is ignored.
//=========================================================================================

#[derive(Deserialize, Debug)]
struct ScheduleResponse {
    data: ScheduleData,
}

#[derive(Deserialize, Debug)]
struct ScheduleData {
    stages: Vec<Stage>,
}

#[derive(Deserialize, Debug)]
struct Stage {
    #[serde(default)]
    matches: Vec<ApiMatch>,
}

#[derive(Deserialize, Debug)]
struct ApiMatch {
    #[serde(rename = "startDateTS", with = "chrono::serde::ts_milliseconds")]
    start_date_ts: DateTime<Utc>,
    #[serde(rename = "endDateTS", with = "chrono::serde::ts_milliseconds")]
    end_date_ts: DateTime<Utc>,
    state: String,
}

impl From<ApiMatch> for MatchRecord {
    fn from(m: ApiMatch) -> Self {
        MatchRecord::new(m.start_date_ts, m.end_date_ts, parse_state(&m.state))
    }
}

fn parse_state(raw: &str) -> MatchState {
    match raw {
        "PENDING" => MatchState::Pending,
        "IN_PROGRESS" => MatchState::InProgress,
        "CONCLUDED" | "COMPLETED" => MatchState::Concluded,
        _ => MatchState::Other,
    }
}

/// Parses a schedule payload into match records ordered by start time.
///
/// The API lists matches stage by stage, which is not a guarantee of global
/// ordering, so records are sorted here before they reach the reducer.
pub fn parse_schedule(body: &str) -> PortResult<Vec<MatchRecord>> {
    let response: ScheduleResponse =
        serde_json::from_str(body).map_err(|e| PortError::DataFormat(e.to_string()))?;

    let mut records: Vec<MatchRecord> = response
        .data
        .stages
        .into_iter()
        .flat_map(|stage| stage.matches)
        .map(MatchRecord::from)
        .collect();
    records.sort_by_key(|r| r.start);
    Ok(records)
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ScheduleSource` port over HTTP.
#[derive(Clone)]
pub struct HttpScheduleAdapter {
    client: reqwest::Client,
    url: String,
}

impl HttpScheduleAdapter {
    /// Creates a new `HttpScheduleAdapter` fetching from `url`.
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

//=========================================================================================
// `ScheduleSource` Trait Implementation
//=========================================================================================

#[async_trait]
impl ScheduleSource for HttpScheduleAdapter {
    async fn fetch_matches(&self) -> PortResult<Vec<MatchRecord>> {
        debug!("Fetching schedule from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e: reqwest::Error| PortError::Transport(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;

        let records = parse_schedule(&body)?;
        debug!("Fetched {} matches", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"{
        "data": {
            "id": 2019,
            "stages": [
                {
                    "id": 1,
                    "name": "Stage 1",
                    "matches": [
                        {
                            "id": 3, "state": "PENDING",
                            "startDateTS": 1554418800000, "endDateTS": 1554426000000
                        },
                        {
                            "id": 1, "state": "CONCLUDED",
                            "startDateTS": 1554400800000, "endDateTS": 1554408000000
                        }
                    ]
                },
                { "id": 2, "name": "Playoffs" },
                {
                    "id": 3,
                    "matches": [
                        {
                            "id": 2, "state": "IN_PROGRESS",
                            "startDateTS": 1554411600000, "endDateTS": 1554418800000
                        },
                        {
                            "id": 4, "state": "POSTPONED",
                            "startDateTS": 1554426000000, "endDateTS": 1554433200000
                        }
                    ]
                }
            ]
        }
    }"#;

    #[test]
    fn parses_matches_across_stages_in_start_order() {
        let records = parse_schedule(SAMPLE).unwrap();

        let states: Vec<MatchState> = records.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![
                MatchState::Concluded,
                MatchState::InProgress,
                MatchState::Pending,
                MatchState::Other,
            ]
        );
        assert_eq!(records[0].start, Utc.timestamp_millis_opt(1554400800000).unwrap());
        assert_eq!(records[2].end, Utc.timestamp_millis_opt(1554426000000).unwrap());
    }

    #[test]
    fn completed_is_an_alias_for_concluded() {
        assert_eq!(parse_state("COMPLETED"), MatchState::Concluded);
        assert_eq!(parse_state("pending"), MatchState::Other);
    }

    #[test]
    fn malformed_payloads_are_data_format_errors() {
        for body in [
            "not json",
            r#"{ "stages": [] }"#,
            r#"{ "data": { "stages": [ { "matches": [
                { "startDateTS": "soon", "endDateTS": 1, "state": "PENDING" }
            ] } ] } }"#,
        ] {
            assert!(matches!(parse_schedule(body), Err(PortError::DataFormat(_))), "{body}");
        }
    }

    #[tokio::test]
    async fn fetches_and_parses_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/schedule")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SAMPLE)
            .create_async()
            .await;

        let url = format!("{}/schedule", server.url());
        let adapter = HttpScheduleAdapter::new(reqwest::Client::new(), url);
        let records = adapter.fetch_matches().await.unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn server_errors_are_transport_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/schedule")
            .with_status(503)
            .create_async()
            .await;

        let url = format!("{}/schedule", server.url());
        let adapter = HttpScheduleAdapter::new(reqwest::Client::new(), url);

        assert!(matches!(adapter.fetch_matches().await, Err(PortError::Transport(_))));
    }
}
