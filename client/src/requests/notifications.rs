//! Developer notification events (`api/developers/search_events`).

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::request::{ApiRequest, ParseError, parse_json};

/// Timestamp format the endpoint expects, e.g. `2024-01-31T09:15:00+0000`.
const FROM_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationEvent {
    pub category: String,
    pub message: String,
    pub link: String,
    pub project: String,
    pub date: String,
}

/// Events for `project_keys` raised after `since`.
#[derive(Debug, Clone)]
pub struct SearchEventsRequest<'a> {
    pub project_keys: &'a [String],
    pub since: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SearchEventsResponse {
    #[serde(default)]
    events: Vec<NotificationEvent>,
}

impl ApiRequest for SearchEventsRequest<'_> {
    type Response = Vec<NotificationEvent>;

    fn path(&self) -> String {
        "api/developers/search_events".to_string()
    }

    /// `from` is repeated once per project, in the same order.
    fn query(&self) -> Vec<(&'static str, String)> {
        let from = self.since.format(FROM_FORMAT).to_string();
        vec![
            ("projects", self.project_keys.join(",")),
            ("from", vec![from; self.project_keys.len()].join(",")),
        ]
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<NotificationEvent>, ParseError> {
        Ok(parse_json::<SearchEventsResponse>(body)?.events)
    }
}
