//! Mock SonarQube server fixtures.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{Value, json};
use sonarlink_client::{ConnectionInfo, HttpOptions, RetryConfig, SonarQubeClient};
use sonarlink_types::Credentials;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "squ_123";
/// `Basic base64("squ_123:")`
pub const TOKEN_AUTH_HEADER: &str = "Basic c3F1XzEyMzo=";

/// Start a mock server that reports `version` from `api/server/version`.
pub async fn start_server(version: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/server/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string(version))
        .mount(&server)
        .await;
    server
}

pub fn fast_options() -> HttpOptions {
    HttpOptions {
        timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter_factor: 0.0,
        },
        page_size: 500,
    }
}

pub fn connection(server: &MockServer) -> ConnectionInfo {
    ConnectionInfo::new(&server.uri())
        .unwrap()
        .with_credentials(Credentials::token(TOKEN))
}

pub async fn connect(server: &MockServer) -> SonarQubeClient {
    SonarQubeClient::connect(connection(server), fast_options())
        .await
        .unwrap()
}

/// `count` search issues numbered from `first`.
pub fn issues_page(first: usize, count: usize) -> Value {
    let issues: Vec<Value> = (first..first + count)
        .map(|i| {
            json!({
                "key": format!("AX{i}"),
                "rule": "csharpsquid:S101",
                "component": "proj:src/A.cs",
                "message": "Rename this class",
                "line": 1,
                "status": "OPEN",
            })
        })
        .collect();
    json!({
        "paging": {"pageIndex": 1, "pageSize": 500, "total": 0},
        "issues": issues,
        "components": [{"key": "proj:src/A.cs", "path": "src/A.cs"}]
    })
}

pub fn hotspots_page(count: usize) -> Value {
    let hotspots: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "key": format!("H{i}"),
                "ruleKey": "java:S2068",
                "component": "proj:src/Db.java",
                "message": "Review",
                "status": "TO_REVIEW",
            })
        })
        .collect();
    json!({ "hotspots": hotspots, "components": [] })
}
