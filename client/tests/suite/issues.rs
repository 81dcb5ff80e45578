use prost::Message;
use sonarlink_client::protobuf::ServerIssueProto;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{connect, issues_page, start_server};

#[tokio::test]
async fn old_server_uses_protobuf_batch_endpoint() {
    let server = start_server("7.1").await;
    let mut body = Vec::new();
    for key in ["A", "B"] {
        ServerIssueProto {
            key: Some(key.to_string()),
            rule_repository: Some("csharpsquid".to_string()),
            rule_key: Some("S101".to_string()),
            path: Some("src/A.cs".to_string()),
            ..Default::default()
        }
        .encode_length_delimited(&mut body)
        .unwrap();
    }
    Mock::given(method("GET"))
        .and(path("/batch/issues"))
        .and(query_param("key", "proj"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "application/x-protobuf"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let issues = client.get_issues("proj", None).await.unwrap().value.unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[1].key, "B");
    assert_eq!(issues[1].rule_key, "csharpsquid:S101");
}

#[tokio::test]
async fn pre_10_2_server_filters_with_statuses() {
    let server = start_server("9.9").await;
    Mock::given(method("GET"))
        .and(path("/api/issues/search"))
        .and(query_param("statuses", "OPEN,CONFIRMED,REOPENED"))
        .and(query_param("branch", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issues_page(0, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let issues = client
        .get_issues("proj", Some("main"))
        .await
        .unwrap()
        .value
        .unwrap();
    assert_eq!(issues.len(), 3);
}

#[tokio::test]
async fn taint_download_keeps_only_taint_rules() {
    let server = start_server("10.4").await;
    let body = serde_json::json!({
        "issues": [
            {"key": "T1", "rule": "javasecurity:S3649", "component": "proj:A.java",
             "message": "SQL", "status": "OPEN", "type": "VULNERABILITY"},
            {"key": "V1", "rule": "java:S2077", "component": "proj:A.java",
             "message": "Formatted SQL", "status": "OPEN", "type": "VULNERABILITY"}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/api/issues/search"))
        .and(query_param("types", "VULNERABILITY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let taints = client
        .get_taint_vulnerabilities("proj", None)
        .await
        .unwrap()
        .value
        .unwrap();
    assert_eq!(taints.len(), 1);
    assert_eq!(taints[0].key, "T1");
}
