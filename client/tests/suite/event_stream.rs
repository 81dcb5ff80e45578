use sonarlink_client::{ClientError, FactoryError, ServerEvent, SonarQubeClient};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{connection, connect, fast_options, start_server};

const STREAM: &str = concat!(
    ": keep-alive\n\n",
    "event: SomeFutureEventType\ndata: {\"whatever\":1}\n\n",
    "event: TaintVulnerabilityClosed\r\ndata: {\"projectKey\":\"proj\",\"key\":\"T1\"}\r\n\r\n",
    "event: TaintVulnerabilityClosed\ndata: {broken\n\n",
    "event: RuleSetChanged\ndata: {\"projects\":[\"proj\"],\"deactivatedRules\":[\"java:S1\"]}\n\n",
);

#[tokio::test]
async fn stream_yields_known_events_then_none_forever() {
    let server = start_server("10.4").await;
    Mock::given(method("GET"))
        .and(path("/api/push/sonarlint_events"))
        .and(header("accept", "text/event-stream"))
        .and(query_param("projectKeys", "proj"))
        .and(query_param("languages", "java,cs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(STREAM, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let mut reader = client
        .open_event_stream(&["proj".to_string()], &["java".to_string(), "cs".to_string()])
        .await
        .unwrap()
        .value
        .unwrap();

    let first = reader.read().await.unwrap();
    assert!(matches!(
        first,
        Some(ServerEvent::TaintVulnerabilityClosed(ref closed)) if closed.key == "T1"
    ));
    let second = reader.read().await.unwrap();
    assert!(matches!(second, Some(ServerEvent::RuleSetChanged(_))));
    assert!(reader.read().await.unwrap().is_none());
    assert!(reader.read().await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_utf8_frame_is_skipped_and_the_stream_continues() {
    let server = start_server("10.4").await;
    let mut body = b"event: TaintVulnerabilityClosed\ndata: {\"projectKey\":\"proj\",\"key\":\"T\xff\"}\n\n".to_vec();
    body.extend_from_slice(
        b"event: TaintVulnerabilityClosed\ndata: {\"projectKey\":\"proj\",\"key\":\"T2\"}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/api/push/sonarlint_events"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let mut reader = client
        .open_event_stream(&["proj".to_string()], &[])
        .await
        .unwrap()
        .value
        .unwrap();

    let event = reader.read().await.unwrap();
    assert!(matches!(
        event,
        Some(ServerEvent::TaintVulnerabilityClosed(ref closed)) if closed.key == "T2"
    ));
    assert!(reader.read().await.unwrap().is_none());
}

#[tokio::test]
async fn stream_rejection_is_a_status() {
    let server = start_server("10.4").await;
    Mock::given(method("GET"))
        .and(path("/api/push/sonarlint_events"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let result = client.open_event_stream(&["proj".to_string()], &[]).await.unwrap();
    assert_eq!(result.status, 403);
    assert!(result.value.is_none());
}

#[tokio::test]
async fn sonarcloud_has_no_event_stream() {
    let server = start_server("8.0").await;
    let info = connection(&server).with_organization("org");
    let client = SonarQubeClient::connect(info, fast_options()).await.unwrap();
    let result = client.open_event_stream(&["proj".to_string()], &[]).await;
    assert!(matches!(
        result,
        Err(ClientError::Factory(FactoryError::NotSupported { .. }))
    ));
}
