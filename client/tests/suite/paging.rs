use sonarlink_client::paging::MAX_ITEMS;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{connect, hotspots_page, issues_page, start_server};

#[tokio::test]
async fn three_pages_until_short_page() {
    let server = start_server("10.4").await;
    for (page, first, count) in [("1", 0, 500), ("2", 500, 500), ("3", 1000, 37)] {
        Mock::given(method("GET"))
            .and(path("/api/issues/search"))
            .and(query_param("issueStatuses", "OPEN,CONFIRMED"))
            .and(query_param("ps", "500"))
            .and(query_param("p", page))
            .respond_with(ResponseTemplate::new(200).set_body_json(issues_page(first, count)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = connect(&server).await;
    let issues = client.get_issues("proj", None).await.unwrap().value.unwrap();
    assert_eq!(issues.len(), 1037);
    assert_eq!(issues[1036].key, "AX1036");
    assert_eq!(issues[0].file_path.as_deref(), Some("src/A.cs"));
}

#[tokio::test]
async fn server_maximum_stops_paging() {
    let server = start_server("10.4").await;
    Mock::given(method("GET"))
        .and(path("/api/hotspots/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hotspots_page(500)))
        .expect(20)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let hotspots = client.get_hotspots("proj", None).await.unwrap().value.unwrap();
    assert_eq!(hotspots.len(), MAX_ITEMS);
}

#[tokio::test]
async fn failed_page_fails_the_collection() {
    let server = start_server("10.4").await;
    Mock::given(method("GET"))
        .and(path("/api/hotspots/search"))
        .and(query_param("p", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hotspots_page(500)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/hotspots/search"))
        .and(query_param("p", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let result = client.get_hotspots("proj", None).await.unwrap();
    assert_eq!(result.status, 500);
    assert!(result.value.is_none());
}
