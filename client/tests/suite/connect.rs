use sonarlink_client::{ClientError, ConnectionInfo, FactoryError, SonarQubeClient};
use sonarlink_types::{Credentials, ServerFlavor, ServerVersion};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{TOKEN_AUTH_HEADER, connect, connection, fast_options, start_server};

#[tokio::test]
async fn connect_reads_version_with_token_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/server/version"))
        .and(header("authorization", TOKEN_AUTH_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_string("10.4.1.88267"))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let info = client.server_info();
    assert_eq!(info.flavor, ServerFlavor::SonarQube);
    assert!(info.version > ServerVersion::new(10, 4));
    assert_eq!(info.version.to_string(), "10.4.1.88267");
}

#[tokio::test]
async fn username_password_auth_allows_separator_in_password() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/server/version"))
        .and(header("authorization", "Basic YWRtaW46cDp3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("9.9"))
        .expect(1)
        .mount(&server)
        .await;

    let info = ConnectionInfo::new(&server.uri())
        .unwrap()
        .with_credentials(Credentials::username_password("admin", "p:w"));
    SonarQubeClient::connect(info, fast_options()).await.unwrap();
}

#[tokio::test]
async fn version_failure_is_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = SonarQubeClient::connect(connection(&server), fast_options()).await;
    assert!(matches!(
        result,
        Err(ClientError::UnexpectedStatus { status: 401, .. })
    ));
}

#[tokio::test]
async fn validate_credentials_reads_valid_flag() {
    let server = start_server("10.4").await;
    Mock::given(method("GET"))
        .and(path("/api/authentication/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"valid":true}"#))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let result = client.validate_credentials().await.unwrap();
    assert_eq!(result.value, Some(true));
}

#[tokio::test]
async fn missing_endpoint_is_a_result_not_an_error() {
    let server = start_server("10.4").await;
    Mock::given(method("GET"))
        .and(path("/api/qualityprofiles/search"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let result = client.get_quality_profiles("proj").await.unwrap();
    assert_eq!(result.status, 404);
    assert!(result.value.is_none());
}

#[tokio::test]
async fn old_server_rejects_hotspots_without_calling_it() {
    let server = start_server("8.1").await;
    Mock::given(method("GET"))
        .and(path("/api/hotspots/search"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let result = client.get_hotspots("proj", None).await;
    assert!(matches!(
        result,
        Err(ClientError::Factory(FactoryError::NotSupported { .. }))
    ));
}

#[tokio::test]
async fn sonarcloud_sends_organization() {
    let server = start_server("8.0.0.29455").await;
    Mock::given(method("GET"))
        .and(path("/api/qualityprofiles/search"))
        .and(query_param("organization", "my-org"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"profiles":[]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let info = connection(&server).with_organization("my-org");
    let client = SonarQubeClient::connect(info, fast_options()).await.unwrap();
    assert_eq!(client.server_info().flavor, ServerFlavor::SonarCloud);
    let result = client.get_quality_profiles("proj").await.unwrap();
    assert_eq!(result.value, Some(Vec::new()));
}
