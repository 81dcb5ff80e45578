//! Authenticated HTTP plumbing shared by every request.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use sonarlink_types::{Credentials, Secret, ServerFlavor};
use url::Url;

use crate::auth::authorization_header;
use crate::error::ClientError;
use crate::request::{ApiRequest, RequestResult};
use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Where to connect and as whom.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    server_url: Url,
    organization: Option<String>,
    credentials: Option<Credentials>,
}

impl ConnectionInfo {
    /// A trailing `/` is added to the base URL so relative API paths resolve under it.
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let mut normalized = server_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let server_url = Url::parse(&normalized).map_err(|source| ClientError::InvalidUrl {
            url: server_url.to_string(),
            source,
        })?;
        Ok(Self {
            server_url,
            organization: None,
            credentials: None,
        })
    }

    /// SonarCloud connections are identified by their organization.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    #[must_use]
    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    #[must_use]
    pub fn flavor(&self) -> ServerFlavor {
        ServerFlavor::from_is_sonar_cloud(self.organization.is_some())
    }
}

#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Whole-request timeout; not applied to the event stream.
    pub timeout: Duration,
    pub retry: RetryConfig,
    /// Items per page for paged endpoints, clamped to the server maximum.
    pub page_size: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            page_size: crate::paging::MAX_PAGE_SIZE,
        }
    }
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .user_agent(concat!("sonarlink/", env!("CARGO_PKG_VERSION")))
}

async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// One server connection: base URL, auth header and retry policy.
#[derive(Clone)]
pub struct ApiHttp {
    client: reqwest::Client,
    stream_client: reqwest::Client,
    base_url: Url,
    retry: RetryConfig,
}

impl ApiHttp {
    pub fn new(connection: &ConnectionInfo, options: &HttpOptions) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(credentials) = &connection.credentials {
            let header: Secret = authorization_header(credentials)?;
            let mut value = HeaderValue::from_str(header.expose_secret())
                .map_err(|_| ClientError::InvalidHeader("authorization"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = base_client_builder()
            .default_headers(headers.clone())
            .timeout(options.timeout)
            .build()
            .map_err(ClientError::Build)?;
        // The push stream stays open indefinitely; only connecting is bounded.
        let stream_client = base_client_builder()
            .default_headers(headers)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            client,
            stream_client,
            base_url: connection.server_url.clone(),
            retry: options.retry.clone(),
        })
    }

    pub fn url(&self, path: &str, query: &[(&'static str, String)]) -> Result<Url, ClientError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|source| ClientError::InvalidUrl {
                url: path.to_string(),
                source,
            })?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Execute `request`. A non-success status yields `RequestResult { value: None }`.
    pub async fn execute<R: ApiRequest>(
        &self,
        request: &R,
    ) -> Result<RequestResult<R::Response>, ClientError> {
        let path = request.path();
        let url = self.url(&path, &request.query())?;
        let accept = request.format().accept();

        let outcome = send_with_retry(
            || self.client.get(url.clone()).header(ACCEPT, accept),
            &self.retry,
        )
        .await;
        let response = match outcome {
            RetryOutcome::Response(response) => response,
            RetryOutcome::ConnectionError { attempts, source } => {
                tracing::debug!(path = %path, attempts, error = %source, "Request failed");
                return Err(ClientError::Http { path, source });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            tracing::debug!(path = %path, status = status.as_u16(), body = %body, "Request returned error status");
            return Ok(RequestResult::failed(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Http {
                path: path.clone(),
                source,
            })?;
        let value = request
            .parse(&body)
            .map_err(|source| ClientError::Parse { path, source })?;
        Ok(RequestResult::ok(status.as_u16(), value))
    }

    /// Open a long-lived streaming GET. Returns the response when it is 2xx.
    pub async fn open_stream(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        accept: &'static str,
    ) -> Result<RequestResult<reqwest::Response>, ClientError> {
        let url = self.url(path, query)?;
        let response = self
            .stream_client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                path: path.to_string(),
                source,
            })?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = read_capped_error_body(response).await;
            tracing::debug!(path, status, body = %body, "Stream request returned error status");
            return Ok(RequestResult::failed(status));
        }
        Ok(RequestResult::ok(status, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash_so_paths_nest() {
        let info = ConnectionInfo::new("https://sq.example.com/sonar").unwrap();
        let http = ApiHttp::new(&info, &HttpOptions::default()).unwrap();
        let url = http
            .url("api/issues/search", &[("p", "1".to_string()), ("ps", "500".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sq.example.com/sonar/api/issues/search?p=1&ps=500"
        );
    }

    #[test]
    fn organization_means_sonarcloud() {
        let info = ConnectionInfo::new("https://sonarcloud.io").unwrap();
        assert_eq!(info.flavor(), ServerFlavor::SonarQube);
        assert_eq!(info.with_organization("org").flavor(), ServerFlavor::SonarCloud);
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            ConnectionInfo::new("not a url"),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn invalid_credentials_fail_at_construction() {
        let info = ConnectionInfo::new("https://sq")
            .unwrap()
            .with_credentials(Credentials::username_password("a:b", "pw"));
        assert!(matches!(
            ApiHttp::new(&info, &HttpOptions::default()),
            Err(ClientError::Auth(_))
        ));
    }
}
