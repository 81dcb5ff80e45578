//! Connected, version-aware SonarQube / SonarCloud client.

use chrono::{DateTime, Utc};
use sonarlink_types::{ServerInfo, ServerVersion};

use crate::error::ClientError;
use crate::factory::{LogicalRequest, RequestFactory, RequestImpl, StatusFilter};
use crate::http::{ApiHttp, ConnectionInfo, HttpOptions};
use crate::paging::{MAX_ITEMS, collect_pages};
use crate::request::{ApiRequest, RequestResult};
use crate::requests::hotspots::{SearchHotspotsRequest, ServerHotspot};
use crate::requests::issues::{BatchIssuesRequest, IssueScope, SearchIssuesRequest, ServerIssue};
use crate::requests::notifications::{NotificationEvent, SearchEventsRequest};
use crate::requests::quality_profiles::{QualityProfile, SearchQualityProfilesRequest};
use crate::requests::rules::{SearchRulesRequest, ServerRule};
use crate::requests::server::{GetVersionRequest, VERSION_PATH, ValidateCredentialsRequest};
use crate::sse::{HttpEventSource, SseStreamReader};

const PUSH_EVENTS_PATH: &str = "api/push/sonarlint_events";

pub struct SonarQubeClient {
    http: ApiHttp,
    info: ServerInfo,
    organization: Option<String>,
    factory: RequestFactory,
    page_size: usize,
}

impl SonarQubeClient {
    /// Fetch the server version and pick the request table for this connection.
    pub async fn connect(
        connection: ConnectionInfo,
        options: HttpOptions,
    ) -> Result<Self, ClientError> {
        let http = ApiHttp::new(&connection, &options)?;
        let result = http.execute(&GetVersionRequest).await?;
        let Some(version) = result.value else {
            return Err(ClientError::UnexpectedStatus {
                path: VERSION_PATH.to_string(),
                status: result.status,
            });
        };
        let flavor = connection.flavor();
        tracing::info!(
            server = %connection.server_url(),
            flavor = flavor.display_name(),
            version = %version,
            "Connected to server"
        );
        Ok(Self {
            http,
            info: ServerInfo::new(version, flavor),
            organization: connection.organization().map(str::to_string),
            factory: RequestFactory::for_flavor(flavor),
            page_size: options.page_size,
        })
    }

    #[must_use]
    pub fn server_info(&self) -> ServerInfo {
        self.info
    }

    fn resolve(&self, request: LogicalRequest) -> Result<RequestImpl, ClientError> {
        Ok(self.factory.resolve(request, self.version())?)
    }

    fn version(&self) -> ServerVersion {
        self.info.version
    }

    fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    async fn execute<R: ApiRequest>(
        &self,
        request: &R,
    ) -> Result<RequestResult<R::Response>, ClientError> {
        self.http.execute(request).await
    }

    pub async fn validate_credentials(&self) -> Result<RequestResult<bool>, ClientError> {
        self.resolve(LogicalRequest::ValidateCredentials)?;
        self.execute(&ValidateCredentialsRequest).await
    }

    /// Open issues of a project, through whichever endpoint the server supports.
    pub async fn get_issues(
        &self,
        project_key: &str,
        branch: Option<&str>,
    ) -> Result<RequestResult<Vec<ServerIssue>>, ClientError> {
        match self.resolve(LogicalRequest::Issues)? {
            RequestImpl::SearchIssues(status_filter) => {
                self.search_issues(project_key, branch, status_filter, IssueScope::All)
                    .await
            }
            _ => {
                self.execute(&BatchIssuesRequest {
                    project_key,
                    branch,
                })
                .await
            }
        }
    }

    /// Open taint vulnerabilities of a project.
    pub async fn get_taint_vulnerabilities(
        &self,
        project_key: &str,
        branch: Option<&str>,
    ) -> Result<RequestResult<Vec<ServerIssue>>, ClientError> {
        self.resolve(LogicalRequest::TaintVulnerabilities)?;
        let status_filter = match self.factory.resolve(LogicalRequest::Issues, self.version()) {
            Ok(RequestImpl::SearchIssues(filter)) => filter,
            _ => StatusFilter::Statuses,
        };
        let result = self
            .search_issues(project_key, branch, status_filter, IssueScope::Vulnerabilities)
            .await?;
        Ok(result.map(|issues| issues.into_iter().filter(ServerIssue::is_taint).collect()))
    }

    async fn search_issues(
        &self,
        project_key: &str,
        branch: Option<&str>,
        status_filter: StatusFilter,
        scope: IssueScope,
    ) -> Result<RequestResult<Vec<ServerIssue>>, ClientError> {
        let organization = self.organization();
        let result = collect_pages(self.page_size, MAX_ITEMS, |page, page_size| {
            let request = SearchIssuesRequest {
                project_key,
                branch,
                organization,
                status_filter,
                scope,
                page,
                page_size,
            };
            async move { self.execute(&request).await }
        })
        .await?;
        Ok(result.map(|paged| paged.items))
    }

    /// Rules activated in a quality profile.
    pub async fn get_rules(
        &self,
        quality_profile_key: &str,
    ) -> Result<RequestResult<Vec<ServerRule>>, ClientError> {
        self.resolve(LogicalRequest::Rules)?;
        let organization = self.organization();
        let result = collect_pages(self.page_size, MAX_ITEMS, |page, page_size| {
            let request = SearchRulesRequest {
                quality_profile_key,
                organization,
                page,
                page_size,
            };
            async move { self.execute(&request).await }
        })
        .await?;
        Ok(result.map(|paged| paged.items))
    }

    pub async fn get_hotspots(
        &self,
        project_key: &str,
        branch: Option<&str>,
    ) -> Result<RequestResult<Vec<ServerHotspot>>, ClientError> {
        self.resolve(LogicalRequest::Hotspots)?;
        let organization = self.organization();
        let result = collect_pages(self.page_size, MAX_ITEMS, |page, page_size| {
            let request = SearchHotspotsRequest {
                project_key,
                branch,
                organization,
                page,
                page_size,
            };
            async move { self.execute(&request).await }
        })
        .await?;
        Ok(result.map(|paged| paged.items))
    }

    pub async fn get_quality_profiles(
        &self,
        project_key: &str,
    ) -> Result<RequestResult<Vec<QualityProfile>>, ClientError> {
        self.resolve(LogicalRequest::QualityProfiles)?;
        self.execute(&SearchQualityProfilesRequest {
            project_key,
            organization: self.organization(),
        })
        .await
    }

    pub async fn get_notification_events(
        &self,
        project_keys: &[String],
        since: DateTime<Utc>,
    ) -> Result<RequestResult<Vec<NotificationEvent>>, ClientError> {
        self.resolve(LogicalRequest::Notifications)?;
        self.execute(&SearchEventsRequest {
            project_keys,
            since,
        })
        .await
    }

    /// Subscribe to push events for the given projects and languages.
    pub async fn open_event_stream(
        &self,
        project_keys: &[String],
        languages: &[String],
    ) -> Result<RequestResult<SseStreamReader<HttpEventSource>>, ClientError> {
        self.resolve(LogicalRequest::EventStream)?;
        let query = [
            ("projectKeys", project_keys.join(",")),
            ("languages", languages.join(",")),
        ];
        let result = self
            .http
            .open_stream(PUSH_EVENTS_PATH, &query, "text/event-stream")
            .await?;
        Ok(result.map(|response| SseStreamReader::new(HttpEventSource::new(response))))
    }
}
