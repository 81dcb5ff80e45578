//! Issue and taint-vulnerability downloads.

use serde::Deserialize;

use super::{Component, component_path, push_paging};
use crate::factory::StatusFilter;
use crate::protobuf::{DelimitedReader, ServerIssueProto, severity_name};
use crate::request::{ApiRequest, ParseError, ResponseFormat, parse_json};

/// Rule repositories whose vulnerabilities come from taint analysis.
pub const TAINT_REPOSITORIES: &[&str] = &[
    "roslyn.sonaranalyzer.security.cs",
    "javasecurity",
    "jssecurity",
    "tssecurity",
    "phpsecurity",
    "pythonsecurity",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTextRange {
    pub start_line: u32,
    pub end_line: u32,
    pub start_offset: u32,
    pub end_offset: u32,
}

/// An issue as stored on the server, whatever endpoint served it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIssue {
    pub key: String,
    /// `repository:key`
    pub rule_key: String,
    pub message: String,
    pub file_path: Option<String>,
    pub line: Option<u32>,
    pub text_range: Option<IssueTextRange>,
    pub severity: Option<String>,
    pub issue_type: Option<String>,
    pub status: String,
    pub resolution: Option<String>,
    pub creation_date: Option<String>,
}

impl ServerIssue {
    #[must_use]
    pub fn is_taint(&self) -> bool {
        self.rule_key
            .split_once(':')
            .is_some_and(|(repo, _)| TAINT_REPOSITORIES.contains(&repo))
    }
}

/// Legacy `batch/issues`, one protobuf message per issue.
#[derive(Debug, Clone, Copy)]
pub struct BatchIssuesRequest<'a> {
    pub project_key: &'a str,
    pub branch: Option<&'a str>,
}

impl From<ServerIssueProto> for ServerIssue {
    fn from(proto: ServerIssueProto) -> Self {
        let rule_key = match (&proto.rule_repository, &proto.rule_key) {
            (Some(repo), Some(key)) => format!("{repo}:{key}"),
            (_, key) => key.clone().unwrap_or_default(),
        };
        Self {
            key: proto.key.unwrap_or_default(),
            rule_key,
            message: proto.msg.unwrap_or_default(),
            file_path: proto.path,
            line: proto.line.and_then(|l| u32::try_from(l).ok()),
            text_range: None,
            severity: proto.severity.and_then(severity_name).map(str::to_string),
            issue_type: proto.r#type,
            status: proto.status.unwrap_or_else(|| "OPEN".to_string()),
            resolution: proto.resolution.filter(|r| !r.is_empty()),
            creation_date: None,
        }
    }
}

impl ApiRequest for BatchIssuesRequest<'_> {
    type Response = Vec<ServerIssue>;

    fn path(&self) -> String {
        "batch/issues".to_string()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("key", self.project_key.to_string())];
        if let Some(branch) = self.branch {
            query.push(("branch", branch.to_string()));
        }
        query
    }

    fn format(&self) -> ResponseFormat {
        ResponseFormat::Protobuf
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<ServerIssue>, ParseError> {
        let messages: Vec<ServerIssueProto> = DelimitedReader::new(body).read_all()?;
        Ok(messages.into_iter().map(ServerIssue::from).collect())
    }
}

/// Restricts a search to a subset of issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueScope {
    All,
    /// Only `VULNERABILITY`; callers narrow to taint repositories afterwards.
    Vulnerabilities,
}

/// One page of `api/issues/search`.
#[derive(Debug, Clone, Copy)]
pub struct SearchIssuesRequest<'a> {
    pub project_key: &'a str,
    pub branch: Option<&'a str>,
    pub organization: Option<&'a str>,
    pub status_filter: StatusFilter,
    pub scope: IssueScope,
    pub page: u32,
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchIssue {
    key: String,
    rule: String,
    component: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    text_range: Option<IssueTextRange>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default, rename = "type")]
    issue_type: Option<String>,
    status: String,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    creation_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchIssuesResponse {
    issues: Vec<SearchIssue>,
    #[serde(default)]
    components: Vec<Component>,
}

impl ApiRequest for SearchIssuesRequest<'_> {
    type Response = Vec<ServerIssue>;

    fn path(&self) -> String {
        "api/issues/search".to_string()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("componentKeys", self.project_key.to_string())];
        if let Some(branch) = self.branch {
            query.push(("branch", branch.to_string()));
        }
        match self.status_filter {
            StatusFilter::Statuses => query.push(("statuses", "OPEN,CONFIRMED,REOPENED".into())),
            StatusFilter::IssueStatuses => query.push(("issueStatuses", "OPEN,CONFIRMED".into())),
        }
        if self.scope == IssueScope::Vulnerabilities {
            query.push(("types", "VULNERABILITY".to_string()));
        }
        push_paging(&mut query, self.page, self.page_size, self.organization);
        query
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<ServerIssue>, ParseError> {
        let response: SearchIssuesResponse = parse_json(body)?;
        let components = response.components;
        Ok(response
            .issues
            .into_iter()
            .map(|issue| ServerIssue {
                file_path: component_path(&components, &issue.component),
                key: issue.key,
                rule_key: issue.rule,
                message: issue.message,
                line: issue.line,
                text_range: issue.text_range,
                severity: issue.severity,
                issue_type: issue.issue_type,
                status: issue.status,
                resolution: issue.resolution,
                creation_date: issue.creation_date,
            })
            .collect())
    }
}
