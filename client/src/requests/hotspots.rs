use serde::Deserialize;

use super::{Component, component_path, push_paging};
use crate::requests::issues::IssueTextRange;
use crate::request::{ApiRequest, ParseError, parse_json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHotspot {
    pub key: String,
    pub rule_key: String,
    pub message: String,
    pub file_path: Option<String>,
    pub text_range: Option<IssueTextRange>,
    pub security_category: Option<String>,
    pub vulnerability_probability: Option<String>,
    pub status: String,
    pub resolution: Option<String>,
}

/// One page of `api/hotspots/search`.
#[derive(Debug, Clone, Copy)]
pub struct SearchHotspotsRequest<'a> {
    pub project_key: &'a str,
    pub branch: Option<&'a str>,
    pub organization: Option<&'a str>,
    pub page: u32,
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHotspot {
    key: String,
    rule_key: String,
    component: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    text_range: Option<IssueTextRange>,
    #[serde(default)]
    security_category: Option<String>,
    #[serde(default)]
    vulnerability_probability: Option<String>,
    status: String,
    #[serde(default)]
    resolution: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHotspotsResponse {
    hotspots: Vec<SearchHotspot>,
    #[serde(default)]
    components: Vec<Component>,
}

impl ApiRequest for SearchHotspotsRequest<'_> {
    type Response = Vec<ServerHotspot>;

    fn path(&self) -> String {
        "api/hotspots/search".to_string()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("projectKey", self.project_key.to_string())];
        if let Some(branch) = self.branch {
            query.push(("branch", branch.to_string()));
        }
        push_paging(&mut query, self.page, self.page_size, self.organization);
        query
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<ServerHotspot>, ParseError> {
        let response: SearchHotspotsResponse = parse_json(body)?;
        let components = response.components;
        Ok(response
            .hotspots
            .into_iter()
            .map(|h| ServerHotspot {
                file_path: component_path(&components, &h.component),
                key: h.key,
                rule_key: h.rule_key,
                message: h.message,
                text_range: h.text_range,
                security_category: h.security_category,
                vulnerability_probability: h.vulnerability_probability,
                status: h.status,
                resolution: h.resolution,
            })
            .collect())
    }
}
