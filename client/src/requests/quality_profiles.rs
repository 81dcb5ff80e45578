use serde::Deserialize;

use crate::request::{ApiRequest, ParseError, parse_json};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfile {
    pub key: String,
    pub name: String,
    pub language: String,
    #[serde(default)]
    pub language_name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub active_rule_count: u32,
    #[serde(default)]
    pub rules_updated_at: Option<String>,
}

/// `api/qualityprofiles/search` for one project.
#[derive(Debug, Clone, Copy)]
pub struct SearchQualityProfilesRequest<'a> {
    pub project_key: &'a str,
    pub organization: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SearchQualityProfilesResponse {
    profiles: Vec<QualityProfile>,
}

impl ApiRequest for SearchQualityProfilesRequest<'_> {
    type Response = Vec<QualityProfile>;

    fn path(&self) -> String {
        "api/qualityprofiles/search".to_string()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("project", self.project_key.to_string())];
        if let Some(organization) = self.organization {
            query.push(("organization", organization.to_string()));
        }
        query
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<QualityProfile>, ParseError> {
        Ok(parse_json::<SearchQualityProfilesResponse>(body)?.profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profiles() {
        let request = SearchQualityProfilesRequest {
            project_key: "proj",
            organization: None,
        };
        let body = br#"{"profiles":[{"key":"AU-1","name":"Sonar way","language":"cs",
            "languageName":"C#","isDefault":true,"activeRuleCount":312}]}"#;
        let profiles = request.parse(body).unwrap();
        assert_eq!(profiles[0].language, "cs");
        assert!(profiles[0].is_default);
        assert_eq!(request.query(), vec![("project", "proj".to_string())]);
    }
}
