//! Rules active in a quality profile.

use std::collections::HashMap;

use serde::Deserialize;

use super::push_paging;
use crate::request::{ApiRequest, ParseError, parse_json};

const RULE_FIELDS: &str = "repo,name,severity,lang,htmlDesc,htmlNote,internalKey,isTemplate,templateKey,actives";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleParamValue {
    pub key: String,
    pub value: String,
}

/// A rule with its activation in the requested profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRule {
    pub key: String,
    pub name: String,
    pub language: Option<String>,
    /// Severity set by the profile, falling back to the rule default.
    pub severity: Option<String>,
    pub html_description: Option<String>,
    pub params: Vec<RuleParamValue>,
}

/// One page of `api/rules/search` for a quality profile.
#[derive(Debug, Clone, Copy)]
pub struct SearchRulesRequest<'a> {
    pub quality_profile_key: &'a str,
    pub organization: Option<&'a str>,
    pub page: u32,
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRule {
    key: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    html_desc: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Activation {
    q_profile: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    params: Vec<RuleParamValue>,
}

#[derive(Debug, Deserialize)]
struct SearchRulesResponse {
    rules: Vec<SearchRule>,
    #[serde(default)]
    actives: HashMap<String, Vec<Activation>>,
}

impl ApiRequest for SearchRulesRequest<'_> {
    type Response = Vec<ServerRule>;

    fn path(&self) -> String {
        "api/rules/search".to_string()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("qprofile", self.quality_profile_key.to_string()),
            ("activation", "true".to_string()),
            ("f", RULE_FIELDS.to_string()),
        ];
        push_paging(&mut query, self.page, self.page_size, self.organization);
        query
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<ServerRule>, ParseError> {
        let mut response: SearchRulesResponse = parse_json(body)?;
        Ok(response
            .rules
            .into_iter()
            .map(|rule| {
                let activation = response.actives.remove(&rule.key).and_then(|actives| {
                    actives
                        .into_iter()
                        .find(|a| a.q_profile == self.quality_profile_key)
                });
                let (severity, params) = match activation {
                    Some(a) => (a.severity.or(rule.severity), a.params),
                    None => (rule.severity, Vec::new()),
                };
                ServerRule {
                    key: rule.key,
                    name: rule.name,
                    language: rule.lang,
                    severity,
                    html_description: rule.html_desc,
                    params,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_overrides_default_severity() {
        let request = SearchRulesRequest {
            quality_profile_key: "qp1",
            organization: Some("org"),
            page: 1,
            page_size: 100,
        };
        let query = request.query();
        assert!(query.contains(&("organization", "org".to_string())));
        assert!(query.contains(&("activation", "true".to_string())));

        let body = br#"{
            "total": 2, "p": 1, "ps": 100,
            "rules": [
                {"key": "java:S1", "name": "One", "lang": "java", "severity": "MINOR"},
                {"key": "java:S2", "name": "Two", "lang": "java", "severity": "MAJOR"}
            ],
            "actives": {
                "java:S1": [{"qProfile": "qp1", "severity": "BLOCKER",
                             "params": [{"key": "max", "value": "10"}]}]
            }
        }"#;
        let rules = request.parse(body).unwrap();
        assert_eq!(rules[0].severity.as_deref(), Some("BLOCKER"));
        assert_eq!(rules[0].params[0].value, "10");
        assert_eq!(rules[1].severity.as_deref(), Some("MAJOR"));
        assert!(rules[1].params.is_empty());
    }
}
