//! Typed server push events.

use serde::Deserialize;

use crate::sse::RawEvent;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedIssue {
    pub issue_key: String,
    #[serde(default)]
    pub branch_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueChangedEvent {
    pub project_key: String,
    pub issues: Vec<ChangedIssue>,
    #[serde(default)]
    pub user_severity: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub resolved: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTextRange {
    pub start_line: u32,
    pub start_line_offset: u32,
    pub end_line: u32,
    pub end_line_offset: u32,
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLocation {
    pub file_path: String,
    pub message: String,
    #[serde(default)]
    pub text_range: Option<EventTextRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaintVulnerabilityRaisedEvent {
    pub key: String,
    pub project_key: String,
    #[serde(default)]
    pub branch: Option<String>,
    /// Epoch milliseconds.
    pub creation_date: i64,
    pub rule_key: String,
    pub severity: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub main_location: EventLocation,
    #[serde(default)]
    pub rule_description_context_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaintVulnerabilityClosedEvent {
    pub project_key: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleParam {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActivatedRule {
    pub key: String,
    pub language: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub params: Vec<RuleParam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetChangedEvent {
    pub projects: Vec<String>,
    #[serde(default)]
    pub activated_rules: Vec<ActivatedRule>,
    #[serde(default)]
    pub deactivated_rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    IssueChanged(IssueChangedEvent),
    TaintVulnerabilityRaised(TaintVulnerabilityRaisedEvent),
    TaintVulnerabilityClosed(TaintVulnerabilityClosedEvent),
    RuleSetChanged(RuleSetChangedEvent),
}

/// Which feature listener consumes an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFamily {
    Issue,
    Taint,
    QualityProfile,
}

impl ServerEvent {
    #[must_use]
    pub fn family(&self) -> EventFamily {
        match self {
            Self::IssueChanged(_) => EventFamily::Issue,
            Self::TaintVulnerabilityRaised(_) | Self::TaintVulnerabilityClosed(_) => {
                EventFamily::Taint
            }
            Self::RuleSetChanged(_) => EventFamily::QualityProfile,
        }
    }
}

type Decoder = fn(&str) -> serde_json::Result<ServerEvent>;

const DECODERS: &[(&str, Decoder)] = &[
    ("IssueChanged", |data| {
        serde_json::from_str(data).map(ServerEvent::IssueChanged)
    }),
    ("TaintVulnerabilityRaised", |data| {
        serde_json::from_str(data).map(ServerEvent::TaintVulnerabilityRaised)
    }),
    ("TaintVulnerabilityClosed", |data| {
        serde_json::from_str(data).map(ServerEvent::TaintVulnerabilityClosed)
    }),
    ("RuleSetChanged", |data| {
        serde_json::from_str(data).map(ServerEvent::RuleSetChanged)
    }),
];

#[must_use]
pub fn is_supported_event_type(event_type: &str) -> bool {
    DECODERS.iter().any(|(name, _)| *name == event_type)
}

/// Decode a raw frame. Unknown types and undecodable payloads yield `None`.
#[must_use]
pub fn decode_event(raw: &RawEvent) -> Option<ServerEvent> {
    let (_, decode) = DECODERS
        .iter()
        .find(|(name, _)| *name == raw.event_type)?;
    match decode(&raw.data) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(event_type = %raw.event_type, error = %e, "Failed to decode server event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(event_type: &str, data: &str) -> RawEvent {
        RawEvent {
            event_type: event_type.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn decodes_issue_changed() {
        let event = decode_event(&raw(
            "IssueChanged",
            r#"{"projectKey":"p","issues":[{"issueKey":"AX1","branchName":"main"}],"resolved":true}"#,
        ))
        .unwrap();
        let ServerEvent::IssueChanged(changed) = &event else {
            panic!("unexpected {event:?}");
        };
        assert_eq!(changed.issues[0].issue_key, "AX1");
        assert_eq!(changed.resolved, Some(true));
        assert_eq!(event.family(), EventFamily::Issue);
    }

    #[test]
    fn decodes_taint_raised() {
        let data = r#"{
            "key":"T1","projectKey":"p","branch":"main","creationDate":1700000000000,
            "ruleKey":"javasecurity:S3649","severity":"MAJOR","type":"VULNERABILITY",
            "mainLocation":{"filePath":"src/A.java","message":"SQL injection",
                "textRange":{"startLine":1,"startLineOffset":2,"endLine":3,"endLineOffset":4,"hash":"h"}},
            "flows":[]
        }"#;
        let Some(ServerEvent::TaintVulnerabilityRaised(taint)) =
            decode_event(&raw("TaintVulnerabilityRaised", data))
        else {
            panic!("expected taint event");
        };
        assert_eq!(taint.main_location.file_path, "src/A.java");
        assert_eq!(taint.main_location.text_range.unwrap().end_line, 3);
    }

    #[test]
    fn decodes_rule_set_changed() {
        let data = r#"{"projects":["p"],"activatedRules":[{"key":"java:S1","language":"java","params":[{"key":"max","value":"3"}]}],"deactivatedRules":["java:S2"]}"#;
        let event = decode_event(&raw("RuleSetChanged", data)).unwrap();
        assert_eq!(event.family(), EventFamily::QualityProfile);
    }

    #[test]
    fn unknown_type_is_none() {
        assert_eq!(decode_event(&raw("SomeFutureEventType", "{}")), None);
        assert!(!is_supported_event_type("SomeFutureEventType"));
    }

    #[test]
    fn bad_payload_is_none() {
        assert_eq!(decode_event(&raw("TaintVulnerabilityClosed", "{not json")), None);
        assert_eq!(decode_event(&raw("TaintVulnerabilityClosed", r#"{"key":"k"}"#)), None);
    }
}
