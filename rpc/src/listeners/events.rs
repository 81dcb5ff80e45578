//! Engine notifications that feed the feature stores.
//!
//! Each inbound notification is decoded into a [`ClientEvent`] and pushed onto
//! an unbounded channel; the reader task never waits on the consumer.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sonarlink_types::{ConfigScopeId, ConnectionId};
use tokio::sync::mpsc;

use super::{Listener, ListenerRegistryBuilder};
use crate::dto::TextRangeDto;

pub const START_PROGRESS: &str = "progress/startProgress";
pub const REPORT_PROGRESS: &str = "progress/reportProgress";
pub const END_PROGRESS: &str = "progress/endProgress";
pub const SHOW_SMART_NOTIFICATION: &str = "smartNotification/showSmartNotification";
pub const DID_CHANGE_TAINT_VULNERABILITIES: &str = "taintVulnerability/didChangeTaintVulnerabilities";
pub const DID_CHANGE_DEPENDENCY_RISKS: &str = "dependencyRisk/didChangeDependencyRisks";
pub const RAISE_ISSUES: &str = "analysis/raiseIssues";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartProgressParams {
    pub task_id: String,
    #[serde(default)]
    pub config_scope_id: Option<ConfigScopeId>,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub indeterminate: bool,
    #[serde(default)]
    pub cancellable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportProgressParams {
    pub task_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub percentage: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndProgressParams {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowSmartNotificationParams {
    pub text: String,
    pub link: String,
    #[serde(default)]
    pub scope_ids: Vec<ConfigScopeId>,
    pub category: String,
    pub connection_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaintVulnerabilityDto {
    pub id: String,
    pub sonar_server_key: String,
    #[serde(default)]
    pub resolved: bool,
    pub rule_key: String,
    pub message: String,
    pub ide_file_path: String,
    #[serde(default)]
    pub introduction_date: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default, rename = "type")]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub text_range: Option<TextRangeDto>,
    #[serde(default)]
    pub rule_description_context_key: Option<String>,
    #[serde(default)]
    pub is_on_new_code: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeTaintVulnerabilitiesParams {
    pub config_scope_id: ConfigScopeId,
    #[serde(default)]
    pub closed_taint_vulnerability_ids: Vec<String>,
    #[serde(default)]
    pub added_taint_vulnerabilities: Vec<TaintVulnerabilityDto>,
    #[serde(default)]
    pub updated_taint_vulnerabilities: Vec<TaintVulnerabilityDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRiskDto {
    pub id: String,
    #[serde(rename = "type")]
    pub risk_type: String,
    pub severity: String,
    pub status: String,
    pub package_name: String,
    pub package_version: String,
    /// Status changes the user may apply next.
    #[serde(default)]
    pub transitions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeDependencyRisksParams {
    pub config_scope_id: ConfigScopeId,
    #[serde(default)]
    pub closed_dependency_risk_ids: Vec<String>,
    #[serde(default)]
    pub added_dependency_risks: Vec<DependencyRiskDto>,
    #[serde(default)]
    pub updated_dependency_risks: Vec<DependencyRiskDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaisedIssueDto {
    pub id: String,
    #[serde(default)]
    pub server_key: Option<String>,
    pub rule_key: String,
    pub primary_message: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default, rename = "type")]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub text_range: Option<TextRangeDto>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub is_on_new_code: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseIssuesParams {
    pub config_scope_id: ConfigScopeId,
    #[serde(default)]
    pub issues_by_file_uri: HashMap<String, Vec<RaisedIssueDto>>,
    /// `true` while the analysis is still streaming results for these files.
    #[serde(default)]
    pub is_intermediate_publication: bool,
    #[serde(default)]
    pub analysis_id: Option<String>,
}

/// Something the engine told us, in the order it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    ProgressStarted(StartProgressParams),
    ProgressReported(ReportProgressParams),
    ProgressEnded(EndProgressParams),
    SmartNotification(ShowSmartNotificationParams),
    TaintVulnerabilitiesChanged(DidChangeTaintVulnerabilitiesParams),
    DependencyRisksChanged(DidChangeDependencyRisksParams),
    IssuesRaised(RaiseIssuesParams),
}

/// Registers every event-style inbound method and forwards it as a [`ClientEvent`].
pub struct EventListener {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl EventListener {
    #[must_use]
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn publish(&self, event: ClientEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Dropping engine event: no consumer");
        }
    }
}

impl Listener for EventListener {
    fn register(self: Arc<Self>, builder: &mut ListenerRegistryBuilder) {
        let this = Arc::clone(&self);
        // The engine waits for the reply before showing progress.
        builder.request(START_PROGRESS, move |params: StartProgressParams| {
            this.publish(ClientEvent::ProgressStarted(params));
            Ok(())
        });
        let this = Arc::clone(&self);
        builder.notification(REPORT_PROGRESS, move |params| {
            this.publish(ClientEvent::ProgressReported(params));
        });
        let this = Arc::clone(&self);
        builder.notification(END_PROGRESS, move |params| {
            this.publish(ClientEvent::ProgressEnded(params));
        });
        let this = Arc::clone(&self);
        builder.notification(SHOW_SMART_NOTIFICATION, move |params| {
            this.publish(ClientEvent::SmartNotification(params));
        });
        let this = Arc::clone(&self);
        builder.notification(DID_CHANGE_TAINT_VULNERABILITIES, move |params| {
            this.publish(ClientEvent::TaintVulnerabilitiesChanged(params));
        });
        let this = Arc::clone(&self);
        builder.notification(DID_CHANGE_DEPENDENCY_RISKS, move |params| {
            this.publish(ClientEvent::DependencyRisksChanged(params));
        });
        builder.notification(RAISE_ISSUES, move |params| {
            self.publish(ClientEvent::IssuesRaised(params));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::ListenerRegistry;
    use serde_json::{Value, json};

    fn registry() -> (ListenerRegistry, mpsc::UnboundedReceiver<ClientEvent>) {
        let (listener, rx) = EventListener::channel();
        let mut builder = ListenerRegistry::builder();
        builder.listener(listener);
        (builder.build().unwrap(), rx)
    }

    #[test]
    fn start_progress_replies_null_and_publishes() {
        let (registry, mut rx) = registry();
        let reply = registry
            .handle_request(
                START_PROGRESS,
                Some(json!({"taskId": "t1", "title": "Analyzing", "cancellable": true})),
            )
            .unwrap();
        assert_eq!(reply, Value::Null);

        let Ok(ClientEvent::ProgressStarted(params)) = rx.try_recv() else {
            panic!("expected ProgressStarted");
        };
        assert_eq!(params.task_id, "t1");
        assert!(params.cancellable);
        assert!(!params.indeterminate);
    }

    #[test]
    fn notifications_are_forwarded_in_arrival_order() {
        let (registry, mut rx) = registry();
        registry.handle_notification(
            REPORT_PROGRESS,
            Some(json!({"taskId": "t1", "percentage": 40})),
        );
        registry.handle_notification(END_PROGRESS, Some(json!({"taskId": "t1"})));
        registry.handle_notification(
            DID_CHANGE_TAINT_VULNERABILITIES,
            Some(json!({
                "configScopeId": "scope",
                "closedTaintVulnerabilityIds": ["a"],
                "addedTaintVulnerabilities": [{
                    "id": "b",
                    "sonarServerKey": "AX1",
                    "ruleKey": "roslyn.sonaranalyzer.security.cs:S3649",
                    "message": "SQL injection",
                    "ideFilePath": "src/Db.cs",
                    "type": "VULNERABILITY",
                    "textRange": {"startLine": 1, "startLineOffset": 2, "endLine": 1, "endLineOffset": 9}
                }]
            })),
        );

        assert!(matches!(
            rx.try_recv(),
            Ok(ClientEvent::ProgressReported(ReportProgressParams { percentage: Some(40), .. }))
        ));
        assert!(matches!(rx.try_recv(), Ok(ClientEvent::ProgressEnded(_))));
        let Ok(ClientEvent::TaintVulnerabilitiesChanged(change)) = rx.try_recv() else {
            panic!("expected taint change");
        };
        assert_eq!(change.closed_taint_vulnerability_ids, vec!["a"]);
        let added = &change.added_taint_vulnerabilities[0];
        assert_eq!(added.issue_type.as_deref(), Some("VULNERABILITY"));
        assert_eq!(added.text_range.unwrap().end_line_offset, 9);
        assert!(change.updated_taint_vulnerabilities.is_empty());
    }

    #[test]
    fn malformed_notification_is_dropped() {
        let (registry, mut rx) = registry();
        registry.handle_notification(SHOW_SMART_NOTIFICATION, Some(json!({"text": 1})));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publishing_without_consumer_does_not_fail() {
        let (registry, rx) = registry();
        drop(rx);
        registry.handle_notification(END_PROGRESS, Some(json!({"taskId": "t"})));
    }
}
