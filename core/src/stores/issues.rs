use std::collections::HashMap;
use std::sync::RwLock;

use sonarlink_client::events::IssueChangedEvent;
use sonarlink_rpc::listeners::{RaiseIssuesParams, RaisedIssueDto};
use sonarlink_types::ConfigScopeId;

use super::{read, write};

type FileKey = (ConfigScopeId, String);

/// Issues raised by the engine, per configuration scope and file URI.
#[derive(Debug, Default)]
pub struct IssueStore {
    by_file: RwLock<HashMap<FileKey, Vec<RaisedIssueDto>>>,
}

impl IssueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the issues of every file in `params`. Returns the file count.
    pub fn apply_raised(&self, params: &RaiseIssuesParams) -> usize {
        let mut by_file = write(&self.by_file);
        for (uri, issues) in &params.issues_by_file_uri {
            by_file.insert((params.config_scope_id.clone(), uri.clone()), issues.clone());
        }
        params.issues_by_file_uri.len()
    }

    /// Apply a server-side change (resolution, severity or type) to the
    /// matching issues. Returns how many were updated.
    pub fn apply_issue_changed(&self, event: &IssueChangedEvent) -> usize {
        let mut by_file = write(&self.by_file);
        let mut updated = 0;
        for issue in by_file.values_mut().flatten() {
            let Some(server_key) = issue.server_key.as_deref() else {
                continue;
            };
            if !event.issues.iter().any(|i| i.issue_key == server_key) {
                continue;
            }
            if let Some(resolved) = event.resolved {
                issue.resolved = resolved;
            }
            if let Some(severity) = &event.user_severity {
                issue.severity = Some(severity.clone());
            }
            if let Some(issue_type) = &event.user_type {
                issue.issue_type = Some(issue_type.clone());
            }
            updated += 1;
        }
        updated
    }

    #[must_use]
    pub fn issues_for(&self, scope: &ConfigScopeId, uri: &str) -> Vec<RaisedIssueDto> {
        read(&self.by_file)
            .get(&(scope.clone(), uri.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        read(&self.by_file).values().map(Vec::len).sum()
    }

    pub fn clear_scope(&self, scope: &ConfigScopeId) {
        write(&self.by_file).retain(|(s, _), _| s != scope);
    }
}

#[cfg(test)]
mod tests {
    use sonarlink_client::events::ChangedIssue;

    use super::*;

    fn issue(id: &str, server_key: Option<&str>) -> RaisedIssueDto {
        RaisedIssueDto {
            id: id.to_string(),
            server_key: server_key.map(str::to_string),
            rule_key: "cs:S101".to_string(),
            primary_message: "Rename".to_string(),
            severity: Some("MINOR".to_string()),
            issue_type: None,
            text_range: None,
            resolved: false,
            is_on_new_code: true,
        }
    }

    fn raise(uri: &str, issues: Vec<RaisedIssueDto>) -> RaiseIssuesParams {
        RaiseIssuesParams {
            config_scope_id: ConfigScopeId::new("sln"),
            issues_by_file_uri: HashMap::from([(uri.to_string(), issues)]),
            is_intermediate_publication: false,
            analysis_id: None,
        }
    }

    #[test]
    fn raising_replaces_file_issues() {
        let store = IssueStore::new();
        store.apply_raised(&raise("file:///a.cs", vec![issue("1", None), issue("2", None)]));
        store.apply_raised(&raise("file:///a.cs", vec![issue("3", None)]));
        let scope = ConfigScopeId::new("sln");
        let issues = store.issues_for(&scope, "file:///a.cs");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "3");

        store.clear_scope(&scope);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn server_change_updates_matching_issues() {
        let store = IssueStore::new();
        store.apply_raised(&raise(
            "file:///a.cs",
            vec![issue("1", Some("AX1")), issue("2", Some("AX2")), issue("3", None)],
        ));
        let event = IssueChangedEvent {
            project_key: "proj".to_string(),
            issues: vec![ChangedIssue {
                issue_key: "AX2".to_string(),
                branch_name: None,
            }],
            user_severity: Some("BLOCKER".to_string()),
            user_type: None,
            resolved: Some(true),
        };
        assert_eq!(store.apply_issue_changed(&event), 1);
        let issues = store.issues_for(&ConfigScopeId::new("sln"), "file:///a.cs");
        let changed = issues.iter().find(|i| i.id == "2").unwrap();
        assert!(changed.resolved);
        assert_eq!(changed.severity.as_deref(), Some("BLOCKER"));
    }
}
