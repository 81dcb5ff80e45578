use std::sync::RwLock;

use sonarlink_client::events::{TaintVulnerabilityClosedEvent, TaintVulnerabilityRaisedEvent};
use sonarlink_client::requests::issues::ServerIssue;
use sonarlink_rpc::dto::TextRangeDto;
use sonarlink_rpc::listeners::{DidChangeTaintVulnerabilitiesParams, TaintVulnerabilityDto};
use sonarlink_types::ConfigScopeId;

use super::{read, write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start_line: u32,
    pub start_line_offset: u32,
    pub end_line: u32,
    pub end_line_offset: u32,
}

impl From<&TextRangeDto> for TextRange {
    fn from(dto: &TextRangeDto) -> Self {
        Self {
            start_line: dto.start_line,
            start_line_offset: dto.start_line_offset,
            end_line: dto.end_line,
            end_line_offset: dto.end_line_offset,
        }
    }
}

/// A taint vulnerability, whichever feed reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaintIssue {
    /// Engine-side id; equal to `server_key` when the server reported it.
    pub id: String,
    pub server_key: String,
    pub rule_key: String,
    pub message: String,
    pub file_path: String,
    pub severity: Option<String>,
    pub issue_type: Option<String>,
    pub text_range: Option<TextRange>,
    pub resolved: bool,
}

impl TaintIssue {
    fn matches(&self, id_or_key: &str) -> bool {
        self.id == id_or_key || self.server_key == id_or_key
    }
}

impl From<&TaintVulnerabilityDto> for TaintIssue {
    fn from(dto: &TaintVulnerabilityDto) -> Self {
        Self {
            id: dto.id.clone(),
            server_key: dto.sonar_server_key.clone(),
            rule_key: dto.rule_key.clone(),
            message: dto.message.clone(),
            file_path: dto.ide_file_path.clone(),
            severity: dto.severity.clone(),
            issue_type: dto.issue_type.clone(),
            text_range: dto.text_range.as_ref().map(TextRange::from),
            resolved: dto.resolved,
        }
    }
}

impl From<&TaintVulnerabilityRaisedEvent> for TaintIssue {
    fn from(event: &TaintVulnerabilityRaisedEvent) -> Self {
        let location = &event.main_location;
        Self {
            id: event.key.clone(),
            server_key: event.key.clone(),
            rule_key: event.rule_key.clone(),
            message: location.message.clone(),
            file_path: location.file_path.clone(),
            severity: Some(event.severity.clone()),
            issue_type: Some(event.issue_type.clone()),
            text_range: location.text_range.as_ref().map(|r| TextRange {
                start_line: r.start_line,
                start_line_offset: r.start_line_offset,
                end_line: r.end_line,
                end_line_offset: r.end_line_offset,
            }),
            resolved: false,
        }
    }
}

impl From<&ServerIssue> for TaintIssue {
    fn from(issue: &ServerIssue) -> Self {
        Self {
            id: issue.key.clone(),
            server_key: issue.key.clone(),
            rule_key: issue.rule_key.clone(),
            message: issue.message.clone(),
            file_path: issue.file_path.clone().unwrap_or_default(),
            severity: issue.severity.clone(),
            issue_type: issue.issue_type.clone(),
            text_range: issue.text_range.map(|r| TextRange {
                start_line: r.start_line,
                start_line_offset: r.start_offset,
                end_line: r.end_line,
                end_line_offset: r.end_offset,
            }),
            resolved: issue.resolution.is_some(),
        }
    }
}

#[derive(Debug, Default)]
struct TaintState {
    scope: Option<ConfigScopeId>,
    items: Vec<TaintIssue>,
}

/// Taint vulnerabilities of the active configuration scope.
#[derive(Debug, Default)]
pub struct TaintStore {
    state: RwLock<TaintState>,
}

impl TaintStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything, e.g. after a full download.
    pub fn set(&self, scope: Option<ConfigScopeId>, items: Vec<TaintIssue>) {
        let mut state = write(&self.state);
        state.scope = scope;
        state.items = items;
    }

    pub fn reset(&self) {
        self.set(None, Vec::new());
    }

    #[must_use]
    pub fn scope(&self) -> Option<ConfigScopeId> {
        read(&self.state).scope.clone()
    }

    #[must_use]
    pub fn all(&self) -> Vec<TaintIssue> {
        read(&self.state).items.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.state).items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn find(&self, id_or_key: &str) -> Option<TaintIssue> {
        read(&self.state)
            .items
            .iter()
            .find(|t| t.matches(id_or_key))
            .cloned()
    }

    /// Insert or replace by server key.
    pub fn upsert(&self, issue: TaintIssue) {
        let mut state = write(&self.state);
        match state
            .items
            .iter_mut()
            .find(|t| t.server_key == issue.server_key)
        {
            Some(existing) => *existing = issue,
            None => state.items.push(issue),
        }
    }

    pub fn remove(&self, id_or_key: &str) -> bool {
        let mut state = write(&self.state);
        let before = state.items.len();
        state.items.retain(|t| !t.matches(id_or_key));
        state.items.len() != before
    }

    /// Apply an engine change set. Changes for another scope are ignored.
    pub fn apply_changes(&self, changes: &DidChangeTaintVulnerabilitiesParams) -> bool {
        let mut state = write(&self.state);
        if state
            .scope
            .as_ref()
            .is_some_and(|scope| *scope != changes.config_scope_id)
        {
            tracing::debug!(scope = %changes.config_scope_id, "Ignoring taint changes for inactive scope");
            return false;
        }
        state.scope = Some(changes.config_scope_id.clone());
        state.items.retain(|t| {
            !changes
                .closed_taint_vulnerability_ids
                .iter()
                .any(|id| t.matches(id))
        });
        for dto in changes
            .added_taint_vulnerabilities
            .iter()
            .chain(&changes.updated_taint_vulnerabilities)
        {
            let issue = TaintIssue::from(dto);
            match state.items.iter_mut().find(|t| t.id == issue.id) {
                Some(existing) => *existing = issue,
                None => state.items.push(issue),
            }
        }
        true
    }

    pub fn apply_raised(&self, event: &TaintVulnerabilityRaisedEvent) {
        self.upsert(TaintIssue::from(event));
    }

    pub fn apply_closed(&self, event: &TaintVulnerabilityClosedEvent) -> bool {
        self.remove(&event.key)
    }
}
