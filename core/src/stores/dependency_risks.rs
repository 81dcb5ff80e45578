use std::collections::HashMap;
use std::sync::RwLock;

use sonarlink_rpc::listeners::{DependencyRiskDto, DidChangeDependencyRisksParams};
use sonarlink_types::ConfigScopeId;

use super::{read, write};

/// Dependency risks (SCA findings) per configuration scope.
#[derive(Debug, Default)]
pub struct DependencyRiskStore {
    by_scope: RwLock<HashMap<ConfigScopeId, Vec<DependencyRiskDto>>>,
}

impl DependencyRiskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a scope's risks, e.g. from `dependencyRisk/listAll`.
    pub fn set(&self, scope: ConfigScopeId, risks: Vec<DependencyRiskDto>) {
        write(&self.by_scope).insert(scope, risks);
    }

    pub fn apply_changes(&self, changes: &DidChangeDependencyRisksParams) {
        let mut by_scope = write(&self.by_scope);
        let risks = by_scope.entry(changes.config_scope_id.clone()).or_default();
        risks.retain(|r| !changes.closed_dependency_risk_ids.contains(&r.id));
        for risk in changes
            .added_dependency_risks
            .iter()
            .chain(&changes.updated_dependency_risks)
        {
            match risks.iter_mut().find(|r| r.id == risk.id) {
                Some(existing) => *existing = risk.clone(),
                None => risks.push(risk.clone()),
            }
        }
    }

    #[must_use]
    pub fn for_scope(&self, scope: &ConfigScopeId) -> Vec<DependencyRiskDto> {
        read(&self.by_scope).get(scope).cloned().unwrap_or_default()
    }

    pub fn clear_scope(&self, scope: &ConfigScopeId) {
        write(&self.by_scope).remove(scope);
    }
}
