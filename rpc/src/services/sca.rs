use serde::{Deserialize, Serialize};
use sonarlink_types::ConfigScopeId;

use super::{RpcService, ServiceClient};
use crate::listeners::DependencyRiskDto;
use crate::transport::RpcError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAllDependencyRisksParams {
    pub configuration_scope_id: ConfigScopeId,
    #[serde(default)]
    pub should_refresh: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAllDependencyRisksResponse {
    pub dependency_risks: Vec<DependencyRiskDto>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyRiskTransition {
    Reopen,
    Confirm,
    Accept,
    Safe,
    FixedSafe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDependencyRiskStatusParams {
    pub configuration_scope_id: ConfigScopeId,
    pub dependency_risk_key: String,
    pub transition: DependencyRiskTransition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// `dependencyRisk/*`: software composition analysis findings.
pub struct DependencyRiskService {
    client: ServiceClient,
}

impl RpcService for DependencyRiskService {
    const NAMESPACE: &'static str = "dependencyRisk";

    fn bind(client: ServiceClient) -> Self {
        Self { client }
    }
}

impl DependencyRiskService {
    pub async fn list_all(
        &self,
        params: &ListAllDependencyRisksParams,
    ) -> Result<ListAllDependencyRisksResponse, RpcError> {
        self.client.request("listAll", params).await
    }

    pub async fn change_status(
        &self,
        params: &ChangeDependencyRiskStatusParams,
    ) -> Result<(), RpcError> {
        self.client.request("changeStatus", params).await
    }
}
