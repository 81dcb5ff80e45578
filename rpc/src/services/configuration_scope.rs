use serde::{Deserialize, Serialize};
use sonarlink_types::{ConfigScopeId, ConnectionId};

use super::{RpcService, ServiceClient};
use crate::transport::RpcError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingConfigurationDto {
    #[serde(default)]
    pub connection_id: Option<ConnectionId>,
    #[serde(default)]
    pub sonar_project_key: Option<String>,
    #[serde(default)]
    pub bind_suggestion_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationScopeDto {
    pub id: ConfigScopeId,
    #[serde(default)]
    pub parent_id: Option<ConfigScopeId>,
    pub bindable: bool,
    pub name: String,
    #[serde(default)]
    pub binding: Option<BindingConfigurationDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidAddConfigurationScopesParams {
    pub added_scopes: Vec<ConfigurationScopeDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidRemoveConfigurationScopeParams {
    pub removed_id: ConfigScopeId,
}

/// `configurationScope/*`: which solutions/folders are open and how they are bound.
pub struct ConfigurationScopeService {
    client: ServiceClient,
}

impl RpcService for ConfigurationScopeService {
    const NAMESPACE: &'static str = "configurationScope";

    fn bind(client: ServiceClient) -> Self {
        Self { client }
    }
}

impl ConfigurationScopeService {
    pub async fn did_add_configuration_scopes(
        &self,
        params: &DidAddConfigurationScopesParams,
    ) -> Result<(), RpcError> {
        self.client.notify("didAddConfigurationScopes", params).await
    }

    pub async fn did_remove_configuration_scope(
        &self,
        params: &DidRemoveConfigurationScopeParams,
    ) -> Result<(), RpcError> {
        self.client.notify("didRemoveConfigurationScope", params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::ListenerRegistry;
    use crate::services::ServiceProvider;
    use crate::test_support::connect;
    use crate::transport::TransportOptions;
    use std::sync::Arc;

    #[tokio::test]
    async fn add_and_remove_scopes() {
        let (transport, mut engine) = connect(ListenerRegistry::default(), TransportOptions::default());
        let provider = ServiceProvider::with_all_services();
        provider.attach(Arc::new(transport));
        let scopes = provider.get::<ConfigurationScopeService>().unwrap();

        let added = DidAddConfigurationScopesParams {
            added_scopes: vec![ConfigurationScopeDto {
                id: ConfigScopeId::new("solution-1"),
                parent_id: None,
                bindable: true,
                name: "Solution".to_string(),
                binding: Some(BindingConfigurationDto {
                    connection_id: Some(ConnectionId::new("sq")),
                    sonar_project_key: Some("proj".to_string()),
                    bind_suggestion_disabled: false,
                }),
            }],
        };
        scopes.did_add_configuration_scopes(&added).await.unwrap();
        scopes
            .did_remove_configuration_scope(&DidRemoveConfigurationScopeParams {
                removed_id: ConfigScopeId::new("solution-1"),
            })
            .await
            .unwrap();

        let first = engine.recv().await;
        assert_eq!(first["method"], "configurationScope/didAddConfigurationScopes");
        assert_eq!(first["params"]["addedScopes"][0]["binding"]["sonarProjectKey"], "proj");
        let second = engine.recv().await;
        assert_eq!(second["method"], "configurationScope/didRemoveConfigurationScope");
        assert_eq!(second["params"]["removedId"], "solution-1");
    }
}
