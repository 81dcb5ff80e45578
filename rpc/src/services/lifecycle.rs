use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{RpcService, ServiceClient};
use super::connection::{SonarCloudConnectionConfigurationDto, SonarQubeConnectionConfigurationDto};
use crate::transport::RpcError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConstantInfoDto {
    pub name: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub client_constant_info: ClientConstantInfoDto,
    pub storage_root: PathBuf,
    pub work_dir: PathBuf,
    #[serde(default)]
    pub embedded_plugin_paths: Vec<PathBuf>,
    #[serde(default)]
    pub enabled_languages: Vec<String>,
    #[serde(default)]
    pub sonar_qube_connections: Vec<SonarQubeConnectionConfigurationDto>,
    #[serde(default)]
    pub sonar_cloud_connections: Vec<SonarCloudConnectionConfigurationDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sonarlint_user_home: Option<PathBuf>,
}

/// `lifecycle/*`: the first and last calls of every engine session.
pub struct LifecycleService {
    client: ServiceClient,
}

impl RpcService for LifecycleService {
    const NAMESPACE: &'static str = "lifecycle";

    fn bind(client: ServiceClient) -> Self {
        Self { client }
    }
}

impl LifecycleService {
    pub async fn initialize(&self, params: &InitializeParams) -> Result<(), RpcError> {
        self.client.request("initialize", params).await
    }

    pub async fn shutdown(&self) -> Result<(), RpcError> {
        self.client.request("shutdown", &()).await
    }
}
