use serde::{Deserialize, Serialize};
use sonarlink_types::ConnectionId;

use super::{RpcService, ServiceClient};
use crate::dto::CredentialsDto;
use crate::either::Either;
use crate::transport::RpcError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarQubeConnectionConfigurationDto {
    pub connection_id: ConnectionId,
    pub server_url: String,
    #[serde(default)]
    pub disable_notification: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarCloudConnectionConfigurationDto {
    pub connection_id: ConnectionId,
    pub organization: String,
    #[serde(default)]
    pub disable_notification: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidUpdateConnectionsParams {
    pub sonar_qube_connections: Vec<SonarQubeConnectionConfigurationDto>,
    pub sonar_cloud_connections: Vec<SonarCloudConnectionConfigurationDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransientSonarQubeConnectionDto {
    pub server_url: String,
    pub credentials: CredentialsDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransientSonarCloudConnectionDto {
    pub organization: String,
    pub credentials: CredentialsDto,
}

/// A connection that is not saved yet, e.g. while the user is still typing it in.
pub type TransientConnectionDto =
    Either<TransientSonarQubeConnectionDto, TransientSonarCloudConnectionDto>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateConnectionParams {
    pub transient_connection: TransientConnectionDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateConnectionResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// `connection/*`: keeps the engine's view of server connections current.
pub struct ConnectionService {
    client: ServiceClient,
}

impl RpcService for ConnectionService {
    const NAMESPACE: &'static str = "connection";

    fn bind(client: ServiceClient) -> Self {
        Self { client }
    }
}

impl ConnectionService {
    /// Replace the full connection list. The engine diffs it against its own.
    pub async fn did_update_connections(
        &self,
        params: &DidUpdateConnectionsParams,
    ) -> Result<(), RpcError> {
        self.client.notify("didUpdateConnections", params).await
    }

    pub async fn validate_connection(
        &self,
        params: &ValidateConnectionParams,
    ) -> Result<ValidateConnectionResponse, RpcError> {
        self.client.request("validateConnection", params).await
    }
}
