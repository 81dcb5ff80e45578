use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sonarlink_types::{ConnectionId, Credentials};

use super::{Listener, ListenerRegistryBuilder};
use crate::dto::CredentialsDto;

pub const GET_CREDENTIALS: &str = "connection/getCredentials";

/// Source of stored credentials, keyed by connection.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self, connection: &ConnectionId) -> Option<Credentials>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCredentialsParams {
    pub connection_id: ConnectionId,
}

/// `credentials` is `null` when nothing is stored for the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCredentialsResponse {
    pub credentials: Option<CredentialsDto>,
}

impl GetCredentialsResponse {
    #[must_use]
    pub const fn none() -> Self {
        Self { credentials: None }
    }
}

impl From<&Credentials> for GetCredentialsResponse {
    fn from(credentials: &Credentials) -> Self {
        Self {
            credentials: Some(credentials.into()),
        }
    }
}

pub struct CredentialsListener {
    provider: Arc<dyn CredentialsProvider>,
}

impl CredentialsListener {
    pub fn new(provider: Arc<dyn CredentialsProvider>) -> Self {
        Self { provider }
    }

    #[must_use]
    pub fn get_credentials(&self, params: &GetCredentialsParams) -> GetCredentialsResponse {
        match self.provider.credentials(&params.connection_id) {
            Some(credentials) => GetCredentialsResponse::from(&credentials),
            None => {
                tracing::debug!(
                    connection = %params.connection_id,
                    "No credentials stored for connection"
                );
                GetCredentialsResponse::none()
            }
        }
    }
}

impl Listener for CredentialsListener {
    fn register(self: Arc<Self>, builder: &mut ListenerRegistryBuilder) {
        builder.request(GET_CREDENTIALS, move |params: GetCredentialsParams| {
            Ok(self.get_credentials(&params))
        });
    }
}
