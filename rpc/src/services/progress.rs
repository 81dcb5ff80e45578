use serde::{Deserialize, Serialize};

use super::{RpcService, ServiceClient};
use crate::transport::RpcError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTaskParams {
    pub task_id: String,
}

/// `taskProgress/*`: the client side of `progress/startProgress`.
pub struct TaskProgressService {
    client: ServiceClient,
}

impl RpcService for TaskProgressService {
    const NAMESPACE: &'static str = "taskProgress";

    fn bind(client: ServiceClient) -> Self {
        Self { client }
    }
}

impl TaskProgressService {
    /// Ask the engine to stop a cancellable task. Only a request; the task
    /// still ends with its own `progress/endProgress`.
    pub async fn cancel_task(&self, params: &CancelTaskParams) -> Result<(), RpcError> {
        self.client.notify("cancelTask", params).await
    }
}
