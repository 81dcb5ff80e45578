use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sonarlink_types::ConfigScopeId;

use super::{Listener, ListenerRegistryBuilder};

pub const LIST_FILES: &str = "listener/listFiles";

/// Enumerates the files that belong to a configuration scope.
pub trait FileProvider: Send + Sync {
    fn list_files(&self, scope: &ConfigScopeId) -> Vec<ClientFileDto>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesParams {
    pub config_scope_id: ConfigScopeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFileDto {
    pub uri: String,
    pub ide_relative_path: String,
    pub config_scope_id: ConfigScopeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_test: Option<bool>,
    pub charset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_path: Option<String>,
    /// Unsaved editor contents; `None` means read from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(default)]
    pub is_user_defined: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilesResponse {
    pub files: Vec<ClientFileDto>,
}

pub struct FilesListener {
    provider: Arc<dyn FileProvider>,
}

impl FilesListener {
    pub fn new(provider: Arc<dyn FileProvider>) -> Self {
        Self { provider }
    }
}

impl Listener for FilesListener {
    fn register(self: Arc<Self>, builder: &mut ListenerRegistryBuilder) {
        builder.request(LIST_FILES, move |params: ListFilesParams| {
            let files = self.provider.list_files(&params.config_scope_id);
            tracing::trace!(scope = %params.config_scope_id, count = files.len(), "Listing files");
            Ok(ListFilesResponse { files })
        });
    }
}
