//! Host capabilities the engine calls back into, backed by the config file
//! and the local filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use sonarlink_config::{ConnectionConfig, ScopeConfig};
use sonarlink_rpc::listeners::{ClientFileDto, CredentialsProvider, FileProvider};
use sonarlink_types::{ConfigScopeId, ConnectionId, Credentials};
use url::Url;

const MAX_FILES_PER_SCOPE: usize = 50_000;

/// Credentials as configured in `[[connections]]`.
pub struct ConfigCredentials {
    by_connection: HashMap<ConnectionId, Credentials>,
}

impl ConfigCredentials {
    pub fn from_config(connections: &[ConnectionConfig]) -> Self {
        let by_connection = connections
            .iter()
            .filter_map(|c| c.credentials().map(|creds| (c.connection_id(), creds)))
            .collect();
        Self { by_connection }
    }
}

impl CredentialsProvider for ConfigCredentials {
    fn credentials(&self, connection: &ConnectionId) -> Option<Credentials> {
        let credentials = self.by_connection.get(connection).cloned();
        if credentials.is_none() {
            tracing::debug!(connection = %connection, "No credentials configured");
        }
        credentials
    }
}

/// Lists the files under each scope's root, honoring `.gitignore`.
pub struct WorkspaceFiles {
    roots: HashMap<ConfigScopeId, PathBuf>,
}

impl WorkspaceFiles {
    pub fn from_config(scopes: &[ScopeConfig]) -> Self {
        let roots = scopes
            .iter()
            .map(|scope| (scope.config_scope_id(), scope.path()))
            .collect();
        Self { roots }
    }

    fn walk(scope: &ConfigScopeId, root: &Path) -> Vec<ClientFileDto> {
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !matches!(
                    name.as_ref(),
                    ".git" | ".sonarlint" | "node_modules" | "target" | "bin" | "obj"
                )
            })
            .build();

        let mut files = Vec::new();
        for entry in walker.flatten() {
            if files.len() >= MAX_FILES_PER_SCOPE {
                tracing::warn!(scope = %scope, limit = MAX_FILES_PER_SCOPE, "File listing truncated");
                break;
            }
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            let Ok(uri) = Url::from_file_path(path) else {
                continue;
            };
            let relative = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            files.push(ClientFileDto {
                uri: uri.to_string(),
                ide_relative_path: relative,
                config_scope_id: scope.clone(),
                is_test: None,
                charset: "UTF-8".to_string(),
                fs_path: Some(path.display().to_string()),
                content: None,
                detected_language: None,
                is_user_defined: true,
            });
        }
        files.sort_by(|a, b| a.ide_relative_path.cmp(&b.ide_relative_path));
        files
    }
}

impl FileProvider for WorkspaceFiles {
    fn list_files(&self, scope: &ConfigScopeId) -> Vec<ClientFileDto> {
        let Some(root) = self.roots.get(scope) else {
            tracing::debug!(scope = %scope, "listFiles for unknown scope");
            return Vec::new();
        };
        Self::walk(scope, root)
    }
}
