//! Starting and initializing the SLCore engine from the config file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use sonarlink_config::{EngineConfig, SonarlinkConfig};
use sonarlink_core::{EngineStores, SessionCollaborators, SessionOptions, SlCoreSession};
use sonarlink_rpc::services::{
    BindingConfigurationDto, ClientConstantInfoDto, ConfigurationScopeDto,
    ConfigurationScopeService, DidAddConfigurationScopesParams, InitializeParams,
    LifecycleService, SonarCloudConnectionConfigurationDto, SonarQubeConnectionConfigurationDto,
};
use sonarlink_rpc::{LaunchParameters, TracingSink, TransportOptions};

use crate::host::{ConfigCredentials, WorkspaceFiles};

const CLIENT_NAME: &str = "sonarlink";

fn connection_dtos(
    config: &SonarlinkConfig,
) -> (
    Vec<SonarQubeConnectionConfigurationDto>,
    Vec<SonarCloudConnectionConfigurationDto>,
) {
    let mut sonarqube = Vec::new();
    let mut sonarcloud = Vec::new();
    for connection in &config.connections {
        match &connection.organization {
            Some(organization) => sonarcloud.push(SonarCloudConnectionConfigurationDto {
                connection_id: connection.connection_id(),
                organization: organization.clone(),
                disable_notification: false,
            }),
            None => sonarqube.push(SonarQubeConnectionConfigurationDto {
                connection_id: connection.connection_id(),
                server_url: connection.server_url(),
                disable_notification: false,
            }),
        }
    }
    (sonarqube, sonarcloud)
}

fn initialize_params(config: &SonarlinkConfig, data_dir: &Path) -> InitializeParams {
    let (sonar_qube_connections, sonar_cloud_connections) = connection_dtos(config);
    let mut enabled_languages: Vec<String> = config
        .connections
        .iter()
        .flat_map(|c| c.languages.iter().cloned())
        .collect();
    enabled_languages.sort();
    enabled_languages.dedup();

    InitializeParams {
        client_constant_info: ClientConstantInfoDto {
            name: CLIENT_NAME.to_string(),
            user_agent: concat!("sonarlink/", env!("CARGO_PKG_VERSION")).to_string(),
        },
        storage_root: data_dir.join("storage"),
        work_dir: data_dir.join("work"),
        embedded_plugin_paths: Vec::new(),
        enabled_languages,
        sonar_qube_connections,
        sonar_cloud_connections,
        sonarlint_user_home: Some(data_dir.to_path_buf()),
    }
}

fn scope_dtos(config: &SonarlinkConfig) -> Vec<ConfigurationScopeDto> {
    config
        .scopes
        .iter()
        .map(|scope| ConfigurationScopeDto {
            id: scope.config_scope_id(),
            parent_id: None,
            bindable: true,
            name: scope.display_name().to_string(),
            binding: scope.connection_id().map(|connection_id| BindingConfigurationDto {
                connection_id: Some(connection_id),
                sonar_project_key: scope.project_key.clone(),
                bind_suggestion_disabled: false,
            }),
        })
        .collect()
}

/// Launch the engine, initialize it and register every configured scope.
pub async fn start(
    engine: &EngineConfig,
    config: &SonarlinkConfig,
    data_dir: PathBuf,
    stores: EngineStores,
) -> Result<SlCoreSession> {
    let options = SessionOptions {
        launch: LaunchParameters::new(engine.command()).with_args(engine.args.iter().cloned()),
        transport: TransportOptions {
            request_timeout: engine.request_timeout(),
        },
        shutdown_timeout: engine.shutdown_timeout(),
    };
    let collaborators = SessionCollaborators {
        credentials: Arc::new(ConfigCredentials::from_config(&config.connections)),
        files: Arc::new(WorkspaceFiles::from_config(&config.scopes)),
        stderr_sink: Arc::new(TracingSink),
    };
    let session = SlCoreSession::start(options, collaborators, stores)
        .context("failed to start SLCore")?;

    let lifecycle: LifecycleService = session.service()?;
    lifecycle
        .initialize(&initialize_params(config, &data_dir))
        .await
        .context("SLCore initialization failed")?;

    let scopes = scope_dtos(config);
    if !scopes.is_empty() {
        let service: ConfigurationScopeService = session.service()?;
        service
            .did_add_configuration_scopes(&DidAddConfigurationScopesParams {
                added_scopes: scopes,
            })
            .await?;
    }
    tracing::info!(scopes = config.scopes.len(), "SLCore initialized");
    Ok(session)
}
