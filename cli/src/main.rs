mod crash_hardening;
mod engine;
mod host;
mod server;

use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use sonarlink_config::{ConfigError, SonarlinkConfig};
use sonarlink_core::{
    ConfigurationScope, ConfigurationScopeTracker, EngineStores, SlCoreSession, TimedJobRunner,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::server::ServerStores;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const EVENT_POLL_BUDGET: usize = 256;

fn init_tracing(data_dir: &Path, config_filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (log_file, init_warnings) = open_log_file(data_dir);

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // The engine's stdout is the RPC channel; never log to our own streams.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file(data_dir: &Path) -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let candidates = [
        data_dir.join("logs").join("sonarlink.log"),
        env::temp_dir()
            .join("sonarlink")
            .join("logs")
            .join("sonarlink.log"),
    ];
    let mut warnings = Vec::new();

    for candidate in candidates {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn data_dir() -> PathBuf {
    sonarlink_config::data_dir().unwrap_or_else(|| env::temp_dir().join("sonarlink"))
}

fn initial_scope(config: &SonarlinkConfig) -> Option<ConfigurationScope> {
    config.scopes.first().map(|scope| ConfigurationScope {
        id: scope.config_scope_id(),
        name: scope.display_name().to_string(),
        connection_id: scope.connection_id(),
        project_key: scope.project_key.clone(),
    })
}

/// Background work for every configured connection.
async fn start_connections(
    config: &SonarlinkConfig,
    scope: Option<&ConfigurationScope>,
    stores: &ServerStores,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let http = config.http();
    let jobs = TimedJobRunner::new(config.sync_timeout());
    let mut tasks = Vec::new();

    for connection in &config.connections {
        let client = match server::connect(connection, &http).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::warn!(connection = %connection.id, error = %e, "Connection unavailable");
                continue;
            }
        };
        tracing::info!(
            connection = %connection.id,
            version = %client.server_info().version,
            "Connected"
        );

        if let Some(scope) = scope
            && scope.connection_id.as_ref() == Some(&connection.connection_id())
        {
            server::sync_taint(&client, scope, &stores.taint, &jobs).await;
        }

        tasks.push(server::spawn_event_stream(
            Arc::clone(&client),
            connection.id.clone(),
            connection.projects.clone(),
            connection.languages.clone(),
            stores.clone(),
            cancel.child_token(),
        ));
        tasks.push(server::spawn_notification_poller(
            client,
            connection.id.clone(),
            connection.projects.clone(),
            config.notification_interval(),
            cancel.child_token(),
        ));
    }
    jobs.dispose();
    tasks
}

enum Wake {
    Interrupted,
    Closed,
    Tick,
}

/// Pump engine events until ctrl-c or until the engine goes away.
async fn run_session(session: &mut SlCoreSession) {
    let mut ticker = tokio::time::interval(EVENT_POLL_INTERVAL);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    loop {
        let wake = tokio::select! {
            _ = &mut interrupted => Wake::Interrupted,
            () = session.closed() => Wake::Closed,
            _ = ticker.tick() => Wake::Tick,
        };
        match wake {
            Wake::Interrupted => {
                tracing::info!("Interrupted");
                break;
            }
            Wake::Closed => {
                tracing::warn!("SLCore connection closed");
                break;
            }
            Wake::Tick => {
                session.poll_events(EVENT_POLL_BUDGET);
            }
        }
    }
    session.poll_events(usize::MAX);
}

#[tokio::main]
async fn main() -> Result<()> {
    let data_dir = data_dir();
    let loaded: Result<Option<SonarlinkConfig>, ConfigError> = SonarlinkConfig::load();
    let config_filter = loaded
        .as_ref()
        .ok()
        .and_then(Option::as_ref)
        .and_then(SonarlinkConfig::log_filter)
        .map(str::to_string);
    init_tracing(&data_dir, config_filter.as_deref());

    if let Err(e) = crash_hardening::apply() {
        tracing::warn!(error = %e, "Crash hardening failed");
    }

    let config = match loaded {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::info!("No config file; nothing to do");
            return Ok(());
        }
        Err(e) => {
            tracing::warn!(path = %e.path().display(), error = %e, "Failed to load config");
            return Err(e.into());
        }
    };

    let tracker = ConfigurationScopeTracker::new();
    tracker.set_current(initial_scope(&config));
    let current_scope = tracker.current();

    let engine_stores = EngineStores::default();
    let server_stores = ServerStores {
        taint: Arc::clone(&engine_stores.taint),
        issues: Arc::clone(&engine_stores.issues),
        ..ServerStores::default()
    };

    let cancel = CancellationToken::new();
    let tasks = start_connections(&config, current_scope.as_ref(), &server_stores, &cancel).await;

    let session = match &config.engine {
        Some(engine_config) => {
            match engine::start(engine_config, &config, data_dir, engine_stores.clone()).await {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start SLCore");
                    None
                }
            }
        }
        None => None,
    };

    match session {
        Some(mut session) => {
            let _notifications = session.on_smart_notification(|notification| {
                tracing::info!(
                    connection = %notification.connection_id,
                    category = %notification.category,
                    link = %notification.link,
                    "{}",
                    notification.text
                );
            });
            run_session(&mut session).await;
            session.shutdown().await;
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Interrupted");
        }
    }

    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }
    tracing::info!(
        taint = server_stores.taint.len(),
        outdated_profiles = server_stores.quality_profiles.take_outdated().len(),
        "Shut down"
    );
    Ok(())
}
