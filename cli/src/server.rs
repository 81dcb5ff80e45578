//! Per-connection server work: push events, notification polling and the
//! initial taint synchronization of the active scope.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use sonarlink_client::{
    ClientError, ConnectionInfo, EventFamily, HttpOptions, RetryConfig, SonarQubeClient,
};
use sonarlink_config::{ConnectionConfig, HttpConfig};
use sonarlink_core::{
    ConfigurationScope, EventLoopListener, IssueEventHandler, IssueStore, JobOutcome,
    NotificationPoller, QualityProfileEventHandler, QualityProfileStore, ServerEventPublisher,
    TaintEventHandler, TaintIssue, TaintStore, TimedJobRunner,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Stores updated from server push events.
#[derive(Clone, Default)]
pub struct ServerStores {
    pub taint: Arc<TaintStore>,
    pub issues: Arc<IssueStore>,
    pub quality_profiles: Arc<QualityProfileStore>,
}

pub fn http_options(http: &HttpConfig) -> HttpOptions {
    HttpOptions {
        timeout: http.timeout(),
        retry: RetryConfig::default().with_max_retries(http.max_retries()),
        page_size: http.page_size(),
    }
}

pub async fn connect(config: &ConnectionConfig, http: &HttpConfig) -> Result<SonarQubeClient> {
    let mut info = ConnectionInfo::new(&config.server_url())?;
    if let Some(organization) = &config.organization {
        info = info.with_organization(organization.clone());
    }
    if let Some(credentials) = config.credentials() {
        info = info.with_credentials(credentials);
    }
    SonarQubeClient::connect(info, http_options(http))
        .await
        .with_context(|| format!("failed to connect to '{}'", config.id))
}

/// Follow the push-event stream of `projects` until it ends or `cancel` fires.
/// A dead stream is not reopened.
pub fn spawn_event_stream(
    client: Arc<SonarQubeClient>,
    connection: String,
    projects: Vec<String>,
    languages: Vec<String>,
    stores: ServerStores,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reader = match client.open_event_stream(&projects, &languages).await {
            Ok(result) => {
                let status = result.status;
                let Some(reader) = result.value else {
                    tracing::warn!(connection, status, "Server rejected the event stream");
                    return;
                };
                reader
            }
            Err(ClientError::Factory(e)) => {
                tracing::info!(connection, reason = %e, "Server push events unavailable");
                return;
            }
            Err(e) => {
                tracing::warn!(connection, error = %e, "Failed to open the event stream");
                return;
            }
        };

        let mut publisher = ServerEventPublisher::new();
        let mut listeners = Vec::new();
        for project in &projects {
            listeners.push(EventLoopListener::spawn(
                TaintEventHandler::new(Arc::clone(&stores.taint), project.clone()),
                publisher.subscribe(EventFamily::Taint),
            ));
            listeners.push(EventLoopListener::spawn(
                IssueEventHandler::new(Arc::clone(&stores.issues), project.clone()),
                publisher.subscribe(EventFamily::Issue),
            ));
        }
        listeners.push(EventLoopListener::spawn(
            QualityProfileEventHandler::new(Arc::clone(&stores.quality_profiles)),
            publisher.subscribe(EventFamily::QualityProfile),
        ));

        tracing::info!(connection, projects = projects.len(), "Listening for server events");
        if let Err(e) = publisher.run(reader, cancel).await {
            tracing::warn!(connection, error = %e, "Server event stream ended");
        }
        for listener in listeners {
            listener.finished().await;
        }
    })
}

/// Poll developer notifications every `interval` until disabled or cancelled.
pub fn spawn_notification_poller(
    client: Arc<SonarQubeClient>,
    connection: String,
    projects: Vec<String>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let poller = NotificationPoller::new(projects, Utc::now());
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            for event in poller.poll(&client).await {
                tracing::info!(
                    connection,
                    category = %event.category,
                    project = %event.project,
                    link = %event.link,
                    "{}",
                    event.message
                );
            }
            if poller.is_disabled() {
                break;
            }
        }
    })
}

/// Replace the taint store contents with the server's view of `scope`.
pub async fn sync_taint(
    client: &SonarQubeClient,
    scope: &ConfigurationScope,
    store: &TaintStore,
    jobs: &TimedJobRunner,
) -> JobOutcome {
    let Some(project_key) = scope.project_key.as_deref() else {
        return JobOutcome::Completed;
    };
    jobs.run("taint-sync", |token| async move {
        let result = tokio::select! {
            () = token.cancelled() => return Ok(()),
            result = client.get_taint_vulnerabilities(project_key, None) => result?,
        };
        let status = result.status;
        let issues = result
            .value
            .ok_or_else(|| anyhow!("taint vulnerabilities request returned HTTP {status}"))?;
        tracing::info!(scope = %scope.id, count = issues.len(), "Synchronized taint vulnerabilities");
        store.set(
            Some(scope.id.clone()),
            issues.iter().map(TaintIssue::from).collect(),
        );
        Ok::<(), anyhow::Error>(())
    })
    .await
}
