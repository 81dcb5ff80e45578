//! One SLCore engine session: process, stderr drain, transport and services.
//!
//! A session is not restartable. When the engine dies or the connection is
//! lost, every pending call fails and the owner must start a new session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sonarlink_rpc::listeners::{
    CredentialsListener, CredentialsProvider, EventListener, FileProvider, FilesListener,
    ShowSmartNotificationParams,
};
use sonarlink_rpc::services::{CancelTaskParams, LifecycleService, TaskProgressService};
use sonarlink_rpc::{
    ClientEvent, EngineProcess, ErrorLineSink, ErrorStreamDrainer, LaunchParameters,
    ListenerRegistry, ProcessError, RegistryError, RpcError, RpcService, RpcTransport,
    ServiceError, ServiceProvider, TransportOptions,
};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::observers::{Observers, Subscription};
use crate::stores::{DependencyRiskStore, IssueStore, TaintStore};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("failed to register engine listeners: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub launch: LaunchParameters,
    pub transport: TransportOptions,
    /// Bounds both the `lifecycle/shutdown` call and the wait for exit.
    pub shutdown_timeout: Duration,
}

/// Host capabilities the engine calls back into.
#[derive(Clone)]
pub struct SessionCollaborators {
    pub credentials: Arc<dyn CredentialsProvider>,
    pub files: Arc<dyn FileProvider>,
    pub stderr_sink: Arc<dyn ErrorLineSink>,
}

/// Stores fed by engine notifications.
#[derive(Debug, Clone, Default)]
pub struct EngineStores {
    pub taint: Arc<TaintStore>,
    pub issues: Arc<IssueStore>,
    pub dependency_risks: Arc<DependencyRiskStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    pub task_id: String,
    pub title: String,
    pub message: Option<String>,
    pub percentage: Option<u32>,
    pub cancellable: bool,
}

/// Applies [`ClientEvent`]s in arrival order.
struct EventApplier {
    stores: EngineStores,
    tasks: HashMap<String, TaskProgress>,
    smart_notifications: Observers<ShowSmartNotificationParams>,
}

impl EventApplier {
    fn apply(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::ProgressStarted(params) => {
                tracing::debug!(task = %params.task_id, title = %params.title, "Engine task started");
                self.tasks.insert(
                    params.task_id.clone(),
                    TaskProgress {
                        task_id: params.task_id,
                        title: params.title,
                        message: params.message,
                        percentage: None,
                        cancellable: params.cancellable,
                    },
                );
            }
            ClientEvent::ProgressReported(params) => {
                let Some(task) = self.tasks.get_mut(&params.task_id) else {
                    tracing::trace!(task = %params.task_id, "Progress for unknown task");
                    return;
                };
                if params.message.is_some() {
                    task.message = params.message;
                }
                if params.percentage.is_some() {
                    task.percentage = params.percentage;
                }
            }
            ClientEvent::ProgressEnded(params) => {
                self.tasks.remove(&params.task_id);
            }
            ClientEvent::SmartNotification(params) => {
                tracing::info!(category = %params.category, connection = %params.connection_id, "Smart notification");
                self.smart_notifications.notify(&params);
            }
            ClientEvent::TaintVulnerabilitiesChanged(changes) => {
                self.stores.taint.apply_changes(&changes);
            }
            ClientEvent::DependencyRisksChanged(changes) => {
                self.stores.dependency_risks.apply_changes(&changes);
            }
            ClientEvent::IssuesRaised(params) => {
                let files = self.stores.issues.apply_raised(&params);
                tracing::debug!(scope = %params.config_scope_id, files, "Issues raised");
            }
        }
    }
}

pub struct SlCoreSession {
    process: EngineProcess,
    drainer: Option<ErrorStreamDrainer>,
    transport: Arc<RpcTransport>,
    services: ServiceProvider,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    applier: EventApplier,
    shutdown_timeout: Duration,
}

impl SlCoreSession {
    /// Start the engine and connect to it. Must be called inside a Tokio runtime.
    pub fn start(
        options: SessionOptions,
        collaborators: SessionCollaborators,
        stores: EngineStores,
    ) -> Result<Self, SessionError> {
        let (event_listener, events) = EventListener::channel();
        let mut builder = ListenerRegistry::builder();
        builder
            .listener(Arc::new(CredentialsListener::new(collaborators.credentials)))
            .listener(Arc::new(FilesListener::new(collaborators.files)))
            .listener(event_listener);
        let registry = builder.build()?;

        let mut process = EngineProcess::start(&options.launch)?;
        let drainer = match process.take_error_stream() {
            Some(stderr) => Some(ErrorStreamDrainer::start(stderr, collaborators.stderr_sink)),
            None => {
                tracing::warn!("SLCore process has no stderr pipe");
                None
            }
        };
        let transport = Arc::new(process.attach_rpc(registry, options.transport)?);
        let services = ServiceProvider::with_all_services();
        services.attach(Arc::clone(&transport));

        Ok(Self {
            process,
            drainer,
            transport,
            services,
            events,
            applier: EventApplier {
                stores,
                tasks: HashMap::new(),
                smart_notifications: Observers::new(),
            },
            shutdown_timeout: options.shutdown_timeout,
        })
    }

    #[must_use]
    pub fn services(&self) -> &ServiceProvider {
        &self.services
    }

    pub fn service<S: RpcService>(&self) -> Result<S, SessionError> {
        Ok(self.services.get::<S>()?)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.transport.is_closed()
    }

    /// Resolves once the connection to the engine is gone.
    pub async fn closed(&self) {
        self.transport.closed().await;
    }

    /// Apply at most `budget` pending engine events. Returns how many were applied.
    pub fn poll_events(&mut self, budget: usize) -> usize {
        let mut applied = 0;
        while applied < budget {
            let Ok(event) = self.events.try_recv() else {
                break;
            };
            self.applier.apply(event);
            applied += 1;
        }
        applied
    }

    /// Engine tasks that have started and not yet ended.
    #[must_use]
    pub fn active_tasks(&self) -> Vec<TaskProgress> {
        let mut tasks: Vec<_> = self.applier.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        tasks
    }

    /// Ask the engine to cancel a task. It still reports its own end.
    pub async fn cancel_task(&self, task_id: &str) -> Result<(), SessionError> {
        let progress: TaskProgressService = self.service()?;
        progress
            .cancel_task(&CancelTaskParams {
                task_id: task_id.to_string(),
            })
            .await?;
        Ok(())
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn on_smart_notification<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ShowSmartNotificationParams) + Send + Sync + 'static,
    {
        self.applier.smart_notifications.subscribe(handler)
    }

    /// Ask the engine to shut down, close the transport and make sure the
    /// process is gone.
    pub async fn shutdown(mut self) {
        match self.services.get::<LifecycleService>() {
            Ok(lifecycle) => {
                match tokio::time::timeout(self.shutdown_timeout, lifecycle.shutdown()).await {
                    Ok(Ok(())) => tracing::debug!("SLCore acknowledged shutdown"),
                    Ok(Err(e)) => tracing::debug!(error = %e, "SLCore shutdown request failed"),
                    Err(_) => tracing::warn!("SLCore shutdown request timed out"),
                }
            }
            Err(e) => tracing::debug!(error = %e, "Skipping SLCore shutdown request"),
        }

        self.services.detach();
        self.transport.shutdown().await;
        if let Some(mut drainer) = self.drainer.take() {
            drainer.dispose();
        }

        match self.process.wait_for_exit(self.shutdown_timeout).await {
            Some(status) => tracing::info!(%status, "SLCore exited"),
            None => {
                tracing::warn!("SLCore did not exit in time, killing it");
                self.process.dispose();
            }
        }
    }
}
