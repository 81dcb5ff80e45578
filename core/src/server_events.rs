//! Fan-out of server push events to per-family listeners.
//!
//! One [`ServerEventPublisher`] owns the SSE reader for a connection and
//! routes every decoded event to the channels subscribed to its family.
//! Each family is consumed by an [`EventLoopListener`] running its own task
//! with its own cancellation token.

use std::collections::HashMap;
use std::sync::Arc;

use sonarlink_client::sse::{RawEventSource, SseError, SseStreamReader};
use sonarlink_client::{EventFamily, ServerEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::stores::{IssueStore, QualityProfileStore, TaintStore};

/// Routes decoded events by [`EventFamily`].
#[derive(Default)]
pub struct ServerEventPublisher {
    subscribers: HashMap<EventFamily, Vec<mpsc::UnboundedSender<ServerEvent>>>,
}

impl ServerEventPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event of `family`. The channel closes when the stream ends.
    pub fn subscribe(&mut self, family: EventFamily) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(family).or_default().push(tx);
        rx
    }

    fn dispatch(&mut self, event: ServerEvent) {
        let family = event.family();
        let Some(senders) = self.subscribers.get_mut(&family) else {
            tracing::trace!(?family, "No listener for server event");
            return;
        };
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Pump `reader` until it closes, fails or `cancel` fires. Dropping the
    /// publisher on return closes every subscriber channel.
    pub async fn run<S: RawEventSource>(
        mut self,
        mut reader: SseStreamReader<S>,
        cancel: CancellationToken,
    ) -> Result<(), SseError> {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    reader.dispose();
                    tracing::debug!("Server event stream cancelled");
                    return Ok(());
                }
                next = reader.read() => next,
            };
            match next {
                Ok(Some(event)) => self.dispatch(event),
                Ok(None) => {
                    tracing::info!("Server event stream closed");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Server event stream failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Applies one family of server events.
pub trait ServerEventHandler: Send + 'static {
    fn family(&self) -> EventFamily;

    fn handle(&mut self, event: ServerEvent);

    /// Called once when the feed ends or the listener is disposed.
    fn on_closed(&mut self) {}
}

/// Background loop feeding one handler.
pub struct EventLoopListener {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl EventLoopListener {
    /// Must be called inside a Tokio runtime.
    pub fn spawn<H: ServerEventHandler>(
        mut handler: H,
        mut events: mpsc::UnboundedReceiver<ServerEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let family = handler.family();
            loop {
                let event = tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Some(event) => handler.handle(event),
                    None => break,
                }
            }
            tracing::debug!(?family, "Server event listener stopped");
            handler.on_closed();
        });
        Self {
            cancel,
            task: Some(task),
        }
    }

    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the loop to end.
    pub async fn finished(mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Server event listener panicked");
        }
    }
}

impl Drop for EventLoopListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Taint raised/closed events for one project.
pub struct TaintEventHandler {
    store: Arc<TaintStore>,
    project_key: String,
}

impl TaintEventHandler {
    #[must_use]
    pub fn new(store: Arc<TaintStore>, project_key: impl Into<String>) -> Self {
        Self {
            store,
            project_key: project_key.into(),
        }
    }
}

impl ServerEventHandler for TaintEventHandler {
    fn family(&self) -> EventFamily {
        EventFamily::Taint
    }

    fn handle(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::TaintVulnerabilityRaised(raised) if raised.project_key == self.project_key => {
                tracing::debug!(key = %raised.key, "Taint vulnerability raised");
                self.store.apply_raised(&raised);
            }
            ServerEvent::TaintVulnerabilityClosed(closed) if closed.project_key == self.project_key => {
                if !self.store.apply_closed(&closed) {
                    tracing::trace!(key = %closed.key, "Closed taint vulnerability not in store");
                }
            }
            _ => {}
        }
    }
}

/// Server-side issue changes (resolution, severity, type).
pub struct IssueEventHandler {
    store: Arc<IssueStore>,
    project_key: String,
}

impl IssueEventHandler {
    #[must_use]
    pub fn new(store: Arc<IssueStore>, project_key: impl Into<String>) -> Self {
        Self {
            store,
            project_key: project_key.into(),
        }
    }
}

impl ServerEventHandler for IssueEventHandler {
    fn family(&self) -> EventFamily {
        EventFamily::Issue
    }

    fn handle(&mut self, event: ServerEvent) {
        if let ServerEvent::IssueChanged(changed) = event {
            if changed.project_key != self.project_key {
                return;
            }
            let updated = self.store.apply_issue_changed(&changed);
            tracing::debug!(updated, "Applied server issue change");
        }
    }
}

pub struct QualityProfileEventHandler {
    store: Arc<QualityProfileStore>,
}

impl QualityProfileEventHandler {
    #[must_use]
    pub fn new(store: Arc<QualityProfileStore>) -> Self {
        Self { store }
    }
}

impl ServerEventHandler for QualityProfileEventHandler {
    fn family(&self) -> EventFamily {
        EventFamily::QualityProfile
    }

    fn handle(&mut self, event: ServerEvent) {
        if let ServerEvent::RuleSetChanged(changed) = event {
            self.store.apply_rule_set_changed(&changed);
        }
    }
}
