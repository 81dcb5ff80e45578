//! Best-effort developer notification polling.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use sonarlink_client::requests::notifications::NotificationEvent;
use sonarlink_client::{ClientError, FactoryError, SonarQubeClient};

const NOT_FOUND: u16 = 404;

#[derive(Debug)]
struct PollState {
    disabled: bool,
    last_poll: DateTime<Utc>,
}

/// Polls `api/developers/search_events` for a fixed set of projects.
///
/// Never fails: a server without the endpoint disables polling for this
/// connection, and any other failure yields no events.
#[derive(Debug)]
pub struct NotificationPoller {
    project_keys: Vec<String>,
    state: Mutex<PollState>,
}

impl NotificationPoller {
    #[must_use]
    pub fn new(project_keys: Vec<String>, since: DateTime<Utc>) -> Self {
        Self {
            project_keys,
            state: Mutex::new(PollState {
                disabled: false,
                last_poll: since,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.state().disabled
    }

    #[must_use]
    pub fn last_poll(&self) -> DateTime<Utc> {
        self.state().last_poll
    }

    fn disable(&self, reason: &str) {
        tracing::info!(reason, "Developer notifications disabled for this connection");
        self.state().disabled = true;
    }

    /// Events raised since the previous successful poll.
    pub async fn poll(&self, client: &SonarQubeClient) -> Vec<NotificationEvent> {
        if self.project_keys.is_empty() {
            return Vec::new();
        }
        let since = {
            let state = self.state();
            if state.disabled {
                return Vec::new();
            }
            state.last_poll
        };
        let started = Utc::now();

        match client.get_notification_events(&self.project_keys, since).await {
            Ok(result) => match result.value {
                Some(events) => {
                    self.state().last_poll = started;
                    if !events.is_empty() {
                        tracing::debug!(count = events.len(), "Received developer notifications");
                    }
                    events
                }
                None if result.status == NOT_FOUND => {
                    self.disable("endpoint not found");
                    Vec::new()
                }
                None => {
                    tracing::warn!(status = result.status, "Notification poll failed");
                    Vec::new()
                }
            },
            Err(ClientError::Factory(FactoryError::NotSupported { .. })) => {
                self.disable("not supported by server");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Notification poll failed");
                Vec::new()
            }
        }
    }
}
