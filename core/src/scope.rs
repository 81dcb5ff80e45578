//! The active configuration scope (the open solution or folder).

use std::sync::{PoisonError, RwLock};

use sonarlink_types::{ConfigScopeId, ConnectionId};

use crate::observers::{Observers, Subscription};

/// A configuration scope and, when bound, its server project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationScope {
    pub id: ConfigScopeId,
    pub name: String,
    pub connection_id: Option<ConnectionId>,
    pub project_key: Option<String>,
}

impl ConfigurationScope {
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.connection_id.is_some() && self.project_key.is_some()
    }
}

/// Holds the current scope and tells subscribers when it changes.
#[derive(Default)]
pub struct ConfigurationScopeTracker {
    current: RwLock<Option<ConfigurationScope>>,
    changed: Observers<Option<ConfigurationScope>>,
}

impl ConfigurationScopeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<ConfigurationScope> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current scope. Returns `false` if nothing changed.
    pub fn set_current(&self, scope: Option<ConfigurationScope>) -> bool {
        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            if *current == scope {
                return false;
            }
            current.clone_from(&scope);
        }
        tracing::debug!(scope = ?scope.as_ref().map(|s| s.id.as_str()), "Configuration scope changed");
        self.changed.notify(&scope);
        true
    }

    pub fn on_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Option<ConfigurationScope>) + Send + Sync + 'static,
    {
        self.changed.subscribe(handler)
    }
}
