//! Process-wide settings, injected rather than global.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::observers::{Observers, Subscription};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChange {
    pub key: String,
    /// `None` when the key was removed.
    pub value: Option<String>,
}

/// Shared concurrent key/value settings. Clones share state; tests build
/// their own isolated instance.
#[derive(Clone, Default)]
pub struct SettingsStore {
    values: Arc<RwLock<HashMap<String, String>>>,
    changes: Arc<Observers<SettingChange>>,
}

impl SettingsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// `true`/`false` values; anything else is `None`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Store `value`; observers hear about it only when it changed.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let previous = self
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), value.clone());
        if previous.as_deref() != Some(value.as_str()) {
            self.changes.notify(&SettingChange {
                key,
                value: Some(value),
            });
        }
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        let removed = self
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            self.changes.notify(&SettingChange {
                key: key.to_string(),
                value: None,
            });
        }
        removed
    }

    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn on_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SettingChange) + Send + Sync + 'static,
    {
        self.changes.subscribe(handler)
    }
}
