use std::collections::BTreeSet;
use std::sync::RwLock;

use sonarlink_client::events::RuleSetChangedEvent;

use super::{read, write};

/// Projects whose quality profile changed on the server since their rules
/// were last synchronized.
#[derive(Debug, Default)]
pub struct QualityProfileStore {
    outdated: RwLock<BTreeSet<String>>,
}

impl QualityProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_outdated<I, S>(&self, projects: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        write(&self.outdated).extend(projects.into_iter().map(Into::into));
    }

    pub fn apply_rule_set_changed(&self, event: &RuleSetChangedEvent) {
        tracing::debug!(
            projects = event.projects.len(),
            activated = event.activated_rules.len(),
            deactivated = event.deactivated_rules.len(),
            "Quality profile changed"
        );
        self.mark_outdated(event.projects.iter().cloned());
    }

    #[must_use]
    pub fn is_outdated(&self, project_key: &str) -> bool {
        read(&self.outdated).contains(project_key)
    }

    /// Drain the outdated set, sorted.
    pub fn take_outdated(&self) -> Vec<String> {
        std::mem::take(&mut *write(&self.outdated))
            .into_iter()
            .collect()
    }

    /// The project was re-synchronized.
    pub fn mark_synchronized(&self, project_key: &str) {
        write(&self.outdated).remove(project_key);
    }
}
