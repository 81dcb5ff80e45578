//! Concrete request types, one module per API area.

pub mod hotspots;
pub mod issues;
pub mod notifications;
pub mod quality_profiles;
pub mod rules;
pub mod server;

use serde::Deserialize;

/// `components` block of search responses, mapping component keys to paths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Component {
    pub key: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Path of `component` relative to its project, when known.
pub(crate) fn component_path(components: &[Component], component: &str) -> Option<String> {
    components
        .iter()
        .find(|c| c.key == component)
        .and_then(|c| c.path.clone())
        .or_else(|| {
            component
                .split_once(':')
                .map(|(_, path)| path.to_string())
        })
}

/// Shared `p`/`ps` and optional `organization` parameters.
pub(crate) fn push_paging(
    query: &mut Vec<(&'static str, String)>,
    page: u32,
    page_size: usize,
    organization: Option<&str>,
) {
    query.push(("p", page.to_string()));
    query.push(("ps", page_size.to_string()));
    if let Some(organization) = organization {
        query.push(("organization", organization.to_string()));
    }
}
