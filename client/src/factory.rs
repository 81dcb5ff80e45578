//! Server-version-dependent request selection.

use std::collections::HashMap;

use sonarlink_types::{ServerFlavor, ServerVersion};
use thiserror::Error;

/// What the caller wants, independent of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalRequest {
    Version,
    ValidateCredentials,
    Issues,
    TaintVulnerabilities,
    Rules,
    Hotspots,
    QualityProfiles,
    Notifications,
    EventStream,
}

/// How `api/issues/search` filters by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// `statuses=OPEN,CONFIRMED,REOPENED` (deprecated in 10.2)
    Statuses,
    /// `issueStatuses=OPEN,CONFIRMED`
    IssueStatuses,
}

/// A concrete endpoint able to serve a [`LogicalRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestImpl {
    ServerVersion,
    AuthenticationValidate,
    /// Legacy delimited-protobuf `batch/issues`.
    BatchIssues,
    SearchIssues(StatusFilter),
    SearchTaintVulnerabilities,
    SearchRules,
    SearchHotspots,
    SearchQualityProfiles,
    DeveloperEvents,
    PushEvents,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("{request:?} is not supported by {flavor} {version}")]
    NotSupported {
        request: LogicalRequest,
        flavor: &'static str,
        version: ServerVersion,
    },
}

/// Implementations keyed by the minimum server version that supports them.
#[derive(Debug, Default)]
struct VersionedRegistry {
    entries: HashMap<LogicalRequest, Vec<(ServerVersion, RequestImpl)>>,
}

impl VersionedRegistry {
    fn register(&mut self, request: LogicalRequest, min_version: ServerVersion, imp: RequestImpl) {
        self.entries
            .entry(request)
            .or_default()
            .push((min_version, imp));
    }

    /// Highest minimum version not above `version`.
    fn resolve(&self, request: LogicalRequest, version: ServerVersion) -> Option<RequestImpl> {
        self.entries
            .get(&request)?
            .iter()
            .filter(|(min, _)| *min <= version)
            .max_by_key(|(min, _)| *min)
            .map(|(_, imp)| *imp)
    }
}

/// Per-flavor request table, fixed once built.
#[derive(Debug)]
pub struct RequestFactory {
    flavor: ServerFlavor,
    registry: VersionedRegistry,
}

const ANY: ServerVersion = ServerVersion::new(0, 0);

impl RequestFactory {
    #[must_use]
    pub fn for_flavor(flavor: ServerFlavor) -> Self {
        match flavor {
            ServerFlavor::SonarQube => Self::sonarqube(),
            ServerFlavor::SonarCloud => Self::sonarcloud(),
        }
    }

    #[must_use]
    pub fn sonarqube() -> Self {
        use LogicalRequest as L;
        use RequestImpl as R;

        let mut registry = VersionedRegistry::default();
        registry.register(L::Version, ANY, R::ServerVersion);
        registry.register(L::ValidateCredentials, ANY, R::AuthenticationValidate);
        registry.register(L::Issues, ANY, R::BatchIssues);
        registry.register(
            L::Issues,
            ServerVersion::new(7, 2),
            R::SearchIssues(StatusFilter::Statuses),
        );
        registry.register(
            L::Issues,
            ServerVersion::new(10, 2),
            R::SearchIssues(StatusFilter::IssueStatuses),
        );
        registry.register(
            L::TaintVulnerabilities,
            ServerVersion::new(8, 6),
            R::SearchTaintVulnerabilities,
        );
        registry.register(L::Rules, ANY, R::SearchRules);
        registry.register(L::Hotspots, ServerVersion::new(8, 2), R::SearchHotspots);
        registry.register(L::QualityProfiles, ANY, R::SearchQualityProfiles);
        registry.register(L::Notifications, ServerVersion::new(6, 6), R::DeveloperEvents);
        registry.register(L::EventStream, ServerVersion::new(9, 4), R::PushEvents);

        Self {
            flavor: ServerFlavor::SonarQube,
            registry,
        }
    }

    /// SonarCloud is versionless; everything it supports is registered at 0.
    #[must_use]
    pub fn sonarcloud() -> Self {
        use LogicalRequest as L;
        use RequestImpl as R;

        let mut registry = VersionedRegistry::default();
        registry.register(L::Version, ANY, R::ServerVersion);
        registry.register(L::ValidateCredentials, ANY, R::AuthenticationValidate);
        registry.register(L::Issues, ANY, R::SearchIssues(StatusFilter::IssueStatuses));
        registry.register(L::TaintVulnerabilities, ANY, R::SearchTaintVulnerabilities);
        registry.register(L::Rules, ANY, R::SearchRules);
        registry.register(L::Hotspots, ANY, R::SearchHotspots);
        registry.register(L::QualityProfiles, ANY, R::SearchQualityProfiles);
        registry.register(L::Notifications, ANY, R::DeveloperEvents);

        Self {
            flavor: ServerFlavor::SonarCloud,
            registry,
        }
    }

    #[must_use]
    pub fn flavor(&self) -> ServerFlavor {
        self.flavor
    }

    pub fn resolve(
        &self,
        request: LogicalRequest,
        version: ServerVersion,
    ) -> Result<RequestImpl, FactoryError> {
        self.registry
            .resolve(request, version)
            .ok_or(FactoryError::NotSupported {
                request,
                flavor: self.flavor.display_name(),
                version,
            })
    }
}
