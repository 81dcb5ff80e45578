//! Typed proxies over the engine's RPC surface.
//!
//! A service is a namespace plus a set of methods; each proxy method maps to
//! the RPC method `"{namespace}/{method}"`. Proxies hold no state beyond the
//! transport handle and never cache results.

mod analysis;
mod configuration_scope;
mod connection;
mod lifecycle;
mod progress;
mod rules;
mod sca;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::transport::{RpcError, RpcTransport};

pub use analysis::{
    AnalysisService, AnalyzeFilesAndTrackParams, AnalyzeFilesResponse,
    DidChangeAnalysisPropertiesParams,
};
pub use configuration_scope::{
    BindingConfigurationDto, ConfigurationScopeDto, ConfigurationScopeService,
    DidAddConfigurationScopesParams, DidRemoveConfigurationScopeParams,
};
pub use connection::{
    ConnectionService, DidUpdateConnectionsParams, SonarCloudConnectionConfigurationDto,
    SonarQubeConnectionConfigurationDto, TransientConnectionDto, TransientSonarCloudConnectionDto,
    TransientSonarQubeConnectionDto, ValidateConnectionParams, ValidateConnectionResponse,
};
pub use lifecycle::{ClientConstantInfoDto, InitializeParams, LifecycleService};
pub use progress::{CancelTaskParams, TaskProgressService};
pub use rules::{
    EffectiveRuleDetailsDto, EffectiveRuleParamDto, GetEffectiveRuleDetailsParams,
    GetEffectiveRuleDetailsResponse, RuleContextualSectionDto,
    RuleContextualSectionWithDefaultContextKeyDto, RuleDescription, RuleDescriptionTabDto,
    RuleMonolithicDescriptionDto, RuleNonContextualSectionDto, RuleService,
    RuleSplitDescriptionDto, TabContent,
};
pub use sca::{
    ChangeDependencyRiskStatusParams, DependencyRiskService, DependencyRiskTransition,
    ListAllDependencyRisksParams, ListAllDependencyRisksResponse,
};

/// A proxy type bound to one RPC namespace.
pub trait RpcService: Send + Sync + Sized + 'static {
    const NAMESPACE: &'static str;

    fn bind(client: ServiceClient) -> Self;
}

/// Namespaced access to a live transport, shared by all proxies.
#[derive(Clone)]
pub struct ServiceClient {
    transport: Arc<RpcTransport>,
    namespace: &'static str,
}

impl ServiceClient {
    #[must_use]
    pub fn new(transport: Arc<RpcTransport>, namespace: &'static str) -> Self {
        Self {
            transport,
            namespace,
        }
    }

    #[must_use]
    pub fn method_name(&self, method: &str) -> String {
        format!("{}/{method}", self.namespace)
    }

    pub async fn request<P, R>(&self, method: &str, params: &P) -> Result<R, RpcError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.transport
            .invoke(&self.method_name(method), params)
            .await
    }

    pub async fn notify<P>(&self, method: &str, params: &P) -> Result<(), RpcError>
    where
        P: Serialize + ?Sized,
    {
        self.transport
            .notify(&self.method_name(method), params)
            .await
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The service type was never registered; a wiring mistake.
    #[error("service {0} is not registered")]
    NotRegistered(&'static str),
    /// Registered, but there is no live connection to the engine right now.
    #[error("service '{0}' is not available: engine is not connected")]
    NotAvailable(&'static str),
}

/// Resolves service proxies by type against the current transport.
///
/// The set of services is fixed at construction; the transport is swapped in
/// and out as engine sessions come and go.
pub struct ServiceProvider {
    registered: HashMap<TypeId, &'static str>,
    transport: RwLock<Option<Arc<RpcTransport>>>,
}

impl ServiceProvider {
    #[must_use]
    pub fn builder() -> ServiceProviderBuilder {
        ServiceProviderBuilder::default()
    }

    /// Every service this crate defines.
    #[must_use]
    pub fn with_all_services() -> Self {
        Self::builder()
            .register::<LifecycleService>()
            .register::<ConnectionService>()
            .register::<ConfigurationScopeService>()
            .register::<RuleService>()
            .register::<AnalysisService>()
            .register::<DependencyRiskService>()
            .register::<TaskProgressService>()
            .build()
    }

    pub fn attach(&self, transport: Arc<RpcTransport>) {
        *self.transport.write().unwrap_or_else(PoisonError::into_inner) = Some(transport);
    }

    pub fn detach(&self) -> Option<Arc<RpcTransport>> {
        self.transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.live_transport().is_some()
    }

    fn live_transport(&self) -> Option<Arc<RpcTransport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|t| !t.is_closed())
            .cloned()
    }

    pub fn get<S: RpcService>(&self) -> Result<S, ServiceError> {
        let Some(namespace) = self.registered.get(&TypeId::of::<S>()).copied() else {
            return Err(ServiceError::NotRegistered(std::any::type_name::<S>()));
        };
        let transport = self
            .live_transport()
            .ok_or(ServiceError::NotAvailable(namespace))?;
        Ok(S::bind(ServiceClient::new(transport, namespace)))
    }
}

#[derive(Default)]
pub struct ServiceProviderBuilder {
    registered: HashMap<TypeId, &'static str>,
}

impl ServiceProviderBuilder {
    #[must_use]
    pub fn register<S: RpcService>(mut self) -> Self {
        self.registered.insert(TypeId::of::<S>(), S::NAMESPACE);
        self
    }

    #[must_use]
    pub fn build(self) -> ServiceProvider {
        ServiceProvider {
            registered: self.registered,
            transport: RwLock::new(None),
        }
    }
}
