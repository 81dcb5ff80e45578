//! Handlers for calls the engine makes back into the client.
//!
//! A [`ListenerRegistry`] maps inbound method names to exactly one handler.
//! It is assembled once through [`ListenerRegistryBuilder`] and handed to the
//! transport at attach time; nothing can be added or removed afterwards.
//!
//! Handlers run on the transport's reader task, so they must not block for long.

mod credentials;
mod events;
mod files;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::{ErrorObject, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};

pub use credentials::{
    CredentialsListener, CredentialsProvider, GET_CREDENTIALS, GetCredentialsParams,
    GetCredentialsResponse,
};
pub use events::{
    ClientEvent, DID_CHANGE_DEPENDENCY_RISKS, DID_CHANGE_TAINT_VULNERABILITIES, DependencyRiskDto,
    DidChangeDependencyRisksParams, DidChangeTaintVulnerabilitiesParams, END_PROGRESS,
    EndProgressParams, EventListener, RAISE_ISSUES, REPORT_PROGRESS, RaiseIssuesParams,
    RaisedIssueDto, ReportProgressParams, SHOW_SMART_NOTIFICATION, START_PROGRESS,
    ShowSmartNotificationParams, StartProgressParams, TaintVulnerabilityDto,
};
pub use files::{ClientFileDto, FileProvider, FilesListener, LIST_FILES, ListFilesParams, ListFilesResponse};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid params: {0}")]
    InvalidParams(#[source] serde_json::Error),
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub(crate) fn to_error_object(&self) -> ErrorObject {
        let code = match self {
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Internal(_) => INTERNAL_ERROR,
        };
        ErrorObject::new(code, self.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a handler for '{0}' is already registered")]
    DuplicateMethod(String),
}

type RequestFn = dyn Fn(Option<Value>) -> Result<Value, HandlerError> + Send + Sync;
type NotificationFn = dyn Fn(Option<Value>) -> Result<(), HandlerError> + Send + Sync;

#[derive(Clone)]
enum Handler {
    Request(Arc<RequestFn>),
    Notification(Arc<NotificationFn>),
}

/// A group of handlers that registers itself with a builder.
pub trait Listener: Send + Sync + 'static {
    fn register(self: Arc<Self>, builder: &mut ListenerRegistryBuilder);
}

fn decode_params<P: DeserializeOwned>(params: Option<Value>) -> Result<P, HandlerError> {
    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(HandlerError::InvalidParams)
}

#[derive(Default)]
pub struct ListenerRegistryBuilder {
    handlers: HashMap<String, Handler>,
    duplicates: Vec<String>,
}

impl ListenerRegistryBuilder {
    fn insert(&mut self, method: &str, handler: Handler) {
        if self.handlers.contains_key(method) {
            self.duplicates.push(method.to_string());
            return;
        }
        self.handlers.insert(method.to_string(), handler);
    }

    /// Register a request-style handler; its return value becomes the response `result`.
    pub fn request<P, R, F>(&mut self, method: &str, handler: F) -> &mut Self
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(P) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        let wrapped = move |params: Option<Value>| {
            let result = handler(decode_params(params)?)?;
            serde_json::to_value(result).map_err(|e| HandlerError::Internal(e.to_string()))
        };
        self.insert(method, Handler::Request(Arc::new(wrapped)));
        self
    }

    /// Register a notification-style handler (no response).
    pub fn notification<P, F>(&mut self, method: &str, handler: F) -> &mut Self
    where
        P: DeserializeOwned,
        F: Fn(P) + Send + Sync + 'static,
    {
        let wrapped = move |params: Option<Value>| {
            handler(decode_params(params)?);
            Ok(())
        };
        self.insert(method, Handler::Notification(Arc::new(wrapped)));
        self
    }

    pub fn listener<L: Listener>(&mut self, listener: Arc<L>) -> &mut Self {
        listener.register(self);
        self
    }

    pub fn build(self) -> Result<ListenerRegistry, RegistryError> {
        if let Some(method) = self.duplicates.into_iter().next() {
            return Err(RegistryError::DuplicateMethod(method));
        }
        Ok(ListenerRegistry {
            handlers: Arc::new(self.handlers),
        })
    }
}

/// Immutable method → handler table. Cheap to clone.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    handlers: Arc<HashMap<String, Handler>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn builder() -> ListenerRegistryBuilder {
        ListenerRegistryBuilder::default()
    }

    #[must_use]
    pub fn handles(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatch an inbound request. A notification-style handler answers `null`.
    pub(crate) fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, HandlerError> {
        match self.handlers.get(method) {
            Some(Handler::Request(handler)) => handler(params),
            Some(Handler::Notification(handler)) => handler(params).map(|()| Value::Null),
            None => Err(HandlerError::MethodNotFound(method.to_string())),
        }
    }

    /// Dispatch an inbound notification. Unknown methods and bad params are
    /// logged and dropped; a notification never produces a reply.
    pub(crate) fn handle_notification(&self, method: &str, params: Option<Value>) {
        let outcome = match self.handlers.get(method) {
            Some(Handler::Notification(handler)) => handler(params),
            Some(Handler::Request(handler)) => handler(params).map(|_| ()),
            None => {
                tracing::trace!(method, "Ignoring notification without a listener");
                return;
            }
        };
        if let Err(e) = outcome {
            tracing::debug!(method, error = %e, "Notification handler failed");
        }
    }
}
