//! RPC client for the SLCore analysis engine.
//!
//! [`EngineProcess`] spawns the engine with redirected stdio. Its stderr goes
//! to an [`ErrorStreamDrainer`]; stdin/stdout are wrapped in an
//! [`RpcTransport`] that speaks JSON-RPC 2.0. Outbound calls go through typed
//! proxies resolved from a [`ServiceProvider`]; inbound calls are dispatched
//! through a fixed [`ListenerRegistry`].

pub mod codec;
pub mod dto;
pub mod either;
pub mod listeners;
pub mod protocol;
pub mod services;

mod process;
mod stderr;
mod transport;

#[cfg(test)]
mod test_support;

pub use either::Either;
pub use listeners::{ClientEvent, HandlerError, Listener, ListenerRegistry, RegistryError};
pub use process::{EngineProcess, LaunchParameters, ProcessError};
pub use services::{RpcService, ServiceClient, ServiceError, ServiceProvider};
pub use stderr::{ErrorLineSink, ErrorStreamDrainer, STDERR_MARKER, TracingSink};
pub use transport::{RpcError, RpcTransport, TransportOptions};
