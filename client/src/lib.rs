//! SonarQube / SonarCloud HTTP API client.
//!
//! [`SonarQubeClient::connect`] learns the server version once and picks a
//! [`RequestFactory`] for the server flavor. Every logical request is then
//! served by the newest endpoint the server supports. List endpoints are
//! aggregated by [`paging::collect_pages`]; non-success statuses come back as
//! a [`RequestResult`] without a value instead of an error.
//!
//! The push-event stream is read with [`SseStreamReader`], which decodes
//! frames into [`ServerEvent`]s.

pub mod auth;
pub mod events;
pub mod factory;
pub mod paging;
pub mod protobuf;
pub mod request;
pub mod requests;
pub mod retry;
pub mod sse;

mod client;
mod error;
mod http;

pub use auth::AuthError;
pub use client::SonarQubeClient;
pub use error::ClientError;
pub use events::{EventFamily, ServerEvent};
pub use factory::{FactoryError, LogicalRequest, RequestFactory};
pub use http::{ConnectionInfo, HttpOptions};
pub use request::RequestResult;
pub use retry::RetryConfig;
pub use sse::{HttpEventSource, RawEvent, RawEventSource, SseError, SseStreamReader};
