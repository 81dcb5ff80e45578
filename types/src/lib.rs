//! Core domain types for sonarlink.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from the RPC layer, the HTTP client and the feature layer.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod ids;
mod secret;
mod server;

pub use ids::{ConfigScopeId, ConnectionId};
pub use secret::{Credentials, Secret};
pub use server::{ServerFlavor, ServerInfo, ServerVersion, VersionParseError};
