//! Feature layer on top of the engine RPC and the server HTTP client.
//!
//! Stores hold what the engine and the server have reported; background
//! listeners keep them current. [`SlCoreSession`] composes one engine
//! process with its transport and services, and [`ServerEventPublisher`]
//! fans a connection's push events out to per-family listeners.

pub mod action_runner;
pub mod jobs;
pub mod notifications;
pub mod observers;
pub mod scope;
pub mod server_events;
pub mod session;
pub mod settings;
pub mod stores;

pub use action_runner::ActionRunner;
pub use jobs::{JobOutcome, TimedJobRunner};
pub use notifications::NotificationPoller;
pub use observers::{Observers, Subscription};
pub use scope::{ConfigurationScope, ConfigurationScopeTracker};
pub use server_events::{
    EventLoopListener, IssueEventHandler, QualityProfileEventHandler, ServerEventHandler,
    ServerEventPublisher, TaintEventHandler,
};
pub use session::{
    EngineStores, SessionCollaborators, SessionError, SessionOptions, SlCoreSession, TaskProgress,
};
pub use settings::{SettingChange, SettingsStore};
pub use stores::{
    DependencyRiskStore, IssueStore, QualityProfileStore, TaintIssue, TaintStore, TextRange,
};
