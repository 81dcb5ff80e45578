//! `~/.sonarlink/config.toml` loading.
//!
//! Every section is optional; accessors fall back to defaults. String values
//! that carry secrets or locations support `${VAR}` expansion.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use sonarlink_types::{ConfigScopeId, ConnectionId, Credentials};
use thiserror::Error;

/// Overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "SONARLINK_CONFIG";

const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_PAGE_SIZE: usize = 500;
const DEFAULT_PCH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 120;
const DEFAULT_NOTIFICATION_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SonarlinkConfig {
    pub engine: Option<EngineConfig>,
    pub log: Option<LogConfig>,
    pub http: Option<HttpConfig>,
    pub jobs: Option<JobsConfig>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub scopes: Vec<ScopeConfig>,
}

const fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Executable path, or a bare name looked up on `PATH`.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Unset means outbound calls wait for their response indefinitely.
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl EngineConfig {
    #[must_use]
    pub fn command(&self) -> String {
        expand_env_vars(&self.command)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` takes precedence.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub page_size: Option<usize>,
}

impl HttpConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    /// Clamped to what the server accepts.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct JobsConfig {
    pub pch_timeout_secs: Option<u64>,
    /// Bound on the initial server synchronization of a scope.
    pub sync_timeout_secs: Option<u64>,
    pub notification_interval_secs: Option<u64>,
}

impl JobsConfig {
    #[must_use]
    pub fn pch_timeout(&self) -> Duration {
        Duration::from_secs(self.pch_timeout_secs.unwrap_or(DEFAULT_PCH_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs.unwrap_or(DEFAULT_SYNC_TIMEOUT_SECS))
    }

    /// Never below one second.
    #[must_use]
    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(
            self.notification_interval_secs
                .unwrap_or(DEFAULT_NOTIFICATION_INTERVAL_SECS)
                .max(1),
        )
    }
}

/// A folder or solution the engine should analyze.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    pub id: String,
    pub name: Option<String>,
    pub path: String,
    /// Id of a `[[connections]]` entry; unbound when absent.
    pub connection: Option<String>,
    pub project_key: Option<String>,
}

impl ScopeConfig {
    #[must_use]
    pub fn config_scope_id(&self) -> ConfigScopeId {
        ConfigScopeId::new(self.id.clone())
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.path))
    }

    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.clone().map(ConnectionId::new)
    }
}

#[derive(Clone, Deserialize)]
pub struct ConnectionConfig {
    pub id: String,
    pub server_url: String,
    /// Present for SonarCloud connections.
    pub organization: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

// Manual Debug impl to keep secrets out of logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(opt: Option<&String>) -> &'static str {
            if opt.is_some() { "[REDACTED]" } else { "None" }
        }
        f.debug_struct("ConnectionConfig")
            .field("id", &self.id)
            .field("server_url", &self.server_url)
            .field("organization", &self.organization)
            .field("token", &mask(self.token.as_ref()))
            .field("username", &self.username)
            .field("password", &mask(self.password.as_ref()))
            .field("projects", &self.projects)
            .field("languages", &self.languages)
            .finish()
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.id.clone())
    }

    #[must_use]
    pub fn server_url(&self) -> String {
        expand_env_vars(&self.server_url)
    }

    /// A token wins over a username/password pair. Values that expand to
    /// nothing count as absent.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        let expand = |value: &Option<String>| {
            value
                .as_deref()
                .map(expand_env_vars)
                .filter(|v| !v.is_empty())
        };
        if let Some(token) = expand(&self.token) {
            return Some(Credentials::token(token));
        }
        match (expand(&self.username), expand(&self.password)) {
            (Some(username), Some(password)) => {
                Some(Credentials::username_password(username, password))
            }
            _ => None,
        }
    }
}

/// Replace `${VAR}` with the variable's value; unset variables expand to "".
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl SonarlinkConfig {
    /// Load from [`config_path`]. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(source) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, source);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.log.as_ref().and_then(|log| log.filter.as_deref())
    }

    #[must_use]
    pub fn http(&self) -> HttpConfig {
        self.http.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn pch_timeout(&self) -> Duration {
        self.jobs
            .as_ref()
            .map_or(Duration::from_secs(DEFAULT_PCH_TIMEOUT_SECS), JobsConfig::pch_timeout)
    }

    #[must_use]
    pub fn sync_timeout(&self) -> Duration {
        self.jobs
            .as_ref()
            .map_or(Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS), JobsConfig::sync_timeout)
    }

    #[must_use]
    pub fn notification_interval(&self) -> Duration {
        self.jobs.as_ref().map_or(
            Duration::from_secs(DEFAULT_NOTIFICATION_INTERVAL_SECS),
            JobsConfig::notification_interval,
        )
    }

    #[must_use]
    pub fn connection(&self, id: &ConnectionId) -> Option<&ConnectionConfig> {
        self.connections.iter().find(|c| c.id == id.as_str())
    }
}

/// `~/.sonarlink`: logs, engine storage and work directories live here.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".sonarlink"))
}

/// `$SONARLINK_CONFIG`, else `~/.sonarlink/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    data_dir().map(|dir| dir.join("config.toml"))
}
