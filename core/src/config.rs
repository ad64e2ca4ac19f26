//! Client configuration.
//!
//! # Design
//! `ClientConfig` is read-only while a request runs: the transport borrows it
//! for the duration of one call. Everything that changes over a session
//! (server address, token, user id) lives in `AuthState` instead.
//!
//! Configuration can be built in code or loaded from a TOML file with
//! `JELLYFIN_` environment overrides, e.g. `JELLYFIN_HTTP__TIMEOUT_SECS=10`.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

const ENV_PREFIX: &str = "JELLYFIN";

/// Identity reported to the server in the authorization header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub device_name: String,
    pub device_id: String,
}

impl AppInfo {
    pub fn new(name: &str, version: &str, device_name: &str, device_id: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            device_name: device_name.to_string(),
            device_id: device_id.to_string(),
        }
    }
}

impl Default for AppInfo {
    /// Package name and version, with a freshly generated device id.
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            device_name: "Unknown Device".to_string(),
            device_id: Uuid::new_v4().simple().to_string(),
        }
    }
}

/// Transport defaults applied when a request does not override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    /// Total dispatch attempts per request.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Keep the session open between requests.
    pub keep_alive: bool,
    pub user_agent: Option<String>,
    pub verify_tls: bool,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 5,
            retry_backoff_ms: 1000,
            keep_alive: false,
            user_agent: None,
            verify_tls: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub app: AppInfo,
    pub http: HttpSettings,
}

impl ClientConfig {
    pub fn new(app: AppInfo) -> Self {
        Self {
            app,
            http: HttpSettings::default(),
        }
    }

    /// Load from a TOML file, then apply `JELLYFIN_*` environment overrides.
    /// Keys missing from both fall back to the defaults.
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let cfg = Config::builder()
            .add_source(config::File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__"))
            .build()?;

        let loaded: ClientConfig = cfg.try_deserialize()?;
        debug!(path:% = path.display(), device_id = loaded.app.device_id.as_str(); "Loaded client configuration");
        Ok(loaded)
    }

    /// `User-Agent` value: the configured one, or `name/version`.
    pub fn user_agent(&self) -> String {
        match self.http.user_agent.as_deref() {
            Some(agent) if !agent.is_empty() => agent.to_string(),
            _ => format!("{}/{}", self.app.name, self.app.version),
        }
    }
}
