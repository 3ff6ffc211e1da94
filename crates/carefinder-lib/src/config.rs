//! Runtime configuration.
//!
//! The configuration file is JSON. Every section is optional; missing
//! sections and fields fall back to the defaults below.
//!
//! ```json
//! {
//!   "catalog": { "kind": "http", "url": "https://example.org/services.json" },
//!   "routing": { "base_url": "https://router.project-osrm.org", "profile": "driving" },
//!   "notifications": { "url": "wss://example.org/notifications", "max_attempts": 3 },
//!   "search": { "radius_km": 10.0 }
//! }
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::notify::{ReconnectPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::resolver::DEFAULT_RADIUS_KM;
use crate::route::{DEFAULT_OSRM_BASE_URL, DEFAULT_PROFILE};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "CAREFINDER_CONFIG";
pub const CATALOG_URL_ENV: &str = "CAREFINDER_CATALOG_URL";
pub const CATALOG_PATH_ENV: &str = "CAREFINDER_CATALOG_PATH";
pub const ROUTING_URL_ENV: &str = "CAREFINDER_ROUTING_URL";
pub const NOTIFICATIONS_URL_ENV: &str = "CAREFINDER_NOTIFICATIONS_URL";

const CONFIG_FILE_NAME: &str = "config.json";

/// Where the service catalog comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogSource {
    /// The fixture compiled into the library.
    #[default]
    Builtin,
    /// A JSON file on disk.
    Fixture { path: PathBuf },
    /// An HTTP endpoint returning a JSON array of records.
    Http { url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OSRM_BASE_URL.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            timeout_secs: 30,
        }
    }
}

impl RoutingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// WebSocket endpoint; notifications are disabled when unset.
    pub url: Option<String>,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
        }
    }
}

impl NotificationConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    pub radius_km: f64,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_RADIUS_KM,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarefinderConfig {
    pub catalog: CatalogSource,
    pub routing: RoutingConfig,
    pub notifications: NotificationConfig,
    pub search: SearchDefaults,
}

impl CarefinderConfig {
    /// Load configuration and apply environment overrides.
    ///
    /// The file is resolved in this order:
    /// 1. Explicit `path` argument when provided.
    /// 2. `CAREFINDER_CONFIG` environment variable.
    /// 3. `config.json` in the platform configuration directory, if present.
    /// 4. Built-in defaults.
    ///
    /// An explicitly named file that does not exist is an error; a missing
    /// platform file is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(explicit) = path {
            Self::from_path(explicit)?
        } else if let Some(env_path) = env::var_os(CONFIG_ENV) {
            Self::from_path(Path::new(&env_path))?
        } else {
            match default_config_path() {
                Ok(default) if default.is_file() => Self::from_path(&default)?,
                Ok(default) => {
                    debug!(path = %default.display(), "no configuration file; using defaults");
                    Self::default()
                }
                Err(err) => {
                    debug!(error = %err, "no platform configuration directory; using defaults");
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents).map_err(|err| Error::ConfigParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply `CAREFINDER_*` overrides read through `lookup`.
    ///
    /// A catalog URL takes precedence over a catalog path when both are set.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty(CATALOG_URL_ENV) {
            self.catalog = CatalogSource::Http { url };
        } else if let Some(path) = non_empty(CATALOG_PATH_ENV) {
            self.catalog = CatalogSource::Fixture {
                path: PathBuf::from(path),
            };
        }
        if let Some(url) = non_empty(ROUTING_URL_ENV) {
            self.routing.base_url = url;
        }
        if let Some(url) = non_empty(NOTIFICATIONS_URL_ENV) {
            self.notifications.url = Some(url);
        }
    }
}

/// Platform configuration file location, e.g. `~/.config/carefinder/config.json`.
pub fn default_config_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("org", "carefinder", "carefinder").ok_or(Error::ProjectDirsUnavailable)?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}
