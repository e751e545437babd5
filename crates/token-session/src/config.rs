//! Configuration types and loading
//!
//! Precedence: env vars > config file > defaults. Only the client id can be
//! overridden from the environment (`OAUTH_CLIENT_ID`), so one config file
//! can serve several registered clients.

use std::path::{Path, PathBuf};
use std::time::Duration;

use oauth_pkce::ClientConfig;
use serde::{Deserialize, Deserializer};

use crate::idle::ActivitySignal;

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub oauth: ClientConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Timer settings for an authenticated session
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Period of the silent refresh ticker.
    #[serde(
        rename = "refresh_interval_secs",
        default = "default_refresh_interval",
        deserialize_with = "duration_from_secs"
    )]
    pub refresh_interval: Duration,
    /// Inactivity window after which the session is torn down.
    #[serde(
        rename = "idle_timeout_secs",
        default = "default_idle_timeout",
        deserialize_with = "duration_from_secs"
    )]
    pub idle_timeout: Duration,
    #[serde(default = "ActivitySignal::defaults")]
    pub activity_signals: Vec<ActivitySignal>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            idle_timeout: default_idle_timeout(),
            activity_signals: ActivitySignal::defaults(),
        }
    }
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(240)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(600)
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

impl Config {
    /// Load configuration from a TOML file, validate it, then overlay
    /// environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(client_id) = std::env::var("OAUTH_CLIENT_ID") {
            config.oauth.client_id = client_id;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check everything serde cannot.
    pub fn validate(&self) -> common::Result<()> {
        self.oauth.validate()?;

        if self.session.refresh_interval.is_zero() {
            return Err(common::Error::Config(
                "refresh_interval_secs must be greater than 0".into(),
            ));
        }
        if self.session.idle_timeout.is_zero() {
            return Err(common::Error::Config(
                "idle_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.session.activity_signals.is_empty() {
            return Err(common::Error::Config(
                "activity_signals must name at least one signal".into(),
            ));
        }
        Ok(())
    }

    /// Resolve config file path from an explicit argument or the CONFIG_PATH
    /// env var.
    pub fn resolve_path(explicit: Option<&str>) -> PathBuf {
        if let Some(p) = explicit {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("token-session.toml")
    }
}
