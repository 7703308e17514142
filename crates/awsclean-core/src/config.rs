use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collect::DEFAULT_AUDIT_PAGE_DELAY;
use crate::duration::{DurationError, parse_duration};

/// Config file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid older_then in {}: {source}", path.display())]
    Duration {
        path: PathBuf,
        #[source]
        source: DurationError,
    },
}

/// User settings from `<config_dir>/awsclean/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Output mode: `pretty`, `text` or `json`.
    #[serde(default)]
    pub output: Option<String>,
    /// AWS region override.
    #[serde(default)]
    pub region: Option<String>,
    /// AWS shared-config profile.
    #[serde(default)]
    pub profile: Option<String>,
    /// Default age threshold, e.g. `14d`.
    #[serde(default)]
    pub older_then: Option<String>,
    /// Regexes of resource names never deleted.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Seconds to wait before each audit-trail page.
    #[serde(default = "default_audit_page_delay_secs")]
    pub audit_page_delay_secs: u64,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            output: None,
            region: None,
            profile: None,
            older_then: None,
            ignore: Vec::new(),
            audit_page_delay_secs: default_audit_page_delay_secs(),
        }
    }
}

impl UserConfig {
    /// Configured age threshold, parsed.
    ///
    /// # Errors
    ///
    /// Returns [`DurationError`] when `older_then` is not a valid duration.
    pub fn older_then(&self) -> Result<Option<Duration>, DurationError> {
        self.older_then.as_deref().map(parse_duration).transpose()
    }

    #[must_use]
    pub const fn audit_page_delay(&self) -> Duration {
        Duration::from_secs(self.audit_page_delay_secs)
    }
}

/// `<config_dir>/awsclean/config.toml`, when the platform has a config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("awsclean/config.toml"))
}

/// Load the user config from the default location; a missing file yields
/// the defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    let Some(path) = default_config_path() else {
        return Ok(UserConfig::default());
    };
    if !path.exists() {
        return Ok(UserConfig::default());
    }
    load_config_from(&path)
}

/// Load a config file that must exist.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, is not valid TOML,
/// or carries an invalid `older_then`.
pub fn load_config_from(path: &Path) -> Result<UserConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config = toml::from_str::<UserConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    config.older_then().map_err(|source| ConfigError::Duration {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(config)
}

const fn default_audit_page_delay_secs() -> u64 {
    DEFAULT_AUDIT_PAGE_DELAY.as_secs()
}
