//! Update configuration
//!
//! Tunables for agent updates. Loaded from the `[update]` table of the
//! sdcadm config file; every field has a default.

use crate::error::UpgradeError;
use crate::poll::PollOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Oldest CNAPI build that supports agent installs through tasks
pub const MIN_CNAPI_BUILD: &str = "20160315T181940Z";

/// Oldest cn-agent able to install agents
pub const MIN_CN_AGENT_VERSION: &str = "1.4.0";

/// Agent-update tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Concurrent per-server install chains
    pub concurrency: usize,
    /// Polling budget for install completion
    pub poll: PollOptions,
    /// Minimum CNAPI build timestamp
    pub min_cnapi_build: String,
    /// Minimum co-located cn-agent version
    pub min_cn_agent_version: String,
}

impl UpdateConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With concurrency
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With polling budget
    #[inline]
    #[must_use]
    pub fn with_poll(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    /// Parse from TOML and validate
    ///
    /// # Errors
    /// - `UpgradeError::Usage` on malformed TOML or invalid values
    pub fn from_toml_str(s: &str) -> Result<Self, UpgradeError> {
        let config: Self = toml::from_str(s)
            .map_err(|e| UpgradeError::usage(format!("invalid update config: {e}")).with_cause(e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// - `UpgradeError::Usage` if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, UpgradeError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            UpgradeError::usage(format!("cannot read config {}: {e}", path.display())).with_cause(e)
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// - `UpgradeError::Usage` naming the first invalid field
    pub fn validate(&self) -> Result<(), UpgradeError> {
        if self.concurrency == 0 {
            return Err(UpgradeError::usage("update.concurrency must be at least 1"));
        }
        if self.poll.interval.is_zero() {
            return Err(UpgradeError::usage("update.poll.interval_ms must be greater than 0"));
        }
        if self.poll.max_attempts == 0 {
            return Err(UpgradeError::usage("update.poll.max_attempts must be at least 1"));
        }
        if crate::version::Version::parse(&self.min_cn_agent_version).is_none() {
            return Err(UpgradeError::usage(format!(
                "update.min_cn_agent_version is not a version: {}",
                self.min_cn_agent_version
            )));
        }
        Ok(())
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            poll: PollOptions::default(),
            min_cnapi_build: MIN_CNAPI_BUILD.to_string(),
            min_cn_agent_version: MIN_CN_AGENT_VERSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn defaults() {
        let config = UpdateConfig::new();
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.poll.max_attempts, 60);
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(config.min_cn_agent_version, "1.4.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = UpdateConfig::from_toml_str(
            r#"
            concurrency = 4

            [poll]
            max_attempts = 12
            "#,
        )
        .unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.poll.max_attempts, 12);
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(config.min_cnapi_build, MIN_CNAPI_BUILD);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = UpdateConfig::from_toml_str("concurrency = 0").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Usage);
        assert!(err.message().contains("concurrency"));
    }

    #[test]
    fn poll_interval_is_read_in_milliseconds() {
        let config = UpdateConfig::from_toml_str("[poll]\ninterval_ms = 500\n").unwrap();
        assert_eq!(config.poll.interval, Duration::from_millis(500));
        assert_eq!(config.poll.budget(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let err = UpdateConfig::from_toml_str("[poll]\ninterval_ms = 0\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Usage);
        assert!(err.message().contains("interval_ms"), "{err}");

        let config = UpdateConfig::new().with_poll(PollOptions::new(Duration::ZERO, 60));
        assert_eq!(config.validate().unwrap_err().code(), ErrorCode::Usage);
    }

    #[test]
    fn rejects_bad_min_version() {
        let err = UpdateConfig::from_toml_str(r#"min_cn_agent_version = "latest""#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Usage);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "concurrency = 2").unwrap();
        let config = UpdateConfig::load(file.path()).unwrap();
        assert_eq!(config.concurrency, 2);

        let err = UpdateConfig::load(Path::new("/nonexistent/sdcadm.toml")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Usage);
    }
}
