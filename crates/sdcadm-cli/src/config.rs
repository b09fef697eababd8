//! sdcadm config file
//!
//! ```toml
//! [clients]
//! cnapi_url = "http://cnapi.coal.example.com"
//! vmapi_url = "http://vmapi.coal.example.com"
//! imgapi_url = "http://imgapi.coal.example.com"
//!
//! [update]
//! concurrency = 10
//! ```

use anyhow::{Context, Result};
use sdcadm_clients::ClientsConfig;
use sdcadm_core::UpdateConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CliConfig {
    pub clients: ClientsConfig,
    #[serde(default)]
    pub update: UpdateConfig,
}

impl CliConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("invalid sdcadm config")?;
        config.update.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdcadm_core::UpgradeError;
    use std::io::Write;

    const CLIENTS: &str = r#"
        [clients]
        cnapi_url = "http://cnapi"
        vmapi_url = "http://vmapi"
        imgapi_url = "http://imgapi"
    "#;

    #[test]
    fn update_section_is_optional() {
        let config = CliConfig::from_toml_str(CLIENTS).unwrap();
        assert_eq!(config.clients.cnapi_url, "http://cnapi");
        assert_eq!(config.clients.timeout_secs, 30);
        assert_eq!(config.update, UpdateConfig::default());
    }

    #[test]
    fn loads_update_overrides_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{CLIENTS}\n[update]\nconcurrency = 3\n").unwrap();

        let config = CliConfig::load(file.path()).unwrap();
        assert_eq!(config.update.concurrency, 3);
    }

    #[test]
    fn invalid_update_section_is_usage_error() {
        let err = CliConfig::from_toml_str(&format!("{CLIENTS}\n[update]\nconcurrency = 0\n"))
            .unwrap_err();
        let usage = err.downcast_ref::<UpgradeError>().unwrap();
        assert_eq!(usage.exit_status(), 2);
    }

    #[test]
    fn missing_clients_section_is_rejected() {
        assert!(CliConfig::from_toml_str("[update]\nconcurrency = 2\n").is_err());
    }
}
