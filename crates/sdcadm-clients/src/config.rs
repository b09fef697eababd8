//! Collaborator endpoints

use serde::{Deserialize, Serialize};
use std::time::Duration;

const fn default_timeout_secs() -> u64 {
    30
}

/// `[clients]` section of the sdcadm config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientsConfig {
    pub cnapi_url: String,
    pub vmapi_url: String,
    pub imgapi_url: String,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ClientsConfig {
    pub fn new(
        cnapi_url: impl Into<String>,
        vmapi_url: impl Into<String>,
        imgapi_url: impl Into<String>,
    ) -> Self {
        Self {
            cnapi_url: cnapi_url.into(),
            vmapi_url: vmapi_url.into(),
            imgapi_url: imgapi_url.into(),
            timeout_secs: default_timeout_secs(),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
