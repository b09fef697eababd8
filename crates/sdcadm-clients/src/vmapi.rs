//! Virtual machine API client

use crate::http::HttpApi;
use sdcadm_core::ClientError;
use serde::Deserialize;
use std::time::Duration;

/// VM record, reduced to what instance listing needs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Vm {
    pub uuid: String,
    pub server_uuid: String,
    #[serde(default)]
    pub image_uuid: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

/// VMAPI over HTTP
#[derive(Debug, Clone)]
pub struct VmapiHttp {
    api: HttpApi,
}

impl VmapiHttp {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            api: HttpApi::new("vmapi", base_url, timeout)?,
        })
    }

    /// Active VMs tagged with a core service role
    pub async fn list_service_vms(&self, service: &str) -> Result<Vec<Vm>, ClientError> {
        self.api
            .get("/vms", &[("tag.smartdc_role", service), ("state", "active")])
            .await
    }
}
