//! HTTP collaborators for sdcadm
//!
//! Thin JSON clients over the fleet APIs, plus the inventory view the
//! update procedures read from:
//! - [`CnapiHttp`]: servers, agents and install tasks
//! - [`VmapiHttp`]: core service VMs
//! - [`ImgapiHttp`]: image manifests
//! - [`HttpInventory`]: instances of agent and VM services

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod http;

pub mod cnapi;
pub mod config;
pub mod imgapi;
pub mod inventory;
pub mod vmapi;

pub use cnapi::CnapiHttp;
pub use config::ClientsConfig;
pub use imgapi::ImgapiHttp;
pub use inventory::HttpInventory;
pub use vmapi::{Vm, VmapiHttp};

use sdcadm_core::{ClientError, Clients};
use std::sync::Arc;

/// Every HTTP collaborator, built from one config
#[derive(Debug, Clone)]
pub struct HttpClients {
    pub cnapi: Arc<CnapiHttp>,
    pub vmapi: Arc<VmapiHttp>,
    pub imgapi: Arc<ImgapiHttp>,
    pub inventory: Arc<HttpInventory>,
}

impl HttpClients {
    /// Build clients for the configured endpoints
    pub fn connect(config: &ClientsConfig) -> Result<Self, ClientError> {
        let timeout = config.timeout();
        let cnapi = Arc::new(CnapiHttp::new(&config.cnapi_url, timeout)?);
        let vmapi = Arc::new(VmapiHttp::new(&config.vmapi_url, timeout)?);
        let imgapi = Arc::new(ImgapiHttp::new(&config.imgapi_url, timeout)?);
        let inventory = Arc::new(HttpInventory::new(
            Arc::clone(&cnapi),
            Arc::clone(&vmapi),
            Arc::clone(&imgapi),
        ));
        Ok(Self {
            cnapi,
            vmapi,
            imgapi,
            inventory,
        })
    }

    /// Collaborator pool for procedures
    #[must_use]
    pub fn clients(&self) -> Clients {
        Clients::new(self.inventory.clone(), self.cnapi.clone())
    }
}
