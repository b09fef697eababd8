//! Collaborator interfaces
//!
//! Procedures reach the fleet only through these traits. HTTP
//! implementations live in `sdcadm-clients`; tests use fakes or mocks.

use crate::error::ClientError;
use crate::types::{Instance, Server, Task, TaskHandle};
use async_trait::async_trait;
use std::sync::Arc;

/// Inventory of running service instances
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// List instances of the named services
    async fn list_instances(&self, services: &[String]) -> Result<Vec<Instance>, ClientError>;
}

/// Fleet-management API: task dispatch and server state
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CnapiClient: Send + Sync {
    /// Ask a server to install an agent image
    async fn post_install_agent_task(
        &self,
        server: &str,
        image_uuid: &str,
    ) -> Result<TaskHandle, ClientError>;

    /// Fetch a task record
    async fn get_task(&self, task: &TaskHandle) -> Result<Task, ClientError>;

    /// Fetch a server record including its agents
    async fn get_server(&self, server: &str) -> Result<Server, ClientError>;
}

/// Shared collaborator handles
#[derive(Clone)]
pub struct Clients {
    /// Instance inventory
    pub inventory: Arc<dyn InventoryClient>,
    /// Fleet-management API
    pub cnapi: Arc<dyn CnapiClient>,
}

impl Clients {
    /// Create client pool
    #[inline]
    #[must_use]
    pub fn new(inventory: Arc<dyn InventoryClient>, cnapi: Arc<dyn CnapiClient>) -> Self {
        Self { inventory, cnapi }
    }
}

impl std::fmt::Debug for Clients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clients").finish_non_exhaustive()
    }
}
