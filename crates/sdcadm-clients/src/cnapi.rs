//! Compute node API client

use crate::http::HttpApi;
use async_trait::async_trait;
use sdcadm_core::{ClientError, CnapiClient, Server, Task, TaskHandle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct InstallAgentRequest<'a> {
    image_uuid: &'a str,
}

#[derive(Debug, Deserialize)]
struct TaskRef {
    id: String,
}

/// CNAPI over HTTP
#[derive(Debug, Clone)]
pub struct CnapiHttp {
    api: HttpApi,
}

impl CnapiHttp {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            api: HttpApi::new("cnapi", base_url, timeout)?,
        })
    }

    /// Every server with its agent records
    pub async fn list_servers(&self) -> Result<Vec<Server>, ClientError> {
        self.api.get("/servers", &[("extras", "agents")]).await
    }
}

#[async_trait]
impl CnapiClient for CnapiHttp {
    async fn post_install_agent_task(
        &self,
        server: &str,
        image_uuid: &str,
    ) -> Result<TaskHandle, ClientError> {
        let task: TaskRef = self
            .api
            .post(&format!("/servers/{server}/install-agent"), &InstallAgentRequest { image_uuid })
            .await?;
        debug!(server, image_uuid, task = %task.id, "install-agent task created");
        Ok(TaskHandle(task.id))
    }

    async fn get_task(&self, task: &TaskHandle) -> Result<Task, ClientError> {
        self.api.get(&format!("/tasks/{task}"), &[]).await
    }

    async fn get_server(&self, server: &str) -> Result<Server, ClientError> {
        self.api.get(&format!("/servers/{server}"), &[]).await
    }
}
