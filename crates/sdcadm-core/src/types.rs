//! Core types for sdcadm
//!
//! Defines the planning data model and the remote records the
//! procedures consume:
//! - images, services and instances
//! - changes and plans
//! - task and server records returned by CNAPI

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service that runs as a host daemon on every server
pub const CN_AGENT: &str = "cn-agent";

/// Fleet-management API service
pub const CNAPI: &str = "cnapi";

/// Image to install
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Image {
    /// Image UUID
    pub uuid: String,
    /// Image name, e.g. `cn-agent`
    #[serde(default)]
    pub name: String,
    /// Image version string
    pub version: String,
}

impl Image {
    /// Create image
    #[inline]
    #[must_use]
    pub fn new(
        uuid: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

/// How a service is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Host-level daemon on each server
    Agent,
    /// Provisioned VM
    Vm,
}

/// A named platform component
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Service {
    /// Service name, e.g. `cn-agent`
    pub name: String,
    /// Deployment kind
    #[serde(rename = "type")]
    pub kind: ServiceKind,
}

impl Service {
    /// Create agent service
    #[inline]
    #[must_use]
    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::Agent,
        }
    }

    /// Create VM service
    #[inline]
    #[must_use]
    pub fn vm(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::Vm,
        }
    }

    /// Whether this is the node agent that performs agent installs
    #[inline]
    #[must_use]
    pub fn is_node_agent(&self) -> bool {
        self.name == CN_AGENT
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One running unit of a service on one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Service name
    pub service: String,
    /// Hosting server UUID
    pub server: String,
    /// Instance id (VM UUID); agents have none
    #[serde(default)]
    pub instance: Option<String>,
    /// Currently reported version
    #[serde(default)]
    pub version: Option<String>,
    /// Currently installed image UUID
    #[serde(default)]
    pub image_uuid: Option<String>,
    /// Resolved target image
    #[serde(default)]
    pub image: Option<Image>,
}

impl Instance {
    /// Create instance on a server
    #[inline]
    #[must_use]
    pub fn new(service: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            server: server.into(),
            instance: None,
            version: None,
            image_uuid: None,
            image: None,
        }
    }

    /// With reported version
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// With installed image UUID
    #[inline]
    #[must_use]
    pub fn with_image_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.image_uuid = Some(uuid.into());
        self
    }

    /// With VM UUID
    #[inline]
    #[must_use]
    pub fn with_instance(mut self, id: impl Into<String>) -> Self {
        self.instance = Some(id.into());
        self
    }

    /// With resolved target image
    #[inline]
    #[must_use]
    pub fn with_target(mut self, image: Image) -> Self {
        self.image = Some(image);
        self
    }
}

/// Planned update of one service to one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Target service
    pub service: Service,
    /// Target image
    pub image: Image,
    /// Instances to update, in plan order
    pub insts: Vec<Instance>,
}

impl Change {
    /// Create change
    #[inline]
    #[must_use]
    pub fn new(service: Service, image: Image, insts: Vec<Instance>) -> Self {
        Self {
            service,
            image,
            insts,
        }
    }
}

/// Ordered list of changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Changes in execution order
    pub changes: Vec<Change>,
}

impl Plan {
    /// Create plan
    #[inline]
    #[must_use]
    pub fn new(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    /// Whether there is nothing to do
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Opaque id returned by a dispatch call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(pub String);

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote task status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    /// Still running
    Pending,
    /// Finished successfully
    Complete,
    /// Finished with an error
    Failure,
    /// Status this client does not know about
    Unknown(String),
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "complete" => Self::Complete,
            "failure" => Self::Failure,
            _ => Self::Unknown(s),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => "pending".to_string(),
            TaskStatus::Complete => "complete".to_string(),
            TaskStatus::Failure => "failure".to_string(),
            TaskStatus::Unknown(s) => s,
        }
    }
}

/// One entry of a task's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Event name, e.g. `error` or `finish`
    pub name: String,
    /// Event payload
    #[serde(default)]
    pub event: serde_json::Value,
}

/// Remote task record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task id
    pub id: String,
    /// Current status
    pub status: TaskStatus,
    /// Task history
    #[serde(default)]
    pub history: Vec<TaskEvent>,
}

impl Task {
    /// Error message reported by the last `error` history event
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.history
            .iter()
            .rev()
            .filter(|e| e.name == "error")
            .find_map(|e| {
                e.event
                    .pointer("/error/message")
                    .or_else(|| e.event.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
    }
}

/// Agent record reported by a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Agent name
    pub name: String,
    /// Installed image UUID
    #[serde(default)]
    pub image_uuid: Option<String>,
    /// Installed version
    #[serde(default)]
    pub version: Option<String>,
}

/// Server record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Server UUID
    pub uuid: String,
    /// Hostname
    #[serde(default)]
    pub hostname: Option<String>,
    /// Installed agents
    #[serde(default)]
    pub agents: Vec<AgentRecord>,
}

impl Server {
    /// Installed agent by name
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentRecord> {
        self.agents.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_status_decodes_known_and_unknown() {
        let task: Task = serde_json::from_value(json!({
            "id": "t1",
            "status": "complete",
        }))
        .unwrap();
        assert_eq!(task.status, TaskStatus::Complete);

        let task: Task = serde_json::from_value(json!({
            "id": "t2",
            "status": "queued",
        }))
        .unwrap();
        assert_eq!(task.status, TaskStatus::Unknown("queued".to_string()));
    }

    #[test]
    fn task_error_message_from_history() {
        let task: Task = serde_json::from_value(json!({
            "id": "t1",
            "status": "failure",
            "history": [
                {"name": "start", "event": {}},
                {"name": "error", "event": {"error": {"message": "first"}}},
                {"name": "error", "event": {"error": {"message": "image not found"}}},
                {"name": "finish", "event": {}}
            ]
        }))
        .unwrap();
        assert_eq!(task.error_message().as_deref(), Some("image not found"));

        let bare = Task {
            id: "t2".to_string(),
            status: TaskStatus::Failure,
            history: vec![],
        };
        assert!(bare.error_message().is_none());
    }

    #[test]
    fn server_agent_lookup() {
        let server: Server = serde_json::from_value(json!({
            "uuid": "s1",
            "agents": [{"name": "cn-agent", "image_uuid": "img-1", "version": "2.0.0"}]
        }))
        .unwrap();
        assert_eq!(
            server.agent(CN_AGENT).and_then(|a| a.image_uuid.as_deref()),
            Some("img-1")
        );
        assert!(server.agent("vm-agent").is_none());
    }

    #[test]
    fn service_kind_from_json() {
        let svc: Service =
            serde_json::from_value(json!({"name": "cn-agent", "type": "agent"})).unwrap();
        assert!(svc.is_node_agent());
        assert_eq!(svc.kind, ServiceKind::Agent);
    }
}
