//! Testing utilities for sdcadm workspace
//!
//! Shared fakes, fixtures, and progress capture.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sdcadm_core::{
    AgentRecord, Change, ClientError, Clients, CnapiClient, ExecutionContext, Image, Instance,
    InventoryClient, Plan, Progress, Server, Service, Task, TaskEvent, TaskHandle, TaskStatus,
    UpdateConfig, CNAPI, CN_AGENT,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// CNAPI version new enough for agent installs
pub const GOOD_CNAPI_VERSION: &str = "master-20170101T000000Z-g1234567";

/// CNAPI version older than the minimum build
pub const OLD_CNAPI_VERSION: &str = "master-20150101T000000Z-g1234567";

/// How a server responds to an install
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Report pending for `polls` queries, then succeed
    Succeed { polls: u32 },
    /// Task fails with an optional error message in its history
    Fail { message: Option<String> },
    /// Never finishes
    Hang,
    /// Dispatch call itself fails
    RejectDispatch(ClientError),
}

#[derive(Debug)]
struct Install {
    server: String,
    image_uuid: String,
    behavior: Behavior,
    polls: u32,
    open: bool,
}

#[derive(Debug, Default)]
struct State {
    instances: Vec<Instance>,
    behaviors: HashMap<String, Behavior>,
    installed: HashMap<String, String>,
    tasks: HashMap<String, Install>,
    dispatches: Vec<(String, String)>,
    next_task: u64,
    active: usize,
    peak: usize,
}

/// In-memory fleet implementing the inventory and CNAPI traits.
///
/// An install chain counts as active from dispatch until the fake has
/// reported a terminal state for it.
#[derive(Debug, Default)]
pub struct FakeFleet {
    state: Mutex<State>,
    dispatch_delay: Option<Duration>,
    list_error: Option<ClientError>,
}

impl FakeFleet {
    /// Empty fleet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fleet with a compatible CNAPI and one cn-agent per server
    #[must_use]
    pub fn with_agents(agent_versions: &[(&str, &str)]) -> Self {
        let cnapi = Instance::new(CNAPI, "headnode").with_version(GOOD_CNAPI_VERSION);
        let fleet = Self::new().with_instance(cnapi);
        agent_versions.iter().fold(fleet, |fleet, (server, version)| {
            fleet.with_instance(
                Instance::new(CN_AGENT, *server)
                    .with_version(*version)
                    .with_image_uuid("img-old"),
            )
        })
    }

    /// Add an inventory instance
    #[must_use]
    pub fn with_instance(self, inst: Instance) -> Self {
        {
            let mut state = self.state.lock();
            if let Some(uuid) = inst.image_uuid.clone() {
                state.installed.insert(format!("{}/{}", inst.server, inst.service), uuid);
            }
            state.instances.push(inst);
        }
        self
    }

    /// Replace every CNAPI instance version
    #[must_use]
    pub fn with_cnapi_version(self, version: &str) -> Self {
        {
            let mut state = self.state.lock();
            for inst in state.instances.iter_mut().filter(|i| i.service == CNAPI) {
                inst.version = Some(version.to_string());
            }
        }
        self
    }

    /// Set install behavior for a server
    #[must_use]
    pub fn with_behavior(self, server: &str, behavior: Behavior) -> Self {
        self.state.lock().behaviors.insert(server.to_string(), behavior);
        self
    }

    /// Set install behavior for one image on a server
    #[must_use]
    pub fn with_image_behavior(self, server: &str, image_uuid: &str, behavior: Behavior) -> Self {
        self.state
            .lock()
            .behaviors
            .insert(format!("{server}/{image_uuid}"), behavior);
        self
    }

    /// Delay every dispatch call
    #[must_use]
    pub fn with_dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = Some(delay);
        self
    }

    /// Make inventory queries fail
    #[must_use]
    pub fn with_list_error(mut self, err: ClientError) -> Self {
        self.list_error = Some(err);
        self
    }

    /// `(server, image_uuid)` of every dispatch, in call order
    #[must_use]
    pub fn dispatches(&self) -> Vec<(String, String)> {
        self.state.lock().dispatches.clone()
    }

    /// Highest number of simultaneously active install chains
    #[must_use]
    pub fn peak_active(&self) -> usize {
        self.state.lock().peak
    }

    /// Currently active install chains
    #[must_use]
    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    /// Image a server reports for an agent
    #[must_use]
    pub fn installed(&self, server: &str, agent: &str) -> Option<String> {
        self.state.lock().installed.get(&format!("{server}/{agent}")).cloned()
    }

    /// Client pool backed by this fleet
    #[must_use]
    pub fn clients(self: &Arc<Self>) -> Clients {
        Clients::new(
            Arc::clone(self) as Arc<dyn InventoryClient>,
            Arc::clone(self) as Arc<dyn CnapiClient>,
        )
    }
}

impl State {
    fn finish(&mut self, task: &str) {
        if let Some(install) = self.tasks.get_mut(task) {
            if install.open {
                install.open = false;
                self.active -= 1;
            }
        }
    }

    fn open_task_for(&self, server: &str) -> Option<String> {
        self.tasks
            .iter()
            .find(|(_, i)| i.server == server && i.open)
            .map(|(id, _)| id.clone())
    }
}

#[async_trait]
impl InventoryClient for FakeFleet {
    async fn list_instances(&self, services: &[String]) -> Result<Vec<Instance>, ClientError> {
        if let Some(err) = &self.list_error {
            return Err(err.clone());
        }
        Ok(self
            .state
            .lock()
            .instances
            .iter()
            .filter(|i| services.contains(&i.service))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CnapiClient for FakeFleet {
    async fn post_install_agent_task(
        &self,
        server: &str,
        image_uuid: &str,
    ) -> Result<TaskHandle, ClientError> {
        let behavior = {
            let mut state = self.state.lock();
            state.dispatches.push((server.to_string(), image_uuid.to_string()));
            state
                .behaviors
                .get(&format!("{server}/{image_uuid}"))
                .or_else(|| state.behaviors.get(server))
                .cloned()
                .unwrap_or(Behavior::Succeed { polls: 1 })
        };
        if let Behavior::RejectDispatch(err) = behavior {
            return Err(err);
        }

        let id = {
            let mut state = self.state.lock();
            state.next_task += 1;
            let id = format!("task-{}", state.next_task);
            state.tasks.insert(
                id.clone(),
                Install {
                    server: server.to_string(),
                    image_uuid: image_uuid.to_string(),
                    behavior,
                    polls: 0,
                    open: true,
                },
            );
            state.active += 1;
            state.peak = state.peak.max(state.active);
            id
        };

        if let Some(delay) = self.dispatch_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(TaskHandle(id))
    }

    async fn get_task(&self, task: &TaskHandle) -> Result<Task, ClientError> {
        let mut state = self.state.lock();
        let (status, history) = {
            let install = state.tasks.get_mut(&task.0).ok_or_else(|| {
                ClientError::api(404, Some("ResourceNotFound"), format!("task {task} not found"))
            })?;
            install.polls += 1;
            match &install.behavior {
                Behavior::Succeed { polls } if install.polls > *polls => {
                    (TaskStatus::Complete, vec![])
                }
                Behavior::Fail { message } => {
                    let history = message
                        .iter()
                        .map(|m| TaskEvent {
                            name: "error".to_string(),
                            event: serde_json::json!({ "error": { "message": m } }),
                        })
                        .collect();
                    (TaskStatus::Failure, history)
                }
                _ => (TaskStatus::Pending, vec![]),
            }
        };
        if matches!(status, TaskStatus::Complete | TaskStatus::Failure) {
            state.finish(&task.0);
        }
        Ok(Task {
            id: task.0.clone(),
            status,
            history,
        })
    }

    async fn get_server(&self, server: &str) -> Result<Server, ClientError> {
        let mut state = self.state.lock();
        let exists = state.instances.iter().any(|i| i.server == server);
        if !exists {
            return Err(ClientError::api(
                404,
                Some("ResourceNotFound"),
                format!("server {server} not found"),
            ));
        }

        if let Some(task) = state.open_task_for(server) {
            let done = {
                let install = state
                    .tasks
                    .get_mut(&task)
                    .ok_or_else(|| ClientError::Transport("task vanished".into()))?;
                install.polls += 1;
                match install.behavior {
                    Behavior::Succeed { polls } if install.polls > polls => {
                        Some((install.image_uuid.clone(), install.server.clone()))
                    }
                    _ => None,
                }
            };
            if let Some((image_uuid, server)) = done {
                state.finish(&task);
                state.installed.insert(format!("{server}/{CN_AGENT}"), image_uuid);
            }
        }

        let agents = state
            .instances
            .iter()
            .filter(|i| i.server == server && i.instance.is_none() && i.service != CNAPI)
            .map(|i| AgentRecord {
                name: i.service.clone(),
                image_uuid: state.installed.get(&format!("{server}/{}", i.service)).cloned(),
                version: i.version.clone(),
            })
            .collect();
        Ok(Server {
            uuid: server.to_string(),
            hostname: None,
            agents,
        })
    }
}

/// Progress sink that records every line
#[derive(Debug, Default)]
pub struct CapturedProgress {
    lines: Mutex<Vec<String>>,
}

impl CapturedProgress {
    /// Create empty capture
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured lines
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Progress for CapturedProgress {
    fn progress(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

/// Agent image fixture
#[must_use]
pub fn agent_image(uuid: &str, name: &str, version: &str) -> Image {
    Image::new(uuid, name, version)
}

/// Change installing `image` for `service` on `servers`
#[must_use]
pub fn agent_change(service: &str, image: &Image, servers: &[&str]) -> Change {
    Change::new(
        Service::agent(service),
        image.clone(),
        servers
            .iter()
            .map(|s| Instance::new(service, *s).with_target(image.clone()))
            .collect(),
    )
}

/// Context over a fake fleet with captured progress
#[must_use]
pub fn fleet_context(
    fleet: &Arc<FakeFleet>,
    plan: Plan,
    config: UpdateConfig,
) -> (ExecutionContext, Arc<CapturedProgress>) {
    let progress = Arc::new(CapturedProgress::new());
    let ctx = ExecutionContext::new(fleet.clients(), plan)
        .with_progress(Arc::clone(&progress) as Arc<dyn Progress>)
        .with_config(config);
    (ctx, progress)
}
