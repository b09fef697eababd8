//! Instance inventory assembled from CNAPI, VMAPI and IMGAPI
//!
//! Agent services are read from server agent records. Any service no
//! server reports as an agent is looked up as a core VM role, with its
//! version taken from the VM's image manifest.

use crate::{CnapiHttp, ImgapiHttp, Vm, VmapiHttp};
use async_trait::async_trait;
use sdcadm_core::{ClientError, Image, Instance, InventoryClient, Server};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// [`InventoryClient`] backed by the HTTP collaborators
#[derive(Debug, Clone)]
pub struct HttpInventory {
    cnapi: Arc<CnapiHttp>,
    vmapi: Arc<VmapiHttp>,
    imgapi: Arc<ImgapiHttp>,
}

impl HttpInventory {
    pub fn new(cnapi: Arc<CnapiHttp>, vmapi: Arc<VmapiHttp>, imgapi: Arc<ImgapiHttp>) -> Self {
        Self {
            cnapi,
            vmapi,
            imgapi,
        }
    }

    async fn image(
        &self,
        cache: &mut HashMap<String, Option<Image>>,
        uuid: &str,
    ) -> Result<Option<Image>, ClientError> {
        if let Some(image) = cache.get(uuid) {
            return Ok(image.clone());
        }
        let image = match self.imgapi.get_image(uuid).await {
            Ok(image) => Some(image),
            Err(ClientError::Api { status: 404, .. }) => {
                warn!(image = uuid, "image not found, instance version unknown");
                None
            }
            Err(e) => return Err(e),
        };
        cache.insert(uuid.to_string(), image.clone());
        Ok(image)
    }
}

#[async_trait]
impl InventoryClient for HttpInventory {
    async fn list_instances(&self, services: &[String]) -> Result<Vec<Instance>, ClientError> {
        let servers = self.cnapi.list_servers().await?;
        let mut images = HashMap::new();
        let mut instances = Vec::new();

        for service in services {
            let agents = agent_instances(&servers, service);
            if !agents.is_empty() {
                debug!(service = %service, count = agents.len(), "agent instances");
                instances.extend(agents);
                continue;
            }

            let vms = self.vmapi.list_service_vms(service).await?;
            debug!(service = %service, count = vms.len(), "service vms");
            for vm in &vms {
                let image = match vm.image_uuid.as_deref() {
                    Some(uuid) => self.image(&mut images, uuid).await?,
                    None => None,
                };
                instances.push(vm_instance(service, vm, image.as_ref()));
            }
        }
        Ok(instances)
    }
}

/// One instance per server reporting `service` as an agent
pub(crate) fn agent_instances(servers: &[Server], service: &str) -> Vec<Instance> {
    servers
        .iter()
        .filter_map(|server| {
            let agent = server.agent(service)?;
            let mut inst = Instance::new(service, &server.uuid);
            inst.version.clone_from(&agent.version);
            inst.image_uuid.clone_from(&agent.image_uuid);
            Some(inst)
        })
        .collect()
}

pub(crate) fn vm_instance(service: &str, vm: &Vm, image: Option<&Image>) -> Instance {
    let mut inst = Instance::new(service, &vm.server_uuid).with_instance(&vm.uuid);
    inst.image_uuid.clone_from(&vm.image_uuid);
    inst.version = image.map(|i| i.version.clone());
    inst
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sdcadm_core::AgentRecord;

    fn server(uuid: &str, agents: &[(&str, &str)]) -> Server {
        Server {
            uuid: uuid.to_string(),
            hostname: None,
            agents: agents
                .iter()
                .map(|(name, version)| AgentRecord {
                    name: (*name).to_string(),
                    image_uuid: Some(format!("img-{name}")),
                    version: Some((*version).to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn agent_instances_skip_servers_without_the_agent() {
        let servers = vec![
            server("cn0", &[("cn-agent", "1.5.0"), ("vm-agent", "1.8.0")]),
            server("cn1", &[("cn-agent", "1.2.0")]),
        ];

        let cn = agent_instances(&servers, "cn-agent");
        assert_eq!(cn.len(), 2);
        assert_eq!(cn[1].server, "cn1");
        assert_eq!(cn[1].version.as_deref(), Some("1.2.0"));
        assert_eq!(cn[1].image_uuid.as_deref(), Some("img-cn-agent"));

        let vm = agent_instances(&servers, "vm-agent");
        assert_eq!(vm.len(), 1);
        assert!(agent_instances(&servers, "cnapi").is_empty());
    }

    #[test]
    fn vm_instance_takes_version_from_image() {
        let vm = Vm {
            uuid: "vm-1".to_string(),
            server_uuid: "headnode".to_string(),
            image_uuid: Some("img-cnapi".to_string()),
            alias: Some("cnapi0".to_string()),
        };
        let image = Image::new("img-cnapi", "cnapi", "master-20170101T000000Z-g1234567");

        let inst = vm_instance("cnapi", &vm, Some(&image));
        assert_eq!(inst.server, "headnode");
        assert_eq!(inst.instance.as_deref(), Some("vm-1"));
        assert_eq!(inst.version.as_deref(), Some("master-20170101T000000Z-g1234567"));

        assert!(vm_instance("cnapi", &vm, None).version.is_none());
    }
}
