//! Turn `update-agent` arguments into a change

use sdcadm_core::{Change, Image, Instance, Service, UpgradeError};
use std::collections::BTreeSet;
use tracing::debug;

/// What the operator asked to update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub service: String,
    pub servers: Option<Vec<String>>,
}

/// Build the change installing `image` on the requested instances.
///
/// Returns `None` when every selected instance already runs the image.
///
/// # Errors
/// - `UpgradeError::Usage` if the image is for another service, the
///   service has no instances, or a requested server does not run it
pub fn plan_change(
    request: &PlanRequest,
    image: Image,
    instances: Vec<Instance>,
) -> Result<Option<Change>, UpgradeError> {
    if !image.name.is_empty() && image.name != request.service {
        return Err(UpgradeError::usage(format!(
            "image {} is for \"{}\", not \"{}\"",
            image.uuid, image.name, request.service
        )));
    }

    let mut insts: Vec<Instance> = instances
        .into_iter()
        .filter(|i| i.service == request.service)
        .collect();
    if insts.is_empty() {
        return Err(UpgradeError::usage(format!(
            "no instances of \"{}\" found",
            request.service
        )));
    }

    if let Some(servers) = &request.servers {
        let wanted: BTreeSet<&str> = servers.iter().map(String::as_str).collect();
        let present: BTreeSet<&str> = insts.iter().map(|i| i.server.as_str()).collect();
        let missing: Vec<&str> = wanted.difference(&present).copied().collect();
        if !missing.is_empty() {
            return Err(UpgradeError::usage(format!(
                "\"{}\" is not running on server(s): {}",
                request.service,
                missing.join(", ")
            )));
        }
        insts.retain(|i| wanted.contains(i.server.as_str()));
    }

    let total = insts.len();
    insts.retain(|i| i.image_uuid.as_deref() != Some(image.uuid.as_str()));
    debug!(
        service = %request.service,
        selected = total,
        up_to_date = total - insts.len(),
        "planned agent update"
    );
    if insts.is_empty() {
        return Ok(None);
    }

    let insts = insts
        .into_iter()
        .map(|i| i.with_target(image.clone()))
        .collect();
    Ok(Some(Change::new(Service::agent(&request.service), image, insts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sdcadm_core::ErrorCode;

    fn image() -> Image {
        Image::new("img-new", "cn-agent", "2.0.0")
    }

    fn fleet() -> Vec<Instance> {
        vec![
            Instance::new("cn-agent", "A").with_image_uuid("img-old"),
            Instance::new("cn-agent", "B").with_image_uuid("img-new"),
            Instance::new("cn-agent", "C"),
            Instance::new("vm-agent", "A").with_image_uuid("img-vm"),
        ]
    }

    fn request(servers: Option<&[&str]>) -> PlanRequest {
        PlanRequest {
            service: "cn-agent".to_string(),
            servers: servers.map(|s| s.iter().map(|s| (*s).to_string()).collect()),
        }
    }

    fn servers_of(change: &Change) -> Vec<&str> {
        change.insts.iter().map(|i| i.server.as_str()).collect()
    }

    #[test]
    fn skips_instances_already_on_image() {
        let change = plan_change(&request(None), image(), fleet()).unwrap().unwrap();
        assert_eq!(servers_of(&change), vec!["A", "C"]);
        assert!(change.service.is_node_agent());
        assert!(change.insts.iter().all(|i| i.image.as_ref() == Some(&image())));
    }

    #[test]
    fn filters_by_requested_servers() {
        let change = plan_change(&request(Some(&["C"])), image(), fleet()).unwrap().unwrap();
        assert_eq!(servers_of(&change), vec!["C"]);
    }

    #[test]
    fn nothing_to_do_when_all_current() {
        assert!(plan_change(&request(Some(&["B"])), image(), fleet()).unwrap().is_none());
    }

    #[test]
    fn unknown_server_is_usage_error() {
        let err = plan_change(&request(Some(&["A", "Z"])), image(), fleet()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Usage);
        assert!(err.message().contains('Z'));
    }

    #[test]
    fn image_for_other_service_is_rejected() {
        let other = Image::new("img-vm2", "vm-agent", "1.9.0");
        assert_eq!(
            plan_change(&request(None), other, fleet()).unwrap_err().code(),
            ErrorCode::Usage
        );
    }

    #[test]
    fn service_without_instances_is_rejected() {
        let req = PlanRequest {
            service: "config-agent".to_string(),
            servers: None,
        };
        let image = Image::new("img-ca", "config-agent", "1.0.0");
        assert!(plan_change(&req, image, fleet()).is_err());
    }
}
