//! CAPD node image
//!
//! Sets `customImage` on Docker machine templates. Without an explicit image
//! the kind node image matching the Kubernetes version from the builtin
//! variable is used.

use tracing::debug;

use trellis_common::templates::DockerMachineTemplate;
use trellis_common::variables::{
    BUILTINS_VARIABLE_NAME, CLUSTER_CONFIG_VARIABLE_NAME, WORKER_CONFIG_VARIABLE_NAME,
};
use trellis_common::Result;

use super::{all_workers, control_plane};
use crate::handler::{Mutate, TypedMutator};
use crate::mutation::MutationContext;
use crate::objects::TemplateKind;
use crate::variables::VariableRef;

/// `clusterConfig.controlPlane.docker.customImage`
pub const CONTROL_PLANE_CUSTOM_IMAGE: VariableRef = VariableRef::new(
    CLUSTER_CONFIG_VARIABLE_NAME,
    &["controlPlane", "docker", "customImage"],
);

/// `workerConfig.docker.customImage`
pub const WORKER_CUSTOM_IMAGE: VariableRef =
    VariableRef::new(WORKER_CONFIG_VARIABLE_NAME, &["docker", "customImage"]);

/// Repository of the kind node images
pub const KIND_NODE_IMAGE_REPOSITORY: &str = "kindest/node";

const CONTROL_PLANE_VERSION: &[&str] = &["controlPlane", "version"];
const TOPOLOGY_VERSION: &[&str] = &["cluster", "topology", "version"];
const MACHINE_DEPLOYMENT_VERSION: &[&str] = &["machineDeployment", "version"];

/// Custom node image for Docker control plane and worker machine templates
pub fn mutators() -> Vec<Box<dyn Mutate>> {
    vec![
        Box::new(
            TypedMutator::new(
                "docker-custom-image-control-plane",
                CONTROL_PLANE_CUSTOM_IMAGE,
                control_plane(TemplateKind::DockerMachineTemplate),
                |image: &String, template: &mut DockerMachineTemplate, ctx| {
                    let version = first_version(ctx, &[CONTROL_PLANE_VERSION, TOPOLOGY_VERSION])?;
                    set_custom_image(image, version, template);
                    Ok(())
                },
            )
            .or_default(),
        ),
        Box::new(
            TypedMutator::new(
                "docker-custom-image-workers",
                WORKER_CUSTOM_IMAGE,
                all_workers(TemplateKind::DockerMachineTemplate),
                |image: &String, template: &mut DockerMachineTemplate, ctx| {
                    let version = first_version(ctx, &[MACHINE_DEPLOYMENT_VERSION])?;
                    set_custom_image(image, version, template);
                    Ok(())
                },
            )
            .or_default(),
        ),
    ]
}

/// First non-empty builtin version among `paths`
fn first_version(ctx: &MutationContext<'_>, paths: &[&[&str]]) -> Result<Option<String>> {
    for path in paths {
        if let Some(version) = ctx.get::<String>(BUILTINS_VARIABLE_NAME, path)? {
            if !version.is_empty() {
                return Ok(Some(version));
            }
        }
    }
    Ok(None)
}

fn set_custom_image(image: &str, version: Option<String>, template: &mut DockerMachineTemplate) {
    let image = if !image.is_empty() {
        image.to_string()
    } else if let Some(version) = version {
        format!("{KIND_NODE_IMAGE_REPOSITORY}:{version}")
    } else {
        debug!("no custom image or Kubernetes version, leaving DockerMachineTemplate unchanged");
        return;
    };
    template.spec.template.spec.custom_image = Some(image);
}
