//! CAPA region and instance types

use trellis_common::templates::{AwsClusterTemplate, AwsMachineTemplate};
use trellis_common::variables::{CLUSTER_CONFIG_VARIABLE_NAME, WORKER_CONFIG_VARIABLE_NAME};
use trellis_common::{Error, Result};

use super::{all_workers, control_plane, infrastructure_cluster};
use crate::handler::{Mutate, TypedMutator};
use crate::objects::TemplateKind;
use crate::variables::VariableRef;

/// `clusterConfig.aws.region`
pub const REGION: VariableRef = VariableRef::new(CLUSTER_CONFIG_VARIABLE_NAME, &["aws", "region"]);

/// `clusterConfig.controlPlane.aws.instanceType`
pub const CONTROL_PLANE_INSTANCE_TYPE: VariableRef = VariableRef::new(
    CLUSTER_CONFIG_VARIABLE_NAME,
    &["controlPlane", "aws", "instanceType"],
);

/// `workerConfig.aws.instanceType`
pub const WORKER_INSTANCE_TYPE: VariableRef =
    VariableRef::new(WORKER_CONFIG_VARIABLE_NAME, &["aws", "instanceType"]);

/// AWS region on the cluster template and instance types on machine templates
pub fn mutators() -> Vec<Box<dyn Mutate>> {
    vec![
        Box::new(TypedMutator::new(
            "aws-region",
            REGION,
            infrastructure_cluster(TemplateKind::AwsClusterTemplate),
            |region: &String, template: &mut AwsClusterTemplate, _ctx| {
                template.spec.template.spec.region = Some(region.clone());
                Ok(())
            },
        )),
        Box::new(TypedMutator::new(
            "aws-instance-type-control-plane",
            CONTROL_PLANE_INSTANCE_TYPE,
            control_plane(TemplateKind::AwsMachineTemplate),
            |instance_type: &String, template: &mut AwsMachineTemplate, _ctx| {
                set_instance_type("aws-instance-type-control-plane", instance_type, template)
            },
        )),
        Box::new(TypedMutator::new(
            "aws-instance-type-workers",
            WORKER_INSTANCE_TYPE,
            all_workers(TemplateKind::AwsMachineTemplate),
            |instance_type: &String, template: &mut AwsMachineTemplate, _ctx| {
                set_instance_type("aws-instance-type-workers", instance_type, template)
            },
        )),
    ]
}

fn set_instance_type(
    handler: &str,
    instance_type: &str,
    template: &mut AwsMachineTemplate,
) -> Result<()> {
    if instance_type.is_empty() {
        return Err(Error::mutation(handler, "instanceType must not be empty"));
    }
    template.spec.template.spec.instance_type = instance_type.to_string();
    Ok(())
}
