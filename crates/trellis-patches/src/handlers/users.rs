//! Node users

use trellis_common::templates::{
    KubeadmConfigSpec, KubeadmConfigTemplate, KubeadmControlPlaneTemplate, KubeadmUser,
};
use trellis_common::variables::{User, CLUSTER_CONFIG_VARIABLE_NAME};
use trellis_common::{Error, Result};

use super::{all_workers, control_plane};
use crate::handler::{Mutate, TypedMutator};
use crate::objects::TemplateKind;
use crate::variables::VariableRef;

/// `clusterConfig.users`
pub const USERS: VariableRef = VariableRef::new(CLUSTER_CONFIG_VARIABLE_NAME, &["users"]);

/// OS users on control plane and worker nodes
pub fn mutators() -> Vec<Box<dyn Mutate>> {
    vec![
        Box::new(TypedMutator::new(
            "users",
            USERS,
            control_plane(TemplateKind::KubeadmControlPlaneTemplate),
            |users: &Vec<User>, kcpt: &mut KubeadmControlPlaneTemplate, _ctx| {
                configure(users, &mut kcpt.spec.template.spec.kubeadm_config_spec)
            },
        )),
        Box::new(TypedMutator::new(
            "users-workers",
            USERS,
            all_workers(TemplateKind::KubeadmConfigTemplate),
            |users: &Vec<User>, kct: &mut KubeadmConfigTemplate, _ctx| {
                configure(users, &mut kct.spec.template.spec)
            },
        )),
    ]
}

fn configure(users: &[User], spec: &mut KubeadmConfigSpec) -> Result<()> {
    for user in users {
        if user.name.is_empty() {
            return Err(Error::mutation("users", "user name must not be empty"));
        }
        let desired = to_kubeadm_user(user);
        match spec.users.iter_mut().find(|u| u.name == user.name) {
            Some(existing) => *existing = desired,
            None => spec.users.push(desired),
        }
    }
    Ok(())
}

/// A user without a password gets a locked password
fn to_kubeadm_user(user: &User) -> KubeadmUser {
    KubeadmUser {
        name: user.name.clone(),
        passwd: user.hashed_password.clone(),
        lock_password: Some(user.hashed_password.is_none()),
        ssh_authorized_keys: user.ssh_authorized_keys.clone(),
        sudo: user.sudo.clone(),
    }
}
