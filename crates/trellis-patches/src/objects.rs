//! Object registry for templated request objects
//!
//! GeneratePatches items arrive as untyped JSON. The registry maps an
//! `(apiVersion, kind)` pair to a decode function producing one variant of the
//! closed [`TemplateObject`] sum type. It is built once at startup from an
//! explicit kind list and shared read-only across requests.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use trellis_common::templates::{
    AwsClusterTemplate, AwsMachineTemplate, DockerClusterTemplate, DockerMachineTemplate,
    KubeadmConfigTemplate, KubeadmControlPlaneTemplate, AWS_API_VERSION,
    CAPI_BOOTSTRAP_API_VERSION, CAPI_CONTROLPLANE_API_VERSION, DOCKER_API_VERSION,
};
use trellis_common::{Error, Result};

/// Template kinds this binary can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// KubeadmControlPlaneTemplate (controlplane.cluster.x-k8s.io)
    KubeadmControlPlaneTemplate,
    /// KubeadmConfigTemplate (bootstrap.cluster.x-k8s.io)
    KubeadmConfigTemplate,
    /// DockerMachineTemplate (infrastructure.cluster.x-k8s.io)
    DockerMachineTemplate,
    /// DockerClusterTemplate (infrastructure.cluster.x-k8s.io)
    DockerClusterTemplate,
    /// AWSMachineTemplate (infrastructure.cluster.x-k8s.io)
    AwsMachineTemplate,
    /// AWSClusterTemplate (infrastructure.cluster.x-k8s.io)
    AwsClusterTemplate,
}

/// All template kinds, in registration order
pub const ALL_TEMPLATE_KINDS: &[TemplateKind] = &[
    TemplateKind::KubeadmControlPlaneTemplate,
    TemplateKind::KubeadmConfigTemplate,
    TemplateKind::DockerMachineTemplate,
    TemplateKind::DockerClusterTemplate,
    TemplateKind::AwsMachineTemplate,
    TemplateKind::AwsClusterTemplate,
];

impl TemplateKind {
    /// API version objects of this kind are served at
    pub fn api_version(&self) -> &'static str {
        match self {
            Self::KubeadmControlPlaneTemplate => CAPI_CONTROLPLANE_API_VERSION,
            Self::KubeadmConfigTemplate => CAPI_BOOTSTRAP_API_VERSION,
            Self::DockerMachineTemplate | Self::DockerClusterTemplate => DOCKER_API_VERSION,
            Self::AwsMachineTemplate | Self::AwsClusterTemplate => AWS_API_VERSION,
        }
    }

    /// Kubernetes Kind string
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::KubeadmControlPlaneTemplate => "KubeadmControlPlaneTemplate",
            Self::KubeadmConfigTemplate => "KubeadmConfigTemplate",
            Self::DockerMachineTemplate => "DockerMachineTemplate",
            Self::DockerClusterTemplate => "DockerClusterTemplate",
            Self::AwsMachineTemplate => "AWSMachineTemplate",
            Self::AwsClusterTemplate => "AWSClusterTemplate",
        }
    }

    fn decoder(&self) -> DecodeFn {
        match self {
            Self::KubeadmControlPlaneTemplate => decode_as::<KubeadmControlPlaneTemplate>,
            Self::KubeadmConfigTemplate => decode_as::<KubeadmConfigTemplate>,
            Self::DockerMachineTemplate => decode_as::<DockerMachineTemplate>,
            Self::DockerClusterTemplate => decode_as::<DockerClusterTemplate>,
            Self::AwsMachineTemplate => decode_as::<AwsMachineTemplate>,
            Self::AwsClusterTemplate => decode_as::<AwsClusterTemplate>,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind_str())
    }
}

/// A decoded template object
#[derive(Clone, Debug, PartialEq)]
pub enum TemplateObject {
    /// KubeadmControlPlaneTemplate
    KubeadmControlPlaneTemplate(KubeadmControlPlaneTemplate),
    /// KubeadmConfigTemplate
    KubeadmConfigTemplate(KubeadmConfigTemplate),
    /// DockerMachineTemplate
    DockerMachineTemplate(DockerMachineTemplate),
    /// DockerClusterTemplate
    DockerClusterTemplate(DockerClusterTemplate),
    /// AWSMachineTemplate
    AwsMachineTemplate(AwsMachineTemplate),
    /// AWSClusterTemplate
    AwsClusterTemplate(AwsClusterTemplate),
}

impl TemplateObject {
    /// Kind of the decoded object
    pub fn kind(&self) -> TemplateKind {
        match self {
            Self::KubeadmControlPlaneTemplate(_) => TemplateKind::KubeadmControlPlaneTemplate,
            Self::KubeadmConfigTemplate(_) => TemplateKind::KubeadmConfigTemplate,
            Self::DockerMachineTemplate(_) => TemplateKind::DockerMachineTemplate,
            Self::DockerClusterTemplate(_) => TemplateKind::DockerClusterTemplate,
            Self::AwsMachineTemplate(_) => TemplateKind::AwsMachineTemplate,
            Self::AwsClusterTemplate(_) => TemplateKind::AwsClusterTemplate,
        }
    }
}

/// A Rust type that is one variant of [`TemplateObject`]
pub trait TemplateType: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The kind this type decodes
    const KIND: TemplateKind;

    /// Wrap into the sum type
    fn into_object(self) -> TemplateObject;

    /// Unwrap from the sum type, if it holds this type
    fn from_object(object: TemplateObject) -> Option<Self>;
}

macro_rules! template_type {
    ($ty:ident) => {
        impl TemplateType for $ty {
            const KIND: TemplateKind = TemplateKind::$ty;

            fn into_object(self) -> TemplateObject {
                TemplateObject::$ty(self)
            }

            fn from_object(object: TemplateObject) -> Option<Self> {
                match object {
                    TemplateObject::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

template_type!(KubeadmControlPlaneTemplate);
template_type!(KubeadmConfigTemplate);
template_type!(DockerMachineTemplate);
template_type!(DockerClusterTemplate);
template_type!(AwsMachineTemplate);
template_type!(AwsClusterTemplate);

type DecodeFn = fn(&Value) -> Result<TemplateObject>;

fn decode_as<T: TemplateType>(raw: &Value) -> Result<TemplateObject> {
    T::deserialize(raw)
        .map(T::into_object)
        .map_err(|e| Error::decode(T::KIND.kind_str(), e.to_string()))
}

/// Lookup table from `(apiVersion, kind)` to decode function
pub struct ObjectRegistry {
    decoders: HashMap<(String, String), (TemplateKind, DecodeFn)>,
}

impl ObjectRegistry {
    /// Build a registry for exactly the given kinds
    pub fn new(kinds: &[TemplateKind]) -> Self {
        let decoders = kinds
            .iter()
            .map(|kind| {
                (
                    (kind.api_version().to_string(), kind.kind_str().to_string()),
                    (*kind, kind.decoder()),
                )
            })
            .collect();
        Self { decoders }
    }

    /// Build a registry for every kind this binary knows
    pub fn with_all_kinds() -> Self {
        Self::new(ALL_TEMPLATE_KINDS)
    }

    /// Look up the registered kind for an apiVersion/kind pair
    pub fn lookup(&self, api_version: &str, kind: &str) -> Option<TemplateKind> {
        self.decoders
            .get(&(api_version.to_string(), kind.to_string()))
            .map(|(k, _)| *k)
    }

    /// Whether a template kind is registered
    pub fn contains(&self, kind: TemplateKind) -> bool {
        self.lookup(kind.api_version(), kind.kind_str()) == Some(kind)
    }

    /// Decode a raw object by its apiVersion and kind
    pub fn decode(&self, raw: &Value) -> Result<TemplateObject> {
        let api_version = raw.get("apiVersion").and_then(Value::as_str).unwrap_or_default();
        let kind = raw.get("kind").and_then(Value::as_str).unwrap_or_default();

        let (_, decode) = self
            .decoders
            .get(&(api_version.to_string(), kind.to_string()))
            .ok_or_else(|| Error::unregistered_kind(api_version, kind))?;
        decode(raw)
    }

    /// Decode a raw object that must be of type `T`
    pub fn decode_typed<T: TemplateType>(&self, raw: &Value) -> Result<T> {
        let object = self.decode(raw)?;
        let actual = object.kind();
        T::from_object(object).ok_or_else(|| {
            Error::decode(
                T::KIND.kind_str(),
                format!("object is a {}, expected {}", actual, T::KIND),
            )
        })
    }
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.decoders.values().map(|(k, _)| k.to_string()).collect();
        kinds.sort();
        f.debug_struct("ObjectRegistry").field("kinds", &kinds).finish()
    }
}
