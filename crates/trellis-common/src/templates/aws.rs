//! CAPA (AWS) infrastructure templates

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// `infrastructure.cluster.x-k8s.io` AWSMachineTemplate
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsMachineTemplate {
    /// API version
    pub api_version: String,
    /// Always "AWSMachineTemplate"
    pub kind: String,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Template spec
    #[serde(default)]
    pub spec: AwsMachineTemplateSpec,
}

/// AWSMachineTemplate `.spec`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsMachineTemplateSpec {
    /// Template resource
    #[serde(default)]
    pub template: AwsMachineTemplateResource,
}

/// AWSMachineTemplate `.spec.template`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsMachineTemplateResource {
    /// Machine spec
    #[serde(default)]
    pub spec: AwsMachineSpec,
}

/// AWSMachine spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsMachineSpec {
    /// EC2 instance type
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_type: String,

    /// IAM instance profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_instance_profile: Option<String>,

    /// SSH key pair name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_name: Option<String>,
}

/// `infrastructure.cluster.x-k8s.io` AWSClusterTemplate
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsClusterTemplate {
    /// API version
    pub api_version: String,
    /// Always "AWSClusterTemplate"
    pub kind: String,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Template spec
    #[serde(default)]
    pub spec: AwsClusterTemplateSpec,
}

/// AWSClusterTemplate `.spec`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsClusterTemplateSpec {
    /// Template resource
    #[serde(default)]
    pub template: AwsClusterTemplateResource,
}

/// AWSClusterTemplate `.spec.template`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsClusterTemplateResource {
    /// Cluster spec
    #[serde(default)]
    pub spec: AwsClusterSpec,
}

/// AWSCluster spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsClusterSpec {
    /// AWS region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Default SSH key pair name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_name: Option<String>,
}
