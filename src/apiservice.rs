use k8s_openapi::ByteString;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Where the aggregator forwards requests for the registered group/version.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct APIServiceReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

/// `apiregistration.k8s.io/v1` APIService. k8s-openapi does not carry the
/// kube-aggregator types, so only the fields the operator manages are modeled.
#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "apiregistration.k8s.io",
    version = "v1",
    kind = "APIService",
    plural = "apiservices",
    derive = "PartialEq",
    schema = "disabled"
)]
pub struct APIServiceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub group_priority_minimum: i32,
    pub version_priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<APIServiceReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<ByteString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,
}
