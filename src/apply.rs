use std::fmt::{self, Debug, Display};

use k8s_openapi::{
    api::{
        admissionregistration::v1::{MutatingWebhookConfiguration, ValidatingWebhookConfiguration},
        apps::v1::Deployment,
        core::v1::{Service, ServiceAccount},
        rbac::v1::{ClusterRole, ClusterRoleBinding},
    },
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use kube::{
    api::{Patch, PatchParams},
    Api, Resource, ResourceExt,
};
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{apiservice::APIService, Error};

pub const FIELD_MANAGER: &str = "hive-operator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

impl Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyOutcome::Created => "created",
            ApplyOutcome::Updated => "updated",
            ApplyOutcome::Unchanged => "unchanged",
        })
    }
}

/// Every kind of object the admission rollout writes to the cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedObject {
    Deployment(Deployment),
    APIService(APIService),
    ValidatingWebhook(ValidatingWebhookConfiguration),
    MutatingWebhook(MutatingWebhookConfiguration),
    Service(Service),
    ServiceAccount(ServiceAccount),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
}

impl ManagedObject {
    /// Decodes a manifest by its `kind` field.
    pub fn decode(manifest: Value) -> Result<Self, Error> {
        let kind = manifest
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Asset("manifest is missing kind".to_string()))?
            .to_string();
        Ok(match kind.as_str() {
            "Deployment" => ManagedObject::Deployment(serde_json::from_value(manifest)?),
            "APIService" => ManagedObject::APIService(serde_json::from_value(manifest)?),
            "ValidatingWebhookConfiguration" => {
                ManagedObject::ValidatingWebhook(serde_json::from_value(manifest)?)
            }
            "MutatingWebhookConfiguration" => {
                ManagedObject::MutatingWebhook(serde_json::from_value(manifest)?)
            }
            "Service" => ManagedObject::Service(serde_json::from_value(manifest)?),
            "ServiceAccount" => ManagedObject::ServiceAccount(serde_json::from_value(manifest)?),
            "ClusterRole" => ManagedObject::ClusterRole(serde_json::from_value(manifest)?),
            "ClusterRoleBinding" => {
                ManagedObject::ClusterRoleBinding(serde_json::from_value(manifest)?)
            }
            other => return Err(Error::Asset(format!("unsupported manifest kind {other}"))),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ManagedObject::Deployment(_) => "Deployment",
            ManagedObject::APIService(_) => "APIService",
            ManagedObject::ValidatingWebhook(_) => "ValidatingWebhookConfiguration",
            ManagedObject::MutatingWebhook(_) => "MutatingWebhookConfiguration",
            ManagedObject::Service(_) => "Service",
            ManagedObject::ServiceAccount(_) => "ServiceAccount",
            ManagedObject::ClusterRole(_) => "ClusterRole",
            ManagedObject::ClusterRoleBinding(_) => "ClusterRoleBinding",
        }
    }

    pub fn name(&self) -> String {
        match self {
            ManagedObject::Deployment(x) => x.name_any(),
            ManagedObject::APIService(x) => x.name_any(),
            ManagedObject::ValidatingWebhook(x) => x.name_any(),
            ManagedObject::MutatingWebhook(x) => x.name_any(),
            ManagedObject::Service(x) => x.name_any(),
            ManagedObject::ServiceAccount(x) => x.name_any(),
            ManagedObject::ClusterRole(x) => x.name_any(),
            ManagedObject::ClusterRoleBinding(x) => x.name_any(),
        }
    }

    /// Moves namespaced objects into `namespace`. Cluster-scoped objects are
    /// left alone, except that service account subjects of a binding follow
    /// the namespace.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        match &mut self {
            ManagedObject::Deployment(x) => x.metadata.namespace = Some(namespace.to_string()),
            ManagedObject::Service(x) => x.metadata.namespace = Some(namespace.to_string()),
            ManagedObject::ServiceAccount(x) => {
                x.metadata.namespace = Some(namespace.to_string())
            }
            ManagedObject::ClusterRoleBinding(x) => {
                for subject in x.subjects.iter_mut().flatten() {
                    if subject.kind == "ServiceAccount" {
                        subject.namespace = Some(namespace.to_string());
                    }
                }
            }
            ManagedObject::APIService(_)
            | ManagedObject::ValidatingWebhook(_)
            | ManagedObject::MutatingWebhook(_)
            | ManagedObject::ClusterRole(_) => {}
        }
        self
    }
}

/// Server-side applies `obj` with `owner` as its controller so that deleting
/// the owner garbage collects it.
pub async fn apply_with_owner<K>(
    api: Api<K>,
    mut obj: K,
    owner: &OwnerReference,
) -> Result<ApplyOutcome, Error>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    let name = obj.name_any();
    obj.meta_mut().owner_references = Some(vec![owner.clone()]);
    obj.meta_mut().resource_version = None;
    obj.meta_mut().managed_fields = None;

    let current = api.get_opt(&name).await?;
    let applied = api
        .patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&obj),
        )
        .await?;
    debug!(
        "applied {name} at resource version {:?}",
        applied.meta().resource_version
    );

    Ok(match current {
        None => ApplyOutcome::Created,
        Some(current) if current.meta().resource_version == applied.meta().resource_version => {
            ApplyOutcome::Unchanged
        }
        Some(_) => ApplyOutcome::Updated,
    })
}
