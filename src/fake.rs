//! In-memory `ClusterApi` used by the unit tests.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use k8s_openapi::{
    api::core::v1::Secret,
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
    apimachinery::pkg::apis::meta::v1::OwnerReference, ByteString,
};
use kube::{core::ObjectMeta, error::ErrorResponse};

use crate::{
    apply::{ApplyOutcome, ManagedObject},
    cluster::ClusterApi,
    environment::{CLUSTER_VERSION_CRD_NAME, MANAGED_PLATFORM_API_GROUP},
    Error,
};

pub fn api_error(code: u16) -> Error {
    Error::KubeError {
        source: kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("simulated failure {code}"),
            reason: "Simulated".to_string(),
            code,
        }),
    }
}

pub fn secret(name: &str, type_: &str, data: &[(&str, &[u8])]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("hive".to_string()),
            ..Default::default()
        },
        type_: Some(type_.to_string()),
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.to_vec())))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakeCluster {
    pub crds: HashSet<String>,
    pub api_groups: HashSet<String>,
    pub secrets: Vec<Secret>,
    pub crd_error: Option<u16>,
    pub api_group_error: Option<u16>,
    pub get_secret_error: Option<u16>,
    pub list_secrets_error: Option<u16>,
    pub fail_apply_of: Option<String>,
    pub applied: Mutex<Vec<ManagedObject>>,
    /// Owner passed with each entry of `applied`, same order.
    pub owners: Mutex<Vec<OwnerReference>>,
    pub secret_lists: AtomicUsize,
}

impl FakeCluster {
    /// A vanilla cluster: no platform API groups, no cluster version CRD.
    pub fn unmanaged() -> Self {
        FakeCluster::default()
    }

    pub fn managed_current() -> Self {
        let mut cluster = FakeCluster::default();
        cluster.crds.insert(CLUSTER_VERSION_CRD_NAME.to_string());
        cluster
            .api_groups
            .insert(MANAGED_PLATFORM_API_GROUP.to_string());
        cluster
    }

    pub fn managed_legacy() -> Self {
        let mut cluster = FakeCluster::default();
        cluster
            .api_groups
            .insert(MANAGED_PLATFORM_API_GROUP.to_string());
        cluster
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets.push(secret);
        self
    }

    pub fn applied(&self) -> Vec<ManagedObject> {
        self.applied.lock().unwrap().clone()
    }

    pub fn applied_owners(&self) -> Vec<OwnerReference> {
        self.owners.lock().unwrap().clone()
    }

    pub fn secret_lists(&self) -> usize {
        self.secret_lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get_crd(&self, name: &str) -> Result<Option<CustomResourceDefinition>, Error> {
        if let Some(code) = self.crd_error {
            return Err(api_error(code));
        }
        Ok(self.crds.contains(name).then(|| CustomResourceDefinition {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }))
    }

    async fn has_api_group(&self, group: &str) -> Result<bool, Error> {
        if let Some(code) = self.api_group_error {
            return Err(api_error(code));
        }
        Ok(self.api_groups.contains(group))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        if let Some(code) = self.get_secret_error {
            return Err(api_error(code));
        }
        Ok(self
            .secrets
            .iter()
            .find(|x| {
                x.metadata.namespace.as_deref() == Some(namespace)
                    && x.metadata.name.as_deref() == Some(name)
            })
            .cloned())
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, Error> {
        self.secret_lists.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.list_secrets_error {
            return Err(api_error(code));
        }
        Ok(self
            .secrets
            .iter()
            .filter(|x| x.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn apply(
        &self,
        object: ManagedObject,
        owner: &OwnerReference,
    ) -> Result<ApplyOutcome, Error> {
        if self.fail_apply_of.as_deref() == Some(object.name().as_str()) {
            return Err(api_error(500));
        }
        let mut applied = self.applied.lock().unwrap();
        let outcome = if applied.contains(&object) {
            ApplyOutcome::Unchanged
        } else if applied
            .iter()
            .any(|x| x.kind() == object.kind() && x.name() == object.name())
        {
            ApplyOutcome::Updated
        } else {
            ApplyOutcome::Created
        };
        applied.push(object);
        self.owners.lock().unwrap().push(owner.clone());
        Ok(outcome)
    }
}
