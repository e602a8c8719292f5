use async_trait::async_trait;
use k8s_openapi::{
    api::core::v1::Secret,
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use kube::{api::ListParams, Api, Client};

use crate::{
    apply::{apply_with_owner, ApplyOutcome, ManagedObject},
    Error,
};

/// The slice of the Kubernetes API the admission rollout talks to. Lookups
/// that find nothing return `Ok(None)`.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get_crd(&self, name: &str) -> Result<Option<CustomResourceDefinition>, Error>;

    async fn has_api_group(&self, group: &str) -> Result<bool, Error>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, Error>;

    async fn apply(
        &self,
        object: ManagedObject,
        owner: &OwnerReference,
    ) -> Result<ApplyOutcome, Error>;
}

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        KubeCluster { client }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn get_crd(&self, name: &str) -> Result<Option<CustomResourceDefinition>, Error> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn has_api_group(&self, group: &str) -> Result<bool, Error> {
        let groups = self.client.list_api_groups().await?;
        Ok(groups.groups.iter().any(|x| x.name == group))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn apply(
        &self,
        object: ManagedObject,
        owner: &OwnerReference,
    ) -> Result<ApplyOutcome, Error> {
        let client = self.client.clone();
        match object {
            ManagedObject::Deployment(x) => {
                let ns = namespace_of(&x.metadata.namespace)?;
                apply_with_owner(Api::namespaced(client, &ns), x, owner).await
            }
            ManagedObject::Service(x) => {
                let ns = namespace_of(&x.metadata.namespace)?;
                apply_with_owner(Api::namespaced(client, &ns), x, owner).await
            }
            ManagedObject::ServiceAccount(x) => {
                let ns = namespace_of(&x.metadata.namespace)?;
                apply_with_owner(Api::namespaced(client, &ns), x, owner).await
            }
            ManagedObject::APIService(x) => apply_with_owner(Api::all(client), x, owner).await,
            ManagedObject::ValidatingWebhook(x) => {
                apply_with_owner(Api::all(client), x, owner).await
            }
            ManagedObject::MutatingWebhook(x) => apply_with_owner(Api::all(client), x, owner).await,
            ManagedObject::ClusterRole(x) => apply_with_owner(Api::all(client), x, owner).await,
            ManagedObject::ClusterRoleBinding(x) => {
                apply_with_owner(Api::all(client), x, owner).await
            }
        }
    }
}

fn namespace_of(namespace: &Option<String>) -> Result<String, Error> {
    namespace
        .clone()
        .ok_or_else(|| Error::Asset("namespaced object has no namespace".to_string()))
}
