use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use log::info;

use crate::{cluster::ClusterApi, fingerprint::fingerprint, Error};

pub const AGGREGATOR_CLIENT_CA_HASH_ANNOTATION: &str = "hive.openshift.io/ca-hash";
pub const SERVING_CERT_SECRET_HASH_ANNOTATION: &str = "hive.openshift.io/serving-cert-secret-hash";

/// Sets `key` on the deployment's pod template, creating the template
/// metadata if the manifest left it out.
pub fn set_pod_template_annotation(deployment: &mut Deployment, key: &str, value: String) {
    deployment
        .spec
        .get_or_insert_with(Default::default)
        .template
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(Default::default)
        .insert(key.to_string(), value);
}

#[cfg(test)]
pub fn pod_template_annotation<'a>(deployment: &'a Deployment, key: &str) -> Option<&'a str> {
    deployment
        .spec
        .as_ref()?
        .template
        .metadata
        .as_ref()?
        .annotations
        .as_ref()?
        .get(key)
        .map(|x| &**x)
}

/// Stamps the fingerprint of the serving cert secret onto the pod template so
/// a changed certificate rolls the pods.
///
/// The secret may not exist yet while the issuer catches up; that case
/// stamps the fingerprint of empty data and succeeds. Any other lookup error
/// also stamps the empty fingerprint, then is returned for the caller to log.
pub async fn stamp_serving_cert_fingerprint(
    cluster: &dyn ClusterApi,
    deployment: &mut Deployment,
    namespace: &str,
    secret_name: &str,
) -> Result<(), Error> {
    let (data, lookup) = match cluster.get_secret(namespace, secret_name).await {
        Ok(Some(secret)) => (secret.data.unwrap_or_default(), Ok(())),
        Ok(None) => {
            info!("serving cert secret {namespace}/{secret_name} not found, hashing empty data");
            (BTreeMap::new(), Ok(()))
        }
        Err(e) => (BTreeMap::new(), Err(e)),
    };

    info!("hashing serving cert secret onto a hiveadmission deployment annotation");
    set_pod_template_annotation(
        deployment,
        SERVING_CERT_SECRET_HASH_ANNOTATION,
        fingerprint(&data),
    );
    lookup
}
