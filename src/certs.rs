use k8s_openapi::{
    api::admissionregistration::v1::{MutatingWebhookConfiguration, ValidatingWebhookConfiguration},
    ByteString,
};
use kube::ResourceExt;
use log::{debug, warn};
use x509_certificate::X509Certificate;

use crate::{apiservice::APIService, cluster::ClusterApi, Error};

pub const SERVICE_ACCOUNT_TOKEN_TYPE: &str = "kubernetes.io/service-account-token";
pub const CLUSTER_CA_KEY: &str = "ca.crt";
pub const SERVICE_CA_KEY: &str = "service-ca.crt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustBundle {
    pub service_ca: Vec<u8>,
    pub cluster_ca: Vec<u8>,
}

/// Reads the cluster CA (and the service CA, when the platform provides one)
/// off the first service account token secret in `namespace`. Any such
/// secret will do, so listing order decides between several.
pub async fn locate_trust_bundle(
    cluster: &dyn ClusterApi,
    namespace: &str,
) -> Result<TrustBundle, Error> {
    debug!("listing secrets in {namespace} namespace");
    let secrets = cluster.list_secrets(namespace).await?;
    debug!("found {} secrets", secrets.len());

    let Some(mut token_secret) = secrets
        .into_iter()
        .find(|x| x.type_.as_deref() == Some(SERVICE_ACCOUNT_TOKEN_TYPE))
    else {
        return Err(Error::NotFound(format!(
            "no {SERVICE_ACCOUNT_TOKEN_TYPE} secrets found in {namespace}"
        )));
    };
    let name = token_secret.name_any();
    let mut data = token_secret.data.take().unwrap_or_default();

    let cluster_ca = data
        .remove(CLUSTER_CA_KEY)
        .ok_or_else(|| Error::MissingKey {
            secret: name.clone(),
            key: CLUSTER_CA_KEY.to_string(),
        })?
        .0;
    log_ca("cluster", &cluster_ca);

    let service_ca = match data.remove(SERVICE_CA_KEY) {
        Some(x) => x.0,
        None => {
            warn!(
                "secret {name} did not contain key {SERVICE_CA_KEY}, \
                 likely not running on a managed platform, using {CLUSTER_CA_KEY} instead"
            );
            cluster_ca.clone()
        }
    };
    log_ca("service", &service_ca);

    Ok(TrustBundle {
        service_ca,
        cluster_ca,
    })
}

fn log_ca(role: &str, pem: &[u8]) {
    match X509Certificate::from_pem_multiple(pem) {
        Ok(certs) if !certs.is_empty() => {
            for cert in certs {
                debug!(
                    "found {role} CA: {}",
                    cert.subject_common_name().unwrap_or_default()
                );
            }
        }
        Ok(_) => warn!("{role} CA bundle contains no certificates"),
        Err(e) => warn!("{role} CA bundle could not be parsed: {e}"),
    }
}

/// Service CA goes to the aggregated API service, cluster CA to every webhook.
pub fn inject_certs(
    api_service: &mut APIService,
    validating_webhooks: &mut [ValidatingWebhookConfiguration],
    mutating_webhooks: &mut [MutatingWebhookConfiguration],
    bundle: &TrustBundle,
) {
    api_service.spec.ca_bundle = Some(ByteString(bundle.service_ca.clone()));

    for webhook in validating_webhooks
        .iter_mut()
        .flat_map(|x| x.webhooks.iter_mut().flatten())
    {
        webhook.client_config.ca_bundle = Some(ByteString(bundle.cluster_ca.clone()));
    }
    for webhook in mutating_webhooks
        .iter_mut()
        .flat_map(|x| x.webhooks.iter_mut().flatten())
    {
        webhook.client_config.ca_bundle = Some(ByteString(bundle.cluster_ca.clone()));
    }
}
