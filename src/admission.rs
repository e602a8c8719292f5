use k8s_openapi::{
    api::{
        admissionregistration::v1::{MutatingWebhookConfiguration, ValidatingWebhookConfiguration},
        apps::v1::Deployment,
        core::v1::{ConfigMapVolumeSource, EnvVar, Volume, VolumeMount},
    },
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use log::{debug, error, info, warn};

use crate::{
    annotate::{
        set_pod_template_annotation, stamp_serving_cert_fingerprint,
        AGGREGATOR_CLIENT_CA_HASH_ANNOTATION,
    },
    apiservice::APIService,
    apply::ManagedObject,
    assets::{
        load_asset, load_object, validating_webhook_assets, APISERVICE_ASSET, DEPLOYMENT_ASSET,
        RBAC_ROLE_ASSET, RBAC_ROLE_BINDING_ASSET, SERVICE_ACCOUNT_ASSET, SERVICE_ASSET,
    },
    certs::{inject_certs, locate_trust_bundle},
    cluster::ClusterApi,
    config::OperatorConfig,
    environment::Environment,
    Error,
};

pub const SERVING_CERT_SECRET_NAME: &str = "hiveadmission-serving-cert";

pub const MANAGED_DOMAINS_VOLUME: &str = "managed-domains";
pub const MANAGED_DOMAINS_MOUNT_PATH: &str = "/data/config/managed-domains";
pub const MANAGED_DOMAINS_FILE_ENV_VAR: &str = "MANAGED_DOMAINS_FILE";
const MANAGED_DOMAINS_FILE: &str = "domains.yaml";

/// Applied ahead of the deployment, namespaced ones moved to the target namespace.
const SUPPORTING_ASSETS: &[&str] = &[
    SERVICE_ASSET,
    SERVICE_ACCOUNT_ASSET,
    RBAC_ROLE_ASSET,
    RBAC_ROLE_BINDING_ASSET,
];

// The admission server registers no mutating webhooks yet.
const MUTATING_WEBHOOK_ASSETS: &[&str] = &[];

/// The objects whose trust configuration the rollout manages, rebuilt from
/// templates on every pass.
#[derive(Debug, Clone)]
pub struct AdmissionObjects {
    pub deployment: Deployment,
    pub api_service: APIService,
    pub validating_webhooks: Vec<ValidatingWebhookConfiguration>,
    pub mutating_webhooks: Vec<MutatingWebhookConfiguration>,
}

impl AdmissionObjects {
    pub fn load(namespace: &str) -> Result<Self, Error> {
        debug!("reading deployment");
        let mut deployment: Deployment = load_asset(DEPLOYMENT_ASSET)?;
        deployment.metadata.namespace = Some(namespace.to_string());

        debug!("reading apiservice");
        let mut api_service: APIService = load_asset(APISERVICE_ASSET)?;
        if let Some(service) = api_service.spec.service.as_mut() {
            service.namespace = Some(namespace.to_string());
        }

        let validating_webhooks = validating_webhook_assets()
            .map(load_asset)
            .collect::<Result<Vec<_>, _>>()?;
        let mutating_webhooks = MUTATING_WEBHOOK_ASSETS
            .iter()
            .map(|x| load_asset(x))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AdmissionObjects {
            deployment,
            api_service,
            validating_webhooks,
            mutating_webhooks,
        })
    }

    pub fn apply_image_overrides(&mut self, config: &OperatorConfig) {
        if config.image.is_none() && config.image_pull_policy.is_none() {
            return;
        }
        let Some(container) = self
            .deployment
            .spec
            .as_mut()
            .and_then(|x| x.template.spec.as_mut())
            .and_then(|x| x.containers.first_mut())
        else {
            warn!("hiveadmission deployment has no containers, skipping image overrides");
            return;
        };
        if let Some(image) = &config.image {
            container.image = Some(image.clone());
        }
        if let Some(policy) = &config.image_pull_policy {
            container.image_pull_policy = Some(policy.clone());
        }
    }

    /// Mounts the managed domains ConfigMap into the admission container and
    /// points it at the domains file. Entries are replaced by name, never
    /// duplicated.
    pub fn add_managed_domains_volume(&mut self, config_map: &str) {
        let Some(pod) = self
            .deployment
            .spec
            .as_mut()
            .and_then(|x| x.template.spec.as_mut())
        else {
            warn!("hiveadmission deployment has no pod spec, skipping managed domains volume");
            return;
        };

        upsert_by_name(
            pod.volumes.get_or_insert_with(Default::default),
            Volume {
                name: MANAGED_DOMAINS_VOLUME.to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: Some(config_map.to_string()),
                    optional: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            },
            |x| &x.name,
        );

        let Some(container) = pod.containers.first_mut() else {
            warn!("hiveadmission deployment has no containers, skipping managed domains mount");
            return;
        };
        upsert_by_name(
            container.volume_mounts.get_or_insert_with(Default::default),
            VolumeMount {
                name: MANAGED_DOMAINS_VOLUME.to_string(),
                mount_path: MANAGED_DOMAINS_MOUNT_PATH.to_string(),
                ..Default::default()
            },
            |x| &x.name,
        );
        upsert_by_name(
            container.env.get_or_insert_with(Default::default),
            EnvVar {
                name: MANAGED_DOMAINS_FILE_ENV_VAR.to_string(),
                value: Some(format!("{MANAGED_DOMAINS_MOUNT_PATH}/{MANAGED_DOMAINS_FILE}")),
                ..Default::default()
            },
            |x| &x.name,
        );
    }

    /// Written to both the deployment and its pod template; the latter rolls
    /// the pods when the aggregator client CA changes.
    pub fn set_aggregator_client_ca_hash(&mut self, hash: &str) {
        self.deployment
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(
                AGGREGATOR_CLIENT_CA_HASH_ANNOTATION.to_string(),
                hash.to_string(),
            );
        set_pod_template_annotation(
            &mut self.deployment,
            AGGREGATOR_CLIENT_CA_HASH_ANNOTATION,
            hash.to_string(),
        );
    }

    /// Deployment, then API service, then every webhook configuration.
    pub fn into_apply_order(self) -> Vec<ManagedObject> {
        let mut out = vec![
            ManagedObject::Deployment(self.deployment),
            ManagedObject::APIService(self.api_service),
        ];
        out.extend(
            self.validating_webhooks
                .into_iter()
                .map(ManagedObject::ValidatingWebhook),
        );
        out.extend(
            self.mutating_webhooks
                .into_iter()
                .map(ManagedObject::MutatingWebhook),
        );
        out
    }
}

fn upsert_by_name<T>(items: &mut Vec<T>, item: T, name: impl Fn(&T) -> &String) {
    match items.iter().position(|x| name(x) == name(&item)) {
        Some(i) => items[i] = item,
        None => items.push(item),
    }
}

/// Rolls out the admission subsystem into `namespace`. Objects are applied in
/// a fixed order and the first failure aborts the pass; whatever was applied
/// before it stays, and the next pass converges.
pub async fn deploy_admission(
    cluster: &dyn ClusterApi,
    config: &OperatorConfig,
    namespace: &str,
    aggregator_client_ca_hash: &str,
    managed_domains_config_map: &str,
    owner: &OwnerReference,
) -> Result<(), Error> {
    for path in SUPPORTING_ASSETS {
        let object = load_object(path)?.with_namespace(namespace);
        apply_object(cluster, object, owner).await?;
    }

    let mut objects = AdmissionObjects::load(namespace)?;
    objects.apply_image_overrides(config);
    objects.set_aggregator_client_ca_hash(aggregator_client_ca_hash);
    objects.add_managed_domains_volume(managed_domains_config_map);

    let environment = match Environment::probe(cluster).await {
        Ok(x) => x,
        Err(e) => {
            error!("error detecting cluster capabilities: {e}");
            return Err(e);
        }
    };
    info!("detected {} cluster", environment.effective_tier());

    if environment.injection_required() {
        debug!("cluster lacks service CA injection, modifying hiveadmission webhooks for CA certs");
        let bundle = match locate_trust_bundle(cluster, namespace).await {
            Ok(x) => x,
            Err(e) => {
                error!("error injecting certs: {e}");
                return Err(e);
            }
        };
        inject_certs(
            &mut objects.api_service,
            &mut objects.validating_webhooks,
            &mut objects.mutating_webhooks,
            &bundle,
        );
    }

    if let Err(e) = stamp_serving_cert_fingerprint(
        cluster,
        &mut objects.deployment,
        namespace,
        SERVING_CERT_SECRET_NAME,
    )
    .await
    {
        warn!("error getting serving cert secret {SERVING_CERT_SECRET_NAME}: {e}");
    }

    for object in objects.into_apply_order() {
        apply_object(cluster, object, owner).await?;
    }

    info!("hiveadmission components reconciled successfully");
    Ok(())
}

async fn apply_object(
    cluster: &dyn ClusterApi,
    object: ManagedObject,
    owner: &OwnerReference,
) -> Result<(), Error> {
    let kind = object.kind();
    let name = object.name();
    match cluster.apply(object, owner).await {
        Ok(outcome) => {
            info!("{kind} {name} applied ({outcome})");
            Ok(())
        }
        Err(e) => {
            error!("error applying {kind} {name}: {e}");
            Err(e)
        }
    }
}
