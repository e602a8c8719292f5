//! Manifest templates for the admission subsystem, addressed by path. They
//! carry the `hive` namespace; callers rewrite it to the target namespace.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::{apply::ManagedObject, Error};

pub const DEPLOYMENT_ASSET: &str = "hiveadmission/deployment";
pub const APISERVICE_ASSET: &str = "hiveadmission/apiservice";
pub const SERVICE_ASSET: &str = "hiveadmission/service";
pub const SERVICE_ACCOUNT_ASSET: &str = "hiveadmission/service-account";
pub const RBAC_ROLE_ASSET: &str = "hiveadmission/rbac-role";
pub const RBAC_ROLE_BINDING_ASSET: &str = "hiveadmission/rbac-role-binding";

/// (asset path, validated resource plural)
const WEBHOOK_RESOURCES: &[(&str, &str)] = &[
    ("hiveadmission/clusterdeployment-webhook", "clusterdeployments"),
    ("hiveadmission/clusterimageset-webhook", "clusterimagesets"),
    ("hiveadmission/clusterprovision-webhook", "clusterprovisions"),
    ("hiveadmission/dnszones-webhook", "dnszones"),
    ("hiveadmission/machinepool-webhook", "machinepools"),
    ("hiveadmission/syncset-webhook", "syncsets"),
    ("hiveadmission/selectorsyncset-webhook", "selectorsyncsets"),
];

pub const ADMISSION_GROUP: &str = "admission.hive.openshift.io";
const TEMPLATE_NAMESPACE: &str = "hive";

pub fn validating_webhook_assets() -> impl Iterator<Item = &'static str> {
    WEBHOOK_RESOURCES.iter().map(|(path, _)| *path)
}

/// Decodes the template at `path` into `T`.
pub fn load_asset<T: DeserializeOwned>(path: &str) -> Result<T, Error> {
    let manifest = template(path)?;
    serde_json::from_value(manifest)
        .map_err(|e| Error::Asset(format!("failed to decode {path}: {e}")))
}

/// Decodes the template at `path` into whichever object its `kind` names.
pub fn load_object(path: &str) -> Result<ManagedObject, Error> {
    ManagedObject::decode(template(path)?)
        .map_err(|e| Error::Asset(format!("failed to decode {path}: {e}")))
}

fn template(path: &str) -> Result<Value, Error> {
    Ok(match path {
        DEPLOYMENT_ASSET => deployment(),
        APISERVICE_ASSET => apiservice(),
        SERVICE_ASSET => service(),
        SERVICE_ACCOUNT_ASSET => service_account(),
        RBAC_ROLE_ASSET => rbac_role(),
        RBAC_ROLE_BINDING_ASSET => rbac_role_binding(),
        _ => {
            let Some((_, resource)) = WEBHOOK_RESOURCES.iter().find(|(x, _)| *x == path) else {
                return Err(Error::Asset(format!("no such asset: {path}")));
            };
            validating_webhook(resource)
        }
    })
}

fn deployment() -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": "hiveadmission",
            "namespace": TEMPLATE_NAMESPACE,
            "labels": {
                "app": "hiveadmission",
            },
        },
        "spec": {
            "replicas": 2,
            "revisionHistoryLimit": 4,
            "selector": {
                "matchLabels": {
                    "app": "hiveadmission",
                    "hiveadmission": "true",
                },
            },
            "template": {
                "metadata": {
                    "name": "hiveadmission",
                    "labels": {
                        "app": "hiveadmission",
                        "hiveadmission": "true",
                    },
                },
                "spec": {
                    "serviceAccountName": "hiveadmission",
                    "containers": [{
                        "name": "hiveadmission",
                        "image": "registry.ci.openshift.org/openshift/hive-v4.0:hive",
                        "imagePullPolicy": "Always",
                        "command": ["/opt/services/hiveadmission"],
                        "args": [
                            "--secure-port=9443",
                            "--audit-log-path=-",
                            "--tls-cert-file=/var/serving-cert/tls.crt",
                            "--tls-private-key-file=/var/serving-cert/tls.key",
                            "--v=2",
                        ],
                        "ports": [{
                            "containerPort": 9443,
                            "protocol": "TCP",
                        }],
                        "volumeMounts": [{
                            "name": "serving-cert",
                            "mountPath": "/var/serving-cert",
                        }],
                        "readinessProbe": {
                            "httpGet": {
                                "path": "/healthz",
                                "port": 9443,
                                "scheme": "HTTPS",
                            },
                        },
                    }],
                    "volumes": [{
                        "name": "serving-cert",
                        "secret": {
                            "defaultMode": 420,
                            "secretName": "hiveadmission-serving-cert",
                        },
                    }],
                },
            },
        },
    })
}

fn apiservice() -> Value {
    json!({
        "apiVersion": "apiregistration.k8s.io/v1",
        "kind": "APIService",
        "metadata": {
            "name": format!("v1.{ADMISSION_GROUP}"),
            "annotations": {
                "service.alpha.openshift.io/inject-cabundle": "true",
            },
        },
        "spec": {
            "group": ADMISSION_GROUP,
            "groupPriorityMinimum": 1000,
            "versionPriority": 15,
            "service": {
                "name": "hiveadmission",
                "namespace": TEMPLATE_NAMESPACE,
            },
            "version": "v1",
        },
    })
}

fn service() -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": "hiveadmission",
            "namespace": TEMPLATE_NAMESPACE,
            "annotations": {
                "service.alpha.openshift.io/serving-cert-secret-name": "hiveadmission-serving-cert",
            },
        },
        "spec": {
            "selector": {
                "hiveadmission": "true",
            },
            "ports": [{
                "name": "hiveadmission",
                "port": 443,
                "targetPort": 9443,
                "protocol": "TCP",
            }],
        },
    })
}

fn service_account() -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ServiceAccount",
        "metadata": {
            "name": "hiveadmission",
            "namespace": TEMPLATE_NAMESPACE,
        },
    })
}

fn rbac_role() -> Value {
    let validators: Vec<String> = WEBHOOK_RESOURCES
        .iter()
        .map(|(_, resource)| format!("{}validators", singular(resource)))
        .collect();
    json!({
        "apiVersion": "rbac.authorization.k8s.io/v1",
        "kind": "ClusterRole",
        "metadata": {
            "name": "system:openshift:hive:hiveadmission",
        },
        "rules": [
            {
                "apiGroups": [ADMISSION_GROUP],
                "resources": validators,
                "verbs": ["get", "list", "watch", "create"],
            },
            {
                "apiGroups": ["admissionregistration.k8s.io"],
                "resources": ["validatingwebhookconfigurations", "mutatingwebhookconfigurations"],
                "verbs": ["get", "list", "watch"],
            },
            {
                "apiGroups": [""],
                "resources": ["namespaces"],
                "verbs": ["get", "list", "watch"],
            },
            {
                "apiGroups": ["flowcontrol.apiserver.k8s.io"],
                "resources": ["prioritylevelconfigurations", "flowschemas"],
                "verbs": ["get", "list", "watch"],
            },
        ],
    })
}

fn rbac_role_binding() -> Value {
    json!({
        "apiVersion": "rbac.authorization.k8s.io/v1",
        "kind": "ClusterRoleBinding",
        "metadata": {
            "name": "hiveadmission-hive-hiveadmission",
        },
        "roleRef": {
            "apiGroup": "rbac.authorization.k8s.io",
            "kind": "ClusterRole",
            "name": "system:openshift:hive:hiveadmission",
        },
        "subjects": [
            {
                "kind": "ServiceAccount",
                "name": "hiveadmission",
                "namespace": TEMPLATE_NAMESPACE,
            },
            {
                "apiGroup": "rbac.authorization.k8s.io",
                "kind": "Group",
                "name": "system:masters",
            },
        ],
    })
}

fn singular(resource: &str) -> &str {
    resource.strip_suffix('s').unwrap_or(resource)
}

/// Webhooks reach the admission server through the aggregated API, so the
/// client config points at the `kubernetes` service rather than ours.
fn validating_webhook(resource: &str) -> Value {
    let validator = format!("{}validators", singular(resource));
    let name = format!("{validator}.{ADMISSION_GROUP}");
    json!({
        "apiVersion": "admissionregistration.k8s.io/v1",
        "kind": "ValidatingWebhookConfiguration",
        "metadata": {
            "name": &name,
            "annotations": {
                "service.beta.openshift.io/inject-cabundle": "true",
            },
        },
        "webhooks": [{
            "name": &name,
            "admissionReviewVersions": ["v1"],
            "clientConfig": {
                "service": {
                    "namespace": "default",
                    "name": "kubernetes",
                    "path": format!("/apis/{ADMISSION_GROUP}/v1/{validator}"),
                },
            },
            "rules": [{
                "operations": ["CREATE", "UPDATE"],
                "apiGroups": ["hive.openshift.io"],
                "apiVersions": ["v1"],
                "resources": [resource],
            }],
            "failurePolicy": "Fail",
            "sideEffects": "None",
        }],
    })
}
