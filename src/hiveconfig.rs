use std::{sync::Arc, time::Duration};

use kube::{runtime::controller::Action, Client, CustomResource, Resource, ResourceExt};
use log::{info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{admission::deploy_admission, cluster::KubeCluster, config::OperatorConfig, Error};

pub const DEFAULT_NAMESPACE: &str = "hive";

#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "hive.openshift.io",
    version = "v1",
    kind = "HiveConfig",
    plural = "hiveconfigs",
    status = "HiveConfigStatus"
)]
pub struct HiveConfigSpec {
    /// Namespace the admission subsystem is deployed into.
    #[serde(default)]
    pub target_namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HiveConfigStatus {
    /// Hash of the aggregator client CA, maintained outside this controller.
    #[serde(default, rename = "aggregatorClientCAHash")]
    pub aggregator_client_ca_hash: Option<String>,
}

impl HiveConfig {
    pub fn target_namespace(&self) -> &str {
        self.spec
            .target_namespace
            .as_deref()
            .filter(|x| !x.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn aggregator_client_ca_hash(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|x| x.aggregator_client_ca_hash.as_deref())
            .unwrap_or_default()
    }
}

pub struct Context {
    pub cluster: KubeCluster,
    pub config: OperatorConfig,
}

impl Context {
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        Context {
            cluster: KubeCluster::new(client),
            config,
        }
    }
}

impl HiveConfigSpec {
    pub async fn reconcile(
        instance: Arc<HiveConfig>,
        context: Arc<Context>,
    ) -> Result<Action, Error> {
        let owner = instance.controller_owner_ref(&()).ok_or_else(|| {
            Error::UserInputError(format!("HiveConfig {} has no uid", instance.name_any()))
        })?;
        let namespace = instance.target_namespace();
        info!(
            "deploying hiveadmission for HiveConfig {} into {namespace}",
            instance.name_any()
        );

        deploy_admission(
            &context.cluster,
            &context.config,
            namespace,
            instance.aggregator_client_ca_hash(),
            &context.config.managed_domains_config_map,
            &owner,
        )
        .await?;

        Ok(Action::requeue(context.config.resync_interval))
    }

    pub fn on_error(instance: Arc<HiveConfig>, error: &Error, _context: Arc<Context>) -> Action {
        if error.is_not_found() {
            warn!(
                "HiveConfig {} waiting on missing resource: {error}",
                instance.name_any()
            );
        } else {
            log::error!(
                "HiveConfig reconciliation error:\n{:?}.\n{:?}",
                error,
                instance.name_any()
            );
        }
        Action::requeue(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hive_config(target_namespace: Option<&str>, hash: Option<&str>) -> HiveConfig {
        let mut config = HiveConfig::new(
            "hive",
            HiveConfigSpec {
                target_namespace: target_namespace.map(str::to_string),
            },
        );
        config.status = hash.map(|x| HiveConfigStatus {
            aggregator_client_ca_hash: Some(x.to_string()),
        });
        config
    }

    #[test]
    fn test_target_namespace() {
        assert_eq!(hive_config(None, None).target_namespace(), "hive");
        assert_eq!(hive_config(Some(""), None).target_namespace(), "hive");
        assert_eq!(
            hive_config(Some("hive-system"), None).target_namespace(),
            "hive-system"
        );
    }

    #[test]
    fn test_aggregator_client_ca_hash() {
        assert_eq!(hive_config(None, None).aggregator_client_ca_hash(), "");
        assert_eq!(
            hive_config(None, Some("abc")).aggregator_client_ca_hash(),
            "abc"
        );
    }

    #[test]
    fn test_status_reads_aggregator_ca_hash_from_cluster_json() {
        let config: HiveConfig = serde_json::from_value(serde_json::json!({
            "apiVersion": "hive.openshift.io/v1",
            "kind": "HiveConfig",
            "metadata": { "name": "hive" },
            "spec": { "targetNamespace": "hive-system" },
            "status": { "aggregatorClientCAHash": "abc123" },
        }))
        .unwrap();
        assert_eq!(config.target_namespace(), "hive-system");
        assert_eq!(config.aggregator_client_ca_hash(), "abc123");

        let status = serde_json::to_value(config.status.unwrap()).unwrap();
        assert_eq!(status["aggregatorClientCAHash"], "abc123");
    }

    #[test]
    fn test_owner_reference_requires_uid() {
        let mut config = hive_config(None, None);
        assert!(config.controller_owner_ref(&()).is_none());
        config.meta_mut().uid = Some("0000-1111".to_string());
        let owner = config.controller_owner_ref(&()).unwrap();
        assert_eq!(owner.kind, "HiveConfig");
        assert_eq!(owner.controller, Some(true));
    }
}
