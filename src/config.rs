use std::time::Duration;

use log::warn;

const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(600);
const DEFAULT_MANAGED_DOMAINS_CONFIG_MAP: &str = "managed-domains";

lazy_static::lazy_static! {
    pub static ref CONFIG: OperatorConfig =
        OperatorConfig::from_lookup(|key| std::env::var(key).ok());
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Overrides the admission container image when set.
    pub image: Option<String>,
    pub image_pull_policy: Option<String>,
    /// Requeue delay after a successful reconcile. Picks up serving cert
    /// secrets that appear after the deployment was applied.
    pub resync_interval: Duration,
    /// ConfigMap listing the managed DNS domains, mounted into the admission pods.
    pub managed_domains_config_map: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        OperatorConfig {
            image: None,
            image_pull_policy: None,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            managed_domains_config_map: DEFAULT_MANAGED_DOMAINS_CONFIG_MAP.to_string(),
        }
    }
}

impl OperatorConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|x| !x.is_empty());

        let resync_interval = match non_empty("RESYNC_INTERVAL_SECS") {
            None => DEFAULT_RESYNC_INTERVAL,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!("invalid RESYNC_INTERVAL_SECS ({raw}), using default");
                    DEFAULT_RESYNC_INTERVAL
                }
            },
        };

        OperatorConfig {
            image: non_empty("HIVE_IMAGE"),
            image_pull_policy: non_empty("HIVE_IMAGE_PULL_POLICY"),
            resync_interval,
            managed_domains_config_map: non_empty("MANAGED_DOMAINS_CONFIGMAP")
                .unwrap_or_else(|| DEFAULT_MANAGED_DOMAINS_CONFIG_MAP.to_string()),
        }
    }
}
