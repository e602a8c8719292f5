use std::fmt;

use log::{debug, error};

use crate::{cluster::ClusterApi, Error};

/// Only served by current managed-platform releases.
pub const CLUSTER_VERSION_CRD_NAME: &str = "clusterversions.config.openshift.io";
/// Served by every managed-platform release, legacy ones included.
pub const MANAGED_PLATFORM_API_GROUP: &str = "route.openshift.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterCapabilityTier {
    ManagedPlatformCurrent,
    ManagedPlatformLegacy,
    Unmanaged,
}

impl fmt::Display for ClusterCapabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClusterCapabilityTier::ManagedPlatformCurrent => "managed platform (current)",
            ClusterCapabilityTier::ManagedPlatformLegacy => "managed platform (legacy)",
            ClusterCapabilityTier::Unmanaged => "unmanaged",
        })
    }
}

/// Classifies the cluster from the presence of the cluster version CRD. A
/// missing CRD means a legacy release; whether the cluster is a managed
/// platform at all is answered separately by [`is_managed_platform`].
pub async fn detect_tier(cluster: &dyn ClusterApi) -> Result<ClusterCapabilityTier, Error> {
    match cluster.get_crd(CLUSTER_VERSION_CRD_NAME).await {
        Ok(Some(_)) => Ok(ClusterCapabilityTier::ManagedPlatformCurrent),
        Ok(None) => {
            debug!("{CLUSTER_VERSION_CRD_NAME} not found, assuming legacy platform release");
            Ok(ClusterCapabilityTier::ManagedPlatformLegacy)
        }
        Err(e) => {
            error!("error fetching {CLUSTER_VERSION_CRD_NAME} CRD: {e}");
            Err(e)
        }
    }
}

pub async fn is_managed_platform(cluster: &dyn ClusterApi) -> Result<bool, Error> {
    let managed = cluster.has_api_group(MANAGED_PLATFORM_API_GROUP).await?;
    debug!("api group {MANAGED_PLATFORM_API_GROUP} served: {managed}");
    Ok(managed)
}

/// Legacy managed releases and unmanaged clusters both lack service CA
/// injection, for different reasons.
pub fn injection_required(managed: bool, tier: ClusterCapabilityTier) -> bool {
    !managed || tier == ClusterCapabilityTier::ManagedPlatformLegacy
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub managed: bool,
    pub tier: ClusterCapabilityTier,
}

impl Environment {
    /// Runs both probes. Never cached: the answer is recomputed on each call.
    pub async fn probe(cluster: &dyn ClusterApi) -> Result<Self, Error> {
        let tier = detect_tier(cluster).await?;
        let managed = is_managed_platform(cluster).await?;
        Ok(Environment { managed, tier })
    }

    pub fn injection_required(&self) -> bool {
        injection_required(self.managed, self.tier)
    }

    pub fn effective_tier(&self) -> ClusterCapabilityTier {
        if self.managed {
            self.tier
        } else {
            ClusterCapabilityTier::Unmanaged
        }
    }
}
