//! Kubernetes-backed binding store and cluster inventory.
//!
//! Ingress and Service bindings live in the `lunalytics.io/monitor-id`
//! annotation. Monitor bindings and sync state live in the Monitor status.

use crate::annotations;
use crate::arbiter::{ClusterInventory, Declaration};
use crate::binding::{BindingStore, SyncReport, SyncState};
use crate::error::ControllerError;
use crate::reconciler::{ingress_desired_spec, monitor_desired_spec, service_desired_spec, Declared};
use crate::resource::{ObservedResource, ResourceIdentity, ResourceKind};
use crds::{Monitor, MonitorState, MonitorStatus};
use k8s_openapi::api::core::v1::{Namespace, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Binding store and inventory over the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

fn monitor_state(state: SyncState) -> MonitorState {
    match state {
        SyncState::Active => MonitorState::Active,
        SyncState::Error => MonitorState::Error,
        SyncState::Conflict => MonitorState::Conflict,
    }
}

/// Status written for a Monitor.
///
/// An absent `monitorId` leaves the stored id untouched under a merge patch.
pub(crate) fn status_for(report: &SyncReport) -> MonitorStatus {
    MonitorStatus {
        state: monitor_state(report.state),
        message: Some(report.message.clone()),
        monitor_id: report.monitor_id.clone(),
        uptime_percentage: report.stats.map(|s| s.uptime_percentage),
        average_latency: report.stats.map(|s| s.average_latency),
        last_sync_time: Some(chrono::Utc::now()),
    }
}

fn declared_url(declared: Declared) -> Option<String> {
    match declared {
        Declared::Spec(partial) => partial.url,
        Declared::NotEnabled | Declared::Unresolvable => None,
    }
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, identity: &ResourceIdentity) -> Result<Option<ObservedResource>, ControllerError> {
        let ns = identity.namespace.as_str();
        let name = identity.name.as_str();
        let observed = match identity.kind {
            ResourceKind::Ingress => Api::<Ingress>::namespaced(self.client.clone(), ns)
                .get_opt(name)
                .await?
                .map(ObservedResource::Ingress),
            ResourceKind::Service => Api::<Service>::namespaced(self.client.clone(), ns)
                .get_opt(name)
                .await?
                .map(ObservedResource::Service),
            ResourceKind::Monitor => Api::<Monitor>::namespaced(self.client.clone(), ns)
                .get_opt(name)
                .await?
                .map(ObservedResource::Monitor),
        };
        Ok(observed)
    }

    async fn annotate_monitor_id(&self, identity: &ResourceIdentity, monitor_id: &str) -> Result<(), ControllerError> {
        let bound = BTreeMap::from([(annotations::MONITOR_ID, monitor_id)]);
        let patch = serde_json::json!({ "metadata": { "annotations": bound } });
        let pp = PatchParams::default();
        let ns = identity.namespace.as_str();
        match identity.kind {
            ResourceKind::Ingress => {
                Api::<Ingress>::namespaced(self.client.clone(), ns)
                    .patch(&identity.name, &pp, &Patch::Merge(&patch))
                    .await?;
            }
            ResourceKind::Service => {
                Api::<Service>::namespaced(self.client.clone(), ns)
                    .patch(&identity.name, &pp, &Patch::Merge(&patch))
                    .await?;
            }
            ResourceKind::Monitor => {
                return Err(ControllerError::InvalidConfig(format!(
                    "{} is not annotation-driven",
                    identity
                )));
            }
        }
        info!("Bound {} to monitor {}", identity, monitor_id);
        Ok(())
    }

    async fn patch_monitor_status(&self, identity: &ResourceIdentity, report: &SyncReport) -> Result<(), ControllerError> {
        let api = Api::<Monitor>::namespaced(self.client.clone(), &identity.namespace);
        let patch = serde_json::json!({ "status": status_for(report) });
        api.patch_status(&identity.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!("Updated {} status to {:?}", identity, report.state);
        Ok(())
    }
}

#[async_trait::async_trait]
impl BindingStore for KubeCluster {
    async fn lookup(&self, identity: &ResourceIdentity) -> Result<Option<String>, ControllerError> {
        Ok(self.fetch(identity).await?.and_then(|o| o.bound_monitor_id()))
    }

    async fn record(&self, identity: &ResourceIdentity, report: &SyncReport) -> Result<(), ControllerError> {
        if identity.kind.is_annotation_driven() {
            match (&report.monitor_id, report.binding_changed) {
                (Some(monitor_id), true) => self.annotate_monitor_id(identity, monitor_id).await,
                _ => {
                    debug!("{} is {:?}: {}", identity, report.state, report.message);
                    Ok(())
                }
            }
        } else {
            self.patch_monitor_status(identity, report).await
        }
    }

    async fn release(&self, identity: &ResourceIdentity) -> Result<(), ControllerError> {
        // The binding is stored on the object, which is already gone.
        debug!("Released binding of {}", identity);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClusterInventory for KubeCluster {
    async fn namespace_annotations(
        &self,
        namespace: &str,
    ) -> Result<Option<BTreeMap<String, String>>, ControllerError> {
        let api = Api::<Namespace>::all(self.client.clone());
        Ok(api
            .get_opt(namespace)
            .await?
            .map(|ns| ns.metadata.annotations.unwrap_or_default()))
    }

    async fn declarations(
        &self,
        namespace: &str,
        kind: ResourceKind,
    ) -> Result<Vec<Declaration>, ControllerError> {
        let lp = ListParams::default();
        let declared: Vec<(ResourceIdentity, Declared)> = match kind {
            ResourceKind::Ingress => Api::<Ingress>::namespaced(self.client.clone(), namespace)
                .list(&lp)
                .await?
                .items
                .iter()
                .filter_map(|i| {
                    ResourceIdentity::from_meta(kind, &i.metadata)
                        .ok()
                        .map(|id| (id, ingress_desired_spec(i)))
                })
                .collect(),
            ResourceKind::Service => Api::<Service>::namespaced(self.client.clone(), namespace)
                .list(&lp)
                .await?
                .items
                .iter()
                .filter_map(|s| {
                    ResourceIdentity::from_meta(kind, &s.metadata)
                        .ok()
                        .map(|id| (id, service_desired_spec(s)))
                })
                .collect(),
            ResourceKind::Monitor => Api::<Monitor>::namespaced(self.client.clone(), namespace)
                .list(&lp)
                .await?
                .items
                .iter()
                .filter_map(|m| {
                    ResourceIdentity::from_meta(kind, &m.metadata)
                        .ok()
                        .map(|id| (id, monitor_desired_spec(m)))
                })
                .collect(),
        };

        Ok(declared
            .into_iter()
            .filter_map(|(identity, declared)| {
                declared_url(declared).map(|url| Declaration { identity, url })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunalytics_client::MonitorStats;

    #[test]
    fn test_active_status_carries_id_and_stats() {
        let report = SyncReport::active(
            "Monitor created successfully",
            "m-1".to_string(),
            true,
            MonitorStats {
                uptime_percentage: 99.9,
                average_latency: 12.5,
            },
        );
        let value = serde_json::to_value(status_for(&report)).unwrap();
        assert_eq!(value["state"], "active");
        assert_eq!(value["monitorId"], "m-1");
        assert_eq!(value["uptimePercentage"], 99.9);
        assert_eq!(value["averageLatency"], 12.5);
        assert!(value["lastSyncTime"].is_string());
    }

    #[test]
    fn test_conflict_status_leaves_monitor_id_alone() {
        let report = SyncReport::conflict("Conflict: Ingress annotation takes precedence for URL https://a/");
        let value = serde_json::to_value(status_for(&report)).unwrap();
        assert_eq!(value["state"], "conflict");
        assert!(value.get("monitorId").is_none());
        assert!(value.get("uptimePercentage").is_none());
    }

    #[test]
    fn test_only_spec_declarations_have_urls() {
        assert_eq!(declared_url(Declared::NotEnabled), None);
        assert_eq!(declared_url(Declared::Unresolvable), None);
    }
}
