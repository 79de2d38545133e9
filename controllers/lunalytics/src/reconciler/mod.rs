//! Reconciliation logic.
//!
//! Every event is reduced to one of three procedures:
//! - upsert: filter, extract, default, validate, arbitrate, then create,
//!   update or recreate the Lunalytics monitor
//! - delete: best-effort removal of the bound monitor
//! - resume: confirm a bound monitor still exists and refresh its statistics
//!
//! At most one mutating Lunalytics call is issued per event and bindings are
//! written only after validation and arbitration pass.

mod ingress;
mod monitor;
mod service;

pub use ingress::desired_spec as ingress_desired_spec;
pub use monitor::desired_spec as monitor_desired_spec;
pub use service::desired_spec as service_desired_spec;

use crate::annotations;
use crate::arbiter::{arbitrate, ClusterInventory};
use crate::binding::{BindingStore, SyncReport};
use crate::config::{DuplicateHandling, MonitoringPolicy};
use crate::desired::{merge_defaults, PartialMonitorSpec};
use crate::dispatch::EventHandler;
use crate::error::ControllerError;
use crate::metrics;
use crate::reconcile_helpers::check_existing;
use crate::resource::{MonitorEvent, ObservedResource, ResourceIdentity, ResourceKind};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use lunalytics_client::{LunalyticsClientTrait, LunalyticsError, MonitorCreate, MonitorStats, MonitorUpdate};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What a resource declares for the current pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declared {
    /// `lunalytics.io/enabled` is not "true"
    NotEnabled,
    /// No explicit URL and none could be derived
    Unresolvable,
    /// Monitoring requested with these explicit fields
    Spec(PartialMonitorSpec),
}

/// Result of reconciling one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing to do
    Skipped,
    /// Monitor created and bound
    Created(String),
    /// Bound monitor updated in place
    Updated(String),
    /// Bound monitor was gone; a new one was created and bound
    Recreated(String),
    /// Resume confirmed the bound monitor
    Refreshed(String),
    /// Bound monitor removed (or already gone)
    Deleted(String),
    /// Superseded by the given resource
    Conflict(ResourceIdentity),
    /// Desired state failed validation
    Invalid(Vec<String>),
    /// Resume found the bound monitor missing
    Stale(String),
    /// Lunalytics call failed
    Failed(String),
    /// Shutdown abandoned a retry wait; nothing was recorded
    Interrupted,
}

impl Outcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Skipped => "skipped",
            Outcome::Created(_) => "created",
            Outcome::Updated(_) => "updated",
            Outcome::Recreated(_) => "recreated",
            Outcome::Refreshed(_) => "refreshed",
            Outcome::Deleted(_) => "deleted",
            Outcome::Conflict(_) => "conflict",
            Outcome::Invalid(_) => "invalid",
            Outcome::Stale(_) => "stale",
            Outcome::Failed(_) => "failed",
            Outcome::Interrupted => "interrupted",
        }
    }
}

/// Builds the declaration of an annotation-driven resource.
pub(crate) fn annotated_declaration(
    kind: ResourceKind,
    meta: &ObjectMeta,
    derive_url: impl FnOnce() -> Option<String>,
) -> Declared {
    let annotations = meta.annotations.clone().unwrap_or_default();
    if !annotations::is_monitoring_enabled(&annotations) {
        return Declared::NotEnabled;
    }

    let mut partial = annotations::extract(&annotations);
    if partial.url.is_none() {
        match derive_url() {
            Some(url) => partial.url = Some(url),
            None => return Declared::Unresolvable,
        }
    }

    let name = meta.name.as_deref().unwrap_or_default();
    Declared::Spec(partial.with_default_name(kind.as_str(), name))
}

fn observe<T>(verb: &str, result: &Result<T, LunalyticsError>) {
    let label = match result {
        Ok(_) => "success",
        Err(e) if e.is_not_found() => "not_found",
        Err(_) => "error",
    };
    metrics::increment_api_calls(verb, label);
}

/// Reconciler for Lunalytics monitors.
pub struct Reconciler {
    client: Box<dyn LunalyticsClientTrait + Send + Sync>,
    bindings: Arc<dyn BindingStore>,
    inventory: Arc<dyn ClusterInventory>,
    policy: MonitoringPolicy,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("base_url", &self.client.base_url())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler.
    pub fn new<C: LunalyticsClientTrait + 'static>(
        client: C,
        bindings: Arc<dyn BindingStore>,
        inventory: Arc<dyn ClusterInventory>,
        policy: MonitoringPolicy,
    ) -> Self {
        Self {
            client: Box::new(client),
            bindings,
            inventory,
            policy,
        }
    }

    /// Reconciles one event.
    pub async fn reconcile(&self, event: &MonitorEvent) -> Result<Outcome, ControllerError> {
        match &event.resource {
            ObservedResource::Ingress(ingress) => self.reconcile_ingress(ingress, event.kind).await,
            ObservedResource::Service(service) => self.reconcile_service(service, event.kind).await,
            ObservedResource::Monitor(monitor) => self.reconcile_monitor(monitor, event.kind).await,
        }
    }

    async fn is_namespace_monitored(&self, namespace: &str) -> Result<bool, ControllerError> {
        let filter = &self.policy.namespace_filter;
        let annotations = if filter.needs_namespace_annotations() {
            self.inventory.namespace_annotations(namespace).await?
        } else {
            None
        };
        Ok(filter.is_monitored(namespace, annotations.as_ref()))
    }

    /// Persists `report`; failures are logged, never rolled back.
    async fn report(&self, identity: &ResourceIdentity, report: SyncReport) {
        if let Err(e) = self.bindings.record(identity, &report).await {
            error!("Failed to record {:?} state for {}: {}", report.state, identity, e);
        }
    }

    async fn fail(&self, identity: &ResourceIdentity, err: &LunalyticsError) -> Outcome {
        if matches!(err, LunalyticsError::Cancelled) {
            warn!("Lunalytics call for {} interrupted by shutdown", identity);
            return Outcome::Interrupted;
        }
        error!("Lunalytics API error for {}: {}", identity, err);
        let message = format!("Lunalytics API error: {}", err);
        self.report(identity, SyncReport::error(message.clone())).await;
        Outcome::Failed(message)
    }

    async fn create_monitor(
        &self,
        identity: &ResourceIdentity,
        payload: &MonitorCreate,
        replacing: bool,
    ) -> Outcome {
        let result = self.client.add_monitor(payload).await;
        observe("add", &result);
        let created = match result {
            Ok(created) => created,
            Err(e) => return self.fail(identity, &e).await,
        };

        let monitor_id = created.monitor_id.clone();
        info!("Created monitor {} for {}", monitor_id, identity);
        self.report(
            identity,
            SyncReport::active(
                "Monitor created successfully",
                monitor_id.clone(),
                true,
                MonitorStats::from(&created),
            ),
        )
        .await;

        if replacing {
            Outcome::Recreated(monitor_id)
        } else {
            Outcome::Created(monitor_id)
        }
    }

    async fn update_monitor(
        &self,
        identity: &ResourceIdentity,
        monitor_id: String,
        payload: MonitorCreate,
    ) -> Outcome {
        let update = MonitorUpdate {
            monitor_id: monitor_id.clone(),
            monitor: payload,
        };
        let result = self.client.edit_monitor(&update).await;
        observe("edit", &result);
        let updated = match result {
            Ok(updated) => updated,
            Err(e) => return self.fail(identity, &e).await,
        };

        info!("Updated monitor {} for {}", monitor_id, identity);
        self.report(
            identity,
            SyncReport::active(
                "Monitor updated successfully",
                monitor_id.clone(),
                false,
                MonitorStats::from(&updated),
            ),
        )
        .await;
        Outcome::Updated(monitor_id)
    }

    /// Create/update procedure shared by all kinds.
    pub(crate) async fn reconcile_upsert(
        &self,
        identity: &ResourceIdentity,
        declared: Declared,
    ) -> Result<Outcome, ControllerError> {
        if !self.is_namespace_monitored(&identity.namespace).await? {
            debug!("Namespace {} not monitored for {}", identity.namespace, identity);
            return Ok(Outcome::Skipped);
        }

        let partial = match declared {
            Declared::NotEnabled => {
                debug!("Monitoring not enabled for {}", identity);
                return Ok(Outcome::Skipped);
            }
            Declared::Unresolvable => {
                error!("Could not build URL for {}", identity);
                return Ok(Outcome::Skipped);
            }
            Declared::Spec(partial) => partial,
        };

        info!("Processing {} for monitoring", identity);

        let desired = merge_defaults(partial, &self.policy.defaults);
        let payload = match desired.to_payload() {
            Ok(payload) => payload,
            Err(errors) => {
                let message = format!("Validation failed: {}", errors.join("; "));
                error!("Invalid monitor configuration for {}: {}", identity, message);
                self.report(identity, SyncReport::error(message)).await;
                return Ok(Outcome::Invalid(errors));
            }
        };

        if self.policy.duplicate_handling == DuplicateHandling::AnnotationPriority {
            if let Some(record) = arbitrate(self.inventory.as_ref(), identity, &payload.url).await {
                if record.is_superseded(identity) {
                    warn!(
                        "{} superseded by {} for URL {}",
                        identity, record.winner, record.url
                    );
                    self.report(identity, SyncReport::conflict(record.message())).await;
                    return Ok(Outcome::Conflict(record.winner));
                }
                for loser in &record.losers {
                    info!("Marking {} as conflicting with {} for URL {}", loser, identity, record.url);
                    self.report(loser, SyncReport::conflict(record.message())).await;
                }
            }
        }

        let Some(monitor_id) = self.bindings.lookup(identity).await? else {
            return Ok(self.create_monitor(identity, &payload, false).await);
        };

        let result = self.client.get_monitor(&monitor_id).await;
        observe("get", &result);
        match check_existing(result) {
            Ok(Some(_)) => Ok(self.update_monitor(identity, monitor_id, payload).await),
            Ok(None) => {
                warn!(
                    "Monitor {} for {} no longer exists in Lunalytics, creating a new one",
                    monitor_id, identity
                );
                Ok(self.create_monitor(identity, &payload, true).await)
            }
            Err(e) => Ok(self.fail(identity, &e).await),
        }
    }

    /// Delete procedure; `bound` is the id recorded on the deleted object.
    pub(crate) async fn reconcile_delete(
        &self,
        identity: &ResourceIdentity,
        bound: Option<String>,
    ) -> Result<Outcome, ControllerError> {
        let Some(monitor_id) = bound else {
            debug!("No monitor ID found for deleted {}", identity);
            return Ok(Outcome::Skipped);
        };

        info!("Deleting monitor {} for {}", monitor_id, identity);
        let result = self.client.delete_monitor(&monitor_id).await;
        observe("delete", &result);
        let outcome = match result {
            Err(LunalyticsError::Cancelled) => {
                warn!("Deletion of monitor {} for {} interrupted by shutdown", monitor_id, identity);
                return Ok(Outcome::Interrupted);
            }
            Ok(()) => {
                info!("Successfully deleted monitor {} for {}", monitor_id, identity);
                Outcome::Deleted(monitor_id)
            }
            Err(e) if e.is_not_found() => {
                info!("Monitor {} not found in Lunalytics (already deleted)", monitor_id);
                Outcome::Deleted(monitor_id)
            }
            Err(e) => {
                error!("Error deleting monitor {} for {}: {}", monitor_id, identity, e);
                Outcome::Failed(e.to_string())
            }
        };

        if let Err(e) = self.bindings.release(identity).await {
            warn!("Failed to release binding of {}: {}", identity, e);
        }
        Ok(outcome)
    }

    /// Resume procedure: verify only, never recreate.
    pub(crate) async fn reconcile_resume(
        &self,
        identity: &ResourceIdentity,
        enabled: bool,
    ) -> Result<Outcome, ControllerError> {
        if !enabled {
            return Ok(Outcome::Skipped);
        }
        let Some(monitor_id) = self.bindings.lookup(identity).await? else {
            return Ok(Outcome::Skipped);
        };

        info!("Validating monitor {} for resumed {}", monitor_id, identity);
        let result = self.client.get_monitor(&monitor_id).await;
        observe("get", &result);
        match result {
            Ok(monitor) => {
                self.report(
                    identity,
                    SyncReport::active(
                        "Monitor validated successfully",
                        monitor_id.clone(),
                        false,
                        MonitorStats::from(&monitor),
                    ),
                )
                .await;
                Ok(Outcome::Refreshed(monitor_id))
            }
            Err(LunalyticsError::Cancelled) => {
                warn!("Validation of monitor {} for {} interrupted by shutdown", monitor_id, identity);
                Ok(Outcome::Interrupted)
            }
            Err(e) if e.is_not_found() => {
                warn!("Monitor {} not found for resumed {}", monitor_id, identity);
                self.report(identity, SyncReport::error("Monitor not found in Lunalytics")).await;
                Ok(Outcome::Stale(monitor_id))
            }
            Err(e) => {
                error!("Error validating monitor {} for resumed {}: {}", monitor_id, identity, e);
                let message = format!("Error validating monitor: {}", e);
                self.report(identity, SyncReport::error(message.clone())).await;
                Ok(Outcome::Failed(message))
            }
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for Reconciler {
    async fn handle(&self, event: MonitorEvent) {
        let kind = event.resource.kind();
        let started = Instant::now();

        let label = match self.reconcile(&event).await {
            Ok(outcome) => {
                debug!("{} {} event finished: {:?}", kind, event.kind.as_str(), outcome);
                outcome.label()
            }
            Err(e) => {
                error!("Reconciliation of {} {} event failed: {}", kind, event.kind.as_str(), e);
                "error"
            }
        };

        metrics::observe_reconciliation(kind.as_str(), event.kind.as_str(), label, started.elapsed());
    }
}

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod reconciler_test;
