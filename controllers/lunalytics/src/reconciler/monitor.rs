//! Monitor resource reconciler
//!
//! A Monitor always requests monitoring; its spec replaces the annotations.
//! A blank `url` is a validation error reported on the Monitor status.

use super::{Declared, Outcome, Reconciler};
use crate::desired::PartialMonitorSpec;
use crate::error::ControllerError;
use crate::resource::{EventKind, ResourceIdentity, ResourceKind};
use crds::Monitor;

/// Explicit fields of a Monitor spec.
pub fn desired_spec(monitor: &Monitor) -> Declared {
    let spec = &monitor.spec;
    let url = spec.url.trim();

    let partial = PartialMonitorSpec {
        name: spec.name.clone().filter(|n| !n.trim().is_empty()),
        url: Some(url.to_string()).filter(|u| !u.is_empty()),
        monitor_type: spec.monitor_type.clone(),
        method: spec.method.as_ref().map(|m| m.to_uppercase()),
        interval: spec.interval.map(i64::from),
        retry_interval: spec.retry_interval.map(i64::from),
        request_timeout: spec.request_timeout.map(i64::from),
        valid_status_codes: spec.valid_status_codes.clone(),
    };

    let name = monitor.metadata.name.as_deref().unwrap_or_default();
    Declared::Spec(partial.with_default_name(ResourceKind::Monitor.as_str(), name))
}

impl Reconciler {
    /// Reconciles a Monitor event.
    pub async fn reconcile_monitor(
        &self,
        monitor: &Monitor,
        kind: EventKind,
    ) -> Result<Outcome, ControllerError> {
        let identity = ResourceIdentity::from_meta(ResourceKind::Monitor, &monitor.metadata)?;

        match kind {
            EventKind::Upsert => self.reconcile_upsert(&identity, desired_spec(monitor)).await,
            EventKind::Delete => {
                let bound = monitor
                    .status
                    .as_ref()
                    .and_then(|s| s.monitor_id.clone())
                    .filter(|id| !id.is_empty());
                self.reconcile_delete(&identity, bound).await
            }
            EventKind::Resume => self.reconcile_resume(&identity, true).await,
        }
    }
}
