//! Ingress reconciler

use super::{annotated_declaration, Declared, Outcome, Reconciler};
use crate::annotations;
use crate::error::ControllerError;
use crate::resource::{EventKind, ResourceIdentity, ResourceKind};
use crate::url_builder::build_ingress_url;
use k8s_openapi::api::networking::v1::Ingress;

/// What an Ingress declares through its annotations.
pub fn desired_spec(ingress: &Ingress) -> Declared {
    annotated_declaration(ResourceKind::Ingress, &ingress.metadata, || {
        build_ingress_url(ingress)
    })
}

impl Reconciler {
    /// Reconciles an Ingress event.
    pub async fn reconcile_ingress(
        &self,
        ingress: &Ingress,
        kind: EventKind,
    ) -> Result<Outcome, ControllerError> {
        let identity = ResourceIdentity::from_meta(ResourceKind::Ingress, &ingress.metadata)?;
        let annotations = ingress.metadata.annotations.clone().unwrap_or_default();

        match kind {
            EventKind::Upsert => self.reconcile_upsert(&identity, desired_spec(ingress)).await,
            EventKind::Delete => {
                let bound = annotations::monitor_id(&annotations).map(str::to_string);
                self.reconcile_delete(&identity, bound).await
            }
            EventKind::Resume => {
                let enabled = annotations::is_monitoring_enabled(&annotations);
                self.reconcile_resume(&identity, enabled).await
            }
        }
    }
}
