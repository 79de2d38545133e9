//! Service reconciler

use super::{annotated_declaration, Declared, Outcome, Reconciler};
use crate::annotations;
use crate::error::ControllerError;
use crate::resource::{EventKind, ResourceIdentity, ResourceKind};
use crate::url_builder::build_service_url;
use k8s_openapi::api::core::v1::Service;

/// What a Service declares through its annotations.
pub fn desired_spec(service: &Service) -> Declared {
    annotated_declaration(ResourceKind::Service, &service.metadata, || {
        build_service_url(service)
    })
}

impl Reconciler {
    /// Reconciles a Service event.
    pub async fn reconcile_service(
        &self,
        service: &Service,
        kind: EventKind,
    ) -> Result<Outcome, ControllerError> {
        let identity = ResourceIdentity::from_meta(ResourceKind::Service, &service.metadata)?;
        let annotations = service.metadata.annotations.clone().unwrap_or_default();

        match kind {
            EventKind::Upsert => self.reconcile_upsert(&identity, desired_spec(service)).await,
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
