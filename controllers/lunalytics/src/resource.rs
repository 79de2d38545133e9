//! Resource identities and the events delivered to the reconciler.

use crate::annotations;
use crate::error::ControllerError;
use crds::Monitor;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::fmt;

/// Kinds of resource that can declare a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Ingress,
    Service,
    Monitor,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Ingress => "Ingress",
            ResourceKind::Service => "Service",
            ResourceKind::Monitor => "Monitor",
        }
    }

    /// Ingress and Service declare monitors through annotations; Monitor through its spec.
    pub fn is_annotation_driven(self) -> bool {
        !matches!(self, ResourceKind::Monitor)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{kind, namespace, name}` of the object that owns a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentity {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_meta(kind: ResourceKind, meta: &ObjectMeta) -> Result<Self, ControllerError> {
        let name = meta.name.as_ref().ok_or_else(|| {
            ControllerError::InvalidConfig(format!("{} missing name", kind))
        })?;
        let namespace = meta.namespace.as_deref().unwrap_or("default");
        Ok(Self::new(kind, namespace, name.as_str()))
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A snapshot of a watched object.
#[derive(Debug, Clone)]
pub enum ObservedResource {
    Ingress(Ingress),
    Service(Service),
    Monitor(Monitor),
}

impl ObservedResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ObservedResource::Ingress(_) => ResourceKind::Ingress,
            ObservedResource::Service(_) => ResourceKind::Service,
            ObservedResource::Monitor(_) => ResourceKind::Monitor,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ObservedResource::Ingress(ingress) => &ingress.metadata,
            ObservedResource::Service(service) => &service.metadata,
            ObservedResource::Monitor(monitor) => &monitor.metadata,
        }
    }

    pub fn identity(&self) -> Result<ResourceIdentity, ControllerError> {
        ResourceIdentity::from_meta(self.kind(), self.metadata())
    }

    /// Object annotations, empty when unset.
    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.metadata().annotations.clone().unwrap_or_default()
    }

    /// Monitor id recorded on this snapshot (annotation or status).
    pub fn bound_monitor_id(&self) -> Option<String> {
        match self {
            ObservedResource::Ingress(_) | ObservedResource::Service(_) => {
                annotations::monitor_id(&self.annotations()).map(str::to_string)
            }
            ObservedResource::Monitor(monitor) => monitor
                .status
                .as_ref()
                .and_then(|s| s.monitor_id.clone())
                .filter(|id| !id.is_empty()),
        }
    }

    /// Changes to this value mean the desired state may have changed.
    ///
    /// Monitor uses `metadata.generation`, which status writes do not bump.
    /// Ingress and Service hash their spec plus declared annotations, leaving out
    /// the monitor-id annotation the operator writes itself.
    pub fn fingerprint(&self) -> String {
        match self {
            ObservedResource::Monitor(monitor) => {
                format!("gen:{}", monitor.metadata.generation.unwrap_or_default())
            }
            ObservedResource::Ingress(ingress) => {
                let annotations = self.annotations();
                serde_json::json!({
                    "spec": ingress.spec,
                    "annotations": annotations::declared(&annotations),
                })
                .to_string()
            }
            ObservedResource::Service(service) => {
                let annotations = self.annotations();
                serde_json::json!({
                    "spec": service.spec,
                    "annotations": annotations::declared(&annotations),
                })
                .to_string()
            }
        }
    }
}

/// What happened to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Created or changed
    Upsert,
    /// Removed from the cluster
    Delete,
    /// Seen again after an operator restart
    Resume,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Upsert => "upsert",
            EventKind::Delete => "delete",
            EventKind::Resume => "resume",
        }
    }
}

/// Unit of work handed to the reconciler.
#[derive(Debug, Clone)]
pub struct MonitorEvent {
    pub kind: EventKind,
    pub resource: ObservedResource,
}

impl MonitorEvent {
    pub fn new(kind: EventKind, resource: ObservedResource) -> Self {
        Self { kind, resource }
    }
}
