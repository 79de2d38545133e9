//! Duplicate URL arbitration.
//!
//! When an annotated Ingress/Service and a Monitor resource in the same
//! namespace declare the same URL, the annotation wins and the Monitor is
//! put into the conflict state. Collisions between two resources of the same
//! declaration style are not arbitrated.

use crate::error::ControllerError;
use crate::resource::{ResourceIdentity, ResourceKind};
use std::collections::BTreeMap;
use tracing::warn;

/// A resource that declares monitoring of `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub identity: ResourceIdentity,
    pub url: String,
}

/// Result of arbitration for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub winner: ResourceIdentity,
    pub losers: Vec<ResourceIdentity>,
    pub url: String,
}

impl ConflictRecord {
    /// Status message put on every loser.
    pub fn message(&self) -> String {
        format!(
            "Conflict: {} annotation takes precedence for URL {}",
            self.winner.kind, self.url
        )
    }

    pub fn is_superseded(&self, identity: &ResourceIdentity) -> bool {
        self.losers.contains(identity)
    }
}

/// Read access to the cluster the arbiter and namespace filter need.
#[async_trait::async_trait]
pub trait ClusterInventory: Send + Sync {
    /// Annotations of a Namespace object; `None` when it does not exist.
    async fn namespace_annotations(
        &self,
        namespace: &str,
    ) -> Result<Option<BTreeMap<String, String>>, ControllerError>;

    /// Monitor-eligible resources of `kind` in `namespace` with their effective URL.
    async fn declarations(
        &self,
        namespace: &str,
        kind: ResourceKind,
    ) -> Result<Vec<Declaration>, ControllerError>;
}

/// Kinds whose declarations can collide with a declaration of `kind`.
fn rival_kinds(kind: ResourceKind) -> &'static [ResourceKind] {
    match kind {
        ResourceKind::Ingress | ResourceKind::Service => &[ResourceKind::Monitor],
        ResourceKind::Monitor => &[ResourceKind::Ingress, ResourceKind::Service],
    }
}

async fn rival_declarations(
    inventory: &dyn ClusterInventory,
    origin: &ResourceIdentity,
    url: &str,
) -> Result<Vec<ResourceIdentity>, ControllerError> {
    let mut rivals = Vec::new();
    for kind in rival_kinds(origin.kind) {
        rivals.extend(
            inventory
                .declarations(&origin.namespace, *kind)
                .await?
                .into_iter()
                .filter(|d| d.url == url && d.identity != *origin)
                .map(|d| d.identity),
        );
    }
    Ok(rivals)
}

/// First resource of another declaration style in the same namespace that declares `url`.
pub async fn find_conflicting_declarations(
    inventory: &dyn ClusterInventory,
    origin: &ResourceIdentity,
    url: &str,
) -> Result<Option<ResourceIdentity>, ControllerError> {
    Ok(rival_declarations(inventory, origin, url).await?.into_iter().next())
}

/// Applies "annotation outranks Monitor resource" to `origin` declaring `url`.
///
/// Listing failures are logged and treated as no conflict.
pub async fn arbitrate(
    inventory: &dyn ClusterInventory,
    origin: &ResourceIdentity,
    url: &str,
) -> Option<ConflictRecord> {
    let listed = if origin.kind.is_annotation_driven() {
        rival_declarations(inventory, origin, url)
            .await
            .map(|losers| (!losers.is_empty()).then(|| (origin.clone(), losers)))
    } else {
        find_conflicting_declarations(inventory, origin, url)
            .await
            .map(|winner| winner.map(|winner| (winner, vec![origin.clone()])))
    };

    match listed {
        Ok(found) => found.map(|(winner, losers)| ConflictRecord {
            winner,
            losers,
            url: url.to_string(),
        }),
        Err(e) => {
            warn!("Error checking for duplicate declarations of {}: {}", url, e);
            None
        }
    }
}
