//! Kubernetes resource watchers.
//!
//! Each watched kind runs one `kube_runtime::watcher` stream with the
//! default backoff. The watcher keeps the last snapshot of every object so it
//! can:
//! - drop updates that do not change the fingerprint (status writes, our own
//!   monitor-id annotation)
//! - turn objects missing from a re-list into delete events
//! - deliver the startup listing as resume events for bound objects

use crate::dispatch::Dispatcher;
use crate::error::ControllerError;
use crate::metrics;
use crate::resource::{EventKind, MonitorEvent, ObservedResource, ResourceIdentity, ResourceKind};
use crate::server::ServerState;
use futures::StreamExt;
use kube::Api;
use kube_runtime::watcher::{self, Event};
use kube_runtime::WatchStreamExt;
use std::collections::{HashMap, HashSet};
use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Flips readiness once every watcher has finished its first listing.
#[derive(Debug)]
pub struct InitialSync {
    pending: AtomicUsize,
    state: Arc<ServerState>,
}

impl InitialSync {
    pub fn new(watchers: usize, state: Arc<ServerState>) -> Self {
        Self {
            pending: AtomicUsize::new(watchers),
            state,
        }
    }

    fn complete(&self, kind: ResourceKind) {
        info!("Initial {} listing complete", kind);
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            info!("All watchers synced, operator is ready");
            self.state.set_ready();
        }
    }
}

#[derive(Debug)]
struct Known {
    fingerprint: String,
    snapshot: ObservedResource,
}

/// Turns raw watch events of one kind into monitor events.
#[derive(Debug)]
struct ChangeFilter {
    kind: ResourceKind,
    known: HashMap<ResourceIdentity, Known>,
    /// Identities seen since the current listing started
    relisting: Option<HashSet<ResourceIdentity>>,
    synced: bool,
}

impl ChangeFilter {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            known: HashMap::new(),
            relisting: None,
            synced: false,
        }
    }

    /// Stores `observed`; returns it back when its fingerprint changed.
    fn remember(&mut self, identity: ResourceIdentity, observed: ObservedResource) -> Option<ObservedResource> {
        let fingerprint = observed.fingerprint();
        let changed = self
            .known
            .get(&identity)
            .is_none_or(|k| k.fingerprint != fingerprint);
        self.known.insert(
            identity,
            Known {
                fingerprint,
                snapshot: observed.clone(),
            },
        );
        changed.then_some(observed)
    }

    fn applied(&mut self, observed: ObservedResource) -> Option<MonitorEvent> {
        let identity = match observed.identity() {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Ignoring {}: {}", self.kind, e);
                return None;
            }
        };
        if let Some(listed) = self.relisting.as_mut() {
            listed.insert(identity.clone());
        }

        let initial = !self.synced && self.relisting.is_some();
        let observed = self.remember(identity, observed);
        let Some(observed) = observed else {
            metrics::increment_watch_events(self.kind.as_str(), "unchanged");
            return None;
        };

        let event_kind = if initial && observed.bound_monitor_id().is_some() {
            EventKind::Resume
        } else {
            EventKind::Upsert
        };
        Some(MonitorEvent::new(event_kind, observed))
    }

    fn deleted(&mut self, observed: ObservedResource) -> Option<MonitorEvent> {
        if let Ok(identity) = observed.identity() {
            self.known.remove(&identity);
        }
        Some(MonitorEvent::new(EventKind::Delete, observed))
    }

    fn listing_started(&mut self) {
        self.relisting = Some(HashSet::new());
    }

    /// Ends a listing; objects not seen in it were deleted while disconnected.
    fn listing_done(&mut self) -> Vec<MonitorEvent> {
        let Some(listed) = self.relisting.take() else {
            return Vec::new();
        };
        self.synced = true;

        let gone: Vec<ResourceIdentity> = self
            .known
            .keys()
            .filter(|identity| !listed.contains(*identity))
            .cloned()
            .collect();
        gone.into_iter()
            .filter_map(|identity| self.known.remove(&identity))
            .map(|known| {
                debug!("{} disappeared during re-list", self.kind);
                MonitorEvent::new(EventKind::Delete, known.snapshot)
            })
            .collect()
    }
}

/// Watches one resource kind until `cancel` fires.
pub async fn watch_resource<K>(
    api: Api<K>,
    wrap: fn(K) -> ObservedResource,
    kind: ResourceKind,
    dispatcher: Arc<Dispatcher>,
    initial_sync: Arc<InitialSync>,
    cancel: CancellationToken,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned + Send + 'static,
{
    info!("Starting {} watcher", kind);

    let mut stream = pin!(watcher::watcher(api, watcher::Config::default()).default_backoff());
    let mut filter = ChangeFilter::new(kind);

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            next = stream.next() => next,
        };
        let Some(result) = next else {
            return Err(ControllerError::Watch(format!("{} watch stream ended", kind)));
        };

        let events = match result {
            Ok(Event::Init) => {
                filter.listing_started();
                Vec::new()
            }
            Ok(Event::InitApply(obj) | Event::Apply(obj)) => filter.applied(wrap(obj)).into_iter().collect(),
            Ok(Event::InitDone) => {
                let first = !filter.synced;
                let gone = filter.listing_done();
                if first {
                    initial_sync.complete(kind);
                }
                gone
            }
            Ok(Event::Delete(obj)) => filter.deleted(wrap(obj)).into_iter().collect(),
            Err(e) => {
                warn!("{} watch error: {}", kind, e);
                Vec::new()
            }
        };

        for event in events {
            metrics::increment_watch_events(kind.as_str(), "dispatched");
            dispatcher.dispatch(event);
        }
    }

    info!("{} watcher stopped", kind);
    Ok(())
}
