//! Main controller implementation.
//!
//! Wires the Lunalytics client, the Kubernetes-backed binding store, the
//! reconciler and one watcher per resource kind, then runs until cancelled.

use crate::cluster::KubeCluster;
use crate::config::OperatorConfig;
use crate::dispatch::Dispatcher;
use crate::error::ControllerError;
use crate::metrics;
use crate::reconciler::Reconciler;
use crate::resource::{ObservedResource, ResourceKind};
use crate::server::ServerState;
use crate::watcher::{watch_resource, InitialSync};
use crds::Monitor;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Api, Client};
use lunalytics_client::{LunalyticsClient, RetryingClient};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

const WATCHED_KINDS: usize = 3;

/// Main controller for Lunalytics monitor management.
pub struct Controller {
    kube_client: Client,
    config: OperatorConfig,
    server_state: Arc<ServerState>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("api_url", &self.config.api_url)
            .field("watch_namespace", &self.config.watch_namespace)
            .finish_non_exhaustive()
    }
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// A watcher that fails stops the whole controller.
async fn supervise(
    kind: ResourceKind,
    watcher: impl std::future::Future<Output = Result<(), ControllerError>>,
    cancel: CancellationToken,
) {
    if let Err(e) = watcher.await {
        error!("{} watcher failed: {}", kind, e);
        cancel.cancel();
    }
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(
        config: OperatorConfig,
        server_state: Arc<ServerState>,
        cancel: CancellationToken,
    ) -> Result<Self, ControllerError> {
        info!("Initializing Lunalytics Controller");

        let kube_client = Client::try_default().await?;

        Ok(Self {
            kube_client,
            config,
            server_state,
            cancel,
        })
    }

    /// Runs every watcher until cancellation, then drains in-flight events.
    pub async fn run(self) -> Result<(), ControllerError> {
        let lunalytics = LunalyticsClient::new(self.config.api_url.clone(), self.config.api_token.clone())?;
        let client = RetryingClient::new(lunalytics, self.config.retry.clone(), self.cancel.clone())
            .with_retry_hook(Arc::new(|operation: &str, _attempt: u32| metrics::increment_api_retries(operation)));

        let cluster = Arc::new(KubeCluster::new(self.kube_client.clone()));
        let reconciler = Reconciler::new(client, cluster.clone(), cluster, self.config.policy.clone());
        info!("Reconciler ready: {:?}", reconciler);

        let dispatcher = Arc::new(Dispatcher::new(Arc::new(reconciler)));
        let initial_sync = Arc::new(InitialSync::new(WATCHED_KINDS, self.server_state.clone()));

        let namespace = self.config.watch_namespace.as_deref();
        let ingresses: Api<Ingress> = api(&self.kube_client, namespace);
        let services: Api<Service> = api(&self.kube_client, namespace);
        let monitors: Api<Monitor> = api(&self.kube_client, namespace);

        let watchers = TaskTracker::new();
        watchers.spawn(supervise(
            ResourceKind::Ingress,
            watch_resource(
                ingresses,
                ObservedResource::Ingress,
                ResourceKind::Ingress,
                dispatcher.clone(),
                initial_sync.clone(),
                self.cancel.clone(),
            ),
            self.cancel.clone(),
        ));
        watchers.spawn(supervise(
            ResourceKind::Service,
            watch_resource(
                services,
                ObservedResource::Service,
                ResourceKind::Service,
                dispatcher.clone(),
                initial_sync.clone(),
                self.cancel.clone(),
            ),
            self.cancel.clone(),
        ));
        watchers.spawn(supervise(
            ResourceKind::Monitor,
            watch_resource(
                monitors,
                ObservedResource::Monitor,
                ResourceKind::Monitor,
                dispatcher.clone(),
                initial_sync,
                self.cancel.clone(),
            ),
            self.cancel.clone(),
        ));
        watchers.close();

        info!("Lunalytics Controller running");
        self.cancel.cancelled().await;

        info!("Shutdown requested, stopping watchers");
        watchers.wait().await;
        dispatcher.shutdown().await;
        info!("All in-flight reconciliations finished");
        Ok(())
    }
}
