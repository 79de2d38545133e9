//! Test utilities for unit testing reconcilers
//!
//! Builders for watched objects plus an in-memory cluster that stands in for
//! both the binding store and the cluster inventory.

use crate::arbiter::{ClusterInventory, Declaration};
use crate::binding::{BindingStore, SyncReport};
use crate::config::MonitoringPolicy;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::resource::{ResourceIdentity, ResourceKind};
use crds::{Monitor, MonitorSpec, MonitorStatus};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressRule, IngressSpec, IngressTLS,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use lunalytics_client::{MockLunalyticsClient, RetryPolicy, RetryingClient};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn meta(name: &str, namespace: &str, annotations: &[(&str, &str)]) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        annotations: (!annotations.is_empty()).then(|| {
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }),
        ..Default::default()
    }
}

/// Helper to create a test Ingress with at most one rule `(host, path)`.
pub fn create_test_ingress(
    name: &str,
    namespace: &str,
    rule: Option<(&str, Option<&str>)>,
    tls: bool,
    annotations: &[(&str, &str)],
) -> Ingress {
    let rules = rule.map(|(host, path)| {
        vec![IngressRule {
            host: Some(host.to_string()),
            http: Some(HTTPIngressRuleValue {
                paths: vec![HTTPIngressPath {
                    path: path.map(str::to_string),
                    path_type: "Prefix".to_string(),
                    ..Default::default()
                }],
            }),
        }]
    });

    Ingress {
        metadata: meta(name, namespace, annotations),
        spec: Some(IngressSpec {
            rules,
            tls: tls.then(|| vec![IngressTLS::default()]),
            ..Default::default()
        }),
        status: None,
    }
}

/// Helper to create a test Service with at most one port `(number, name)`.
pub fn create_test_service(
    name: &str,
    namespace: &str,
    port: Option<(i32, Option<&str>)>,
    annotations: &[(&str, &str)],
) -> Service {
    let ports = port.map(|(number, port_name)| {
        vec![ServicePort {
            port: number,
            name: port_name.map(str::to_string),
            ..Default::default()
        }]
    });

    Service {
        metadata: meta(name, namespace, annotations),
        spec: Some(ServiceSpec {
            ports,
            ..Default::default()
        }),
        status: None,
    }
}

/// Helper to create a test Monitor, optionally already bound.
pub fn create_test_monitor(name: &str, namespace: &str, url: &str, monitor_id: Option<&str>) -> Monitor {
    let mut monitor = Monitor::new(
        name,
        MonitorSpec {
            name: None,
            url: url.to_string(),
            monitor_type: None,
            method: None,
            interval: None,
            retry_interval: None,
            request_timeout: None,
            valid_status_codes: None,
        },
    );
    monitor.metadata.namespace = Some(namespace.to_string());
    monitor.metadata.generation = Some(1);
    monitor.status = monitor_id.map(|id| MonitorStatus {
        monitor_id: Some(id.to_string()),
        ..Default::default()
    });
    monitor
}

/// Bindings, reports, declarations and namespaces kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    bindings: Mutex<HashMap<ResourceIdentity, String>>,
    reports: Mutex<Vec<(ResourceIdentity, SyncReport)>>,
    declarations: Mutex<Vec<Declaration>>,
    namespaces: Mutex<HashMap<String, BTreeMap<String, String>>>,
    fail_listing: AtomicBool,
    fail_record: AtomicBool,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, identity: &ResourceIdentity, monitor_id: &str) {
        self.bindings.lock().unwrap().insert(identity.clone(), monitor_id.to_string());
    }

    pub fn binding(&self, identity: &ResourceIdentity) -> Option<String> {
        self.bindings.lock().unwrap().get(identity).cloned()
    }

    /// Reports recorded for `identity`, oldest first.
    pub fn reports(&self, identity: &ResourceIdentity) -> Vec<SyncReport> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == identity)
            .map(|(_, report)| report.clone())
            .collect()
    }

    pub fn last_report(&self, identity: &ResourceIdentity) -> Option<SyncReport> {
        self.reports(identity).pop()
    }

    pub fn declare(&self, identity: ResourceIdentity, url: &str) {
        self.declarations.lock().unwrap().push(Declaration {
            identity,
            url: url.to_string(),
        });
    }

    pub fn set_namespace_annotations(&self, namespace: &str, annotations: &[(&str, &str)]) {
        self.namespaces.lock().unwrap().insert(
            namespace.to_string(),
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_record(&self, fail: bool) {
        self.fail_record.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl BindingStore for InMemoryCluster {
    async fn lookup(&self, identity: &ResourceIdentity) -> Result<Option<String>, ControllerError> {
        Ok(self.binding(identity))
    }

    async fn record(&self, identity: &ResourceIdentity, report: &SyncReport) -> Result<(), ControllerError> {
        if self.fail_record.load(Ordering::SeqCst) {
            return Err(ControllerError::Watch("injected record failure".to_string()));
        }
        if let Some(monitor_id) = &report.monitor_id {
            self.bind(identity, monitor_id);
        }
        self.reports.lock().unwrap().push((identity.clone(), report.clone()));
        Ok(())
    }

    async fn release(&self, identity: &ResourceIdentity) -> Result<(), ControllerError> {
        self.bindings.lock().unwrap().remove(identity);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClusterInventory for InMemoryCluster {
    async fn namespace_annotations(
        &self,
        namespace: &str,
    ) -> Result<Option<BTreeMap<String, String>>, ControllerError> {
        Ok(self.namespaces.lock().unwrap().get(namespace).cloned())
    }

    async fn declarations(
        &self,
        namespace: &str,
        kind: ResourceKind,
    ) -> Result<Vec<Declaration>, ControllerError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ControllerError::Watch("injected listing failure".to_string()));
        }
        Ok(self
            .declarations
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.identity.namespace == namespace && d.identity.kind == kind)
            .cloned()
            .collect())
    }
}

/// Reconciler wired to a mock Lunalytics and an in-memory cluster.
pub fn create_test_reconciler(
    policy: MonitoringPolicy,
) -> (Reconciler, MockLunalyticsClient, Arc<InMemoryCluster>) {
    let client = MockLunalyticsClient::new("http://lunalytics.test");
    let cluster = Arc::new(InMemoryCluster::new());
    let reconciler = Reconciler::new(client.clone(), cluster.clone(), cluster.clone(), policy);
    (reconciler, client, cluster)
}

/// Like [`create_test_reconciler`] with the mock behind a [`RetryingClient`]
/// allowing three attempts and aborting waits when `cancel` fires.
pub fn create_retrying_test_reconciler(
    cancel: CancellationToken,
) -> (Reconciler, MockLunalyticsClient, Arc<InMemoryCluster>) {
    let client = MockLunalyticsClient::new("http://lunalytics.test");
    let cluster = Arc::new(InMemoryCluster::new());
    let retrying = RetryingClient::new(
        client.clone(),
        RetryPolicy::new(3, 2.0, Duration::from_secs(300)),
        cancel,
    );
    let reconciler = Reconciler::new(retrying, cluster.clone(), cluster.clone(), MonitoringPolicy::default());
    (reconciler, client, cluster)
}
