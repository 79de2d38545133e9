//! Unit tests for the reconciler

use super::*;
use crate::binding::SyncState;
use crate::namespace_filter::NamespaceFilterPolicy;
use crate::resource::EventKind;
use crate::test_utils::*;
use tokio_util::sync::CancellationToken;

const ENABLED: (&str, &str) = ("lunalytics.io/enabled", "true");

fn ingress_identity(name: &str) -> ResourceIdentity {
    ResourceIdentity::new(ResourceKind::Ingress, "prod", name)
}

fn monitor_identity(name: &str) -> ResourceIdentity {
    ResourceIdentity::new(ResourceKind::Monitor, "prod", name)
}

fn web_ingress(annotations: &[(&str, &str)]) -> MonitorEvent {
    let ingress = create_test_ingress("web", "prod", Some(("example.com", Some("/health"))), true, annotations);
    MonitorEvent::new(EventKind::Upsert, ObservedResource::Ingress(ingress))
}

fn with_kind(event: MonitorEvent, kind: EventKind) -> MonitorEvent {
    MonitorEvent::new(kind, event.resource)
}

fn unavailable() -> LunalyticsError {
    LunalyticsError::from_status(503, "unavailable".to_string())
}

fn server_error() -> LunalyticsError {
    LunalyticsError::Server {
        status: 500,
        message: "boom".to_string(),
    }
}

#[tokio::test]
async fn test_ingress_upsert_creates_and_binds() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());

    let outcome = reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap();
    let Outcome::Created(id) = outcome else {
        panic!("expected Created");
    };

    let monitor = client.monitor(&id).expect("monitor stored");
    assert_eq!(monitor.name, "Ingress/web");
    assert_eq!(monitor.url, "https://example.com/health");
    assert_eq!(monitor.method, "GET");
    assert_eq!(monitor.interval, 30);
    assert_eq!(monitor.valid_status_codes, vec!["200-299".to_string()]);

    assert_eq!(cluster.binding(&ingress_identity("web")), Some(id.clone()));
    let report = cluster.last_report(&ingress_identity("web")).unwrap();
    assert_eq!(report.state, SyncState::Active);
    assert_eq!(report.message, "Monitor created successfully");
    assert!(report.binding_changed);
    assert_eq!(report.stats.unwrap().uptime_percentage, 100.0);
}

#[tokio::test]
async fn test_repeated_upsert_updates_in_place() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    let event = web_ingress(&[ENABLED]);

    let Outcome::Created(id) = reconciler.reconcile(&event).await.unwrap() else {
        panic!("first pass should create");
    };
    let outcome = reconciler.reconcile(&event).await.unwrap();

    assert_eq!(outcome, Outcome::Updated(id.clone()));
    assert_eq!(client.add_calls(), 1);
    assert_eq!(client.edit_calls(), 1);
    assert_eq!(client.monitor_count(), 1);
    let report = cluster.last_report(&ingress_identity("web")).unwrap();
    assert_eq!(report.message, "Monitor updated successfully");
    assert!(!report.binding_changed);
}

#[tokio::test]
async fn test_missing_monitor_is_recreated() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    let event = web_ingress(&[ENABLED]);

    let Outcome::Created(old) = reconciler.reconcile(&event).await.unwrap() else {
        panic!("first pass should create");
    };
    client.remove_monitor(&old);

    let Outcome::Recreated(new) = reconciler.reconcile(&event).await.unwrap() else {
        panic!("second pass should recreate");
    };
    assert_ne!(old, new);
    assert_eq!(cluster.binding(&ingress_identity("web")), Some(new));
    assert_eq!(client.edit_calls(), 0);
}

#[tokio::test]
async fn test_explicit_annotations_override_defaults() {
    let (reconciler, client, _cluster) = create_test_reconciler(MonitoringPolicy::default());
    let service = create_test_service(
        "api",
        "prod",
        Some((8080, None)),
        &[
            ENABLED,
            ("lunalytics.io/url", "https://api.example.com/ping"),
            ("lunalytics.io/name", "API"),
            ("lunalytics.io/method", "head"),
            ("lunalytics.io/interval", "60"),
            ("lunalytics.io/valid-status-codes", "200, 301-302"),
        ],
    );

    let outcome = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Upsert, ObservedResource::Service(service)))
        .await
        .unwrap();
    let Outcome::Created(id) = outcome else {
        panic!("expected Created");
    };

    let monitor = client.monitor(&id).unwrap();
    assert_eq!(monitor.name, "API");
    assert_eq!(monitor.url, "https://api.example.com/ping");
    assert_eq!(monitor.method, "HEAD");
    assert_eq!(monitor.interval, 60);
    assert_eq!(monitor.retry_interval, 30);
    assert_eq!(monitor.valid_status_codes, vec!["200".to_string(), "301-302".to_string()]);
}

#[tokio::test]
async fn test_service_url_is_derived_from_first_port() {
    let (reconciler, client, _cluster) = create_test_reconciler(MonitoringPolicy::default());
    let service = create_test_service("api", "prod", Some((8443, Some("https"))), &[ENABLED]);

    let Outcome::Created(id) = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Upsert, ObservedResource::Service(service)))
        .await
        .unwrap()
    else {
        panic!("expected Created");
    };
    assert_eq!(client.monitor(&id).unwrap().url, "https://api.prod.svc.cluster.local:8443/");
}

#[tokio::test]
async fn test_not_enabled_is_skipped() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());

    for annotations in [&[][..], &[("lunalytics.io/enabled", "false")][..]] {
        let outcome = reconciler.reconcile(&web_ingress(annotations)).await.unwrap();
        assert_eq!(outcome, Outcome::Skipped);
    }
    assert!(client.calls().is_empty());
    assert!(cluster.reports(&ingress_identity("web")).is_empty());
}

#[tokio::test]
async fn test_enabled_is_case_insensitive() {
    let (reconciler, _client, _cluster) = create_test_reconciler(MonitoringPolicy::default());
    let outcome = reconciler
        .reconcile(&web_ingress(&[("lunalytics.io/enabled", "TRUE")]))
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Created(_)));
}

#[tokio::test]
async fn test_unresolvable_url_is_skipped() {
    let (reconciler, client, _cluster) = create_test_reconciler(MonitoringPolicy::default());
    let ingress = create_test_ingress("web", "prod", None, false, &[ENABLED]);

    let outcome = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Upsert, ObservedResource::Ingress(ingress)))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Skipped);
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_configuration_is_reported_without_api_calls() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    let event = web_ingress(&[
        ENABLED,
        ("lunalytics.io/interval", "0"),
        ("lunalytics.io/valid-status-codes", "2xx"),
    ]);

    let Outcome::Invalid(errors) = reconciler.reconcile(&event).await.unwrap() else {
        panic!("expected Invalid");
    };
    assert!(errors.contains(&"interval must be a positive integer".to_string()));
    assert!(errors.contains(&"Invalid status code format: 2xx".to_string()));
    assert!(client.calls().is_empty());

    let report = cluster.last_report(&ingress_identity("web")).unwrap();
    assert_eq!(report.state, SyncState::Error);
    assert!(report.message.starts_with("Validation failed: "));
    assert_eq!(cluster.binding(&ingress_identity("web")), None);
}

#[tokio::test]
async fn test_namespace_list_filter() {
    let policy = MonitoringPolicy {
        namespace_filter: NamespaceFilterPolicy::List(["prod".to_string()].into()),
        ..Default::default()
    };
    let (reconciler, client, _cluster) = create_test_reconciler(policy);

    let dev = create_test_ingress("web", "dev", Some(("example.com", None)), false, &[ENABLED]);
    let outcome = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Upsert, ObservedResource::Ingress(dev)))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Skipped);
    assert!(client.calls().is_empty());

    let outcome = reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap();
    assert!(matches!(outcome, Outcome::Created(_)));
}

#[tokio::test]
async fn test_namespace_annotation_filter() {
    let policy = MonitoringPolicy {
        namespace_filter: NamespaceFilterPolicy::from_parts("annotation", Vec::new(), None, None),
        ..Default::default()
    };
    let (reconciler, _client, cluster) = create_test_reconciler(policy);

    assert_eq!(reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap(), Outcome::Skipped);

    cluster.set_namespace_annotations("prod", &[("lunalytics.io/enabled", "true")]);
    let outcome = reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap();
    assert!(matches!(outcome, Outcome::Created(_)));
}

#[tokio::test]
async fn test_annotation_wins_and_marks_monitor_resource() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    cluster.declare(monitor_identity("web-check"), "https://example.com/health");

    let outcome = reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap();
    assert!(matches!(outcome, Outcome::Created(_)));
    assert_eq!(client.add_calls(), 1);

    let report = cluster.last_report(&monitor_identity("web-check")).unwrap();
    assert_eq!(report.state, SyncState::Conflict);
    assert_eq!(
        report.message,
        "Conflict: Ingress annotation takes precedence for URL https://example.com/health"
    );
}

#[tokio::test]
async fn test_monitor_resource_yields_to_annotation() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    cluster.declare(ingress_identity("web"), "https://example.com/health");
    let monitor = create_test_monitor("web-check", "prod", "https://example.com/health", None);

    let outcome = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Upsert, ObservedResource::Monitor(monitor)))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Conflict(ingress_identity("web")));
    assert!(client.calls().is_empty());
    let report = cluster.last_report(&monitor_identity("web-check")).unwrap();
    assert_eq!(report.state, SyncState::Conflict);
    assert_eq!(cluster.binding(&monitor_identity("web-check")), None);
}

#[tokio::test]
async fn test_duplicate_handling_disabled_allows_both() {
    let policy = MonitoringPolicy {
        duplicate_handling: DuplicateHandling::Disabled,
        ..Default::default()
    };
    let (reconciler, client, cluster) = create_test_reconciler(policy);
    cluster.declare(ingress_identity("web"), "https://example.com/health");
    let monitor = create_test_monitor("web-check", "prod", "https://example.com/health", None);

    let outcome = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Upsert, ObservedResource::Monitor(monitor)))
        .await
        .unwrap();
    let Outcome::Created(id) = outcome else {
        panic!("expected Created");
    };
    assert_eq!(client.monitor(&id).unwrap().name, "Monitor/web-check");
}

#[tokio::test]
async fn test_create_failure_is_reported() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    client.fail_next("add_monitor", server_error());

    let Outcome::Failed(message) = reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap() else {
        panic!("expected Failed");
    };
    assert!(message.starts_with("Lunalytics API error: "));
    assert_eq!(client.monitor_count(), 0);
    assert_eq!(cluster.binding(&ingress_identity("web")), None);
    assert_eq!(cluster.last_report(&ingress_identity("web")).unwrap().state, SyncState::Error);
}

#[tokio::test(start_paused = true)]
async fn test_transient_create_failures_are_retried() {
    let (reconciler, client, cluster) = create_retrying_test_reconciler(CancellationToken::new());
    client.fail_next("add_monitor", unavailable());
    client.fail_next("add_monitor", unavailable());

    let Outcome::Created(id) = reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap() else {
        panic!("expected Created");
    };
    assert_eq!(client.add_calls(), 3);
    assert_eq!(cluster.binding(&ingress_identity("web")), Some(id));
    assert_eq!(cluster.reports(&ingress_identity("web")).len(), 1);
    assert_eq!(cluster.last_report(&ingress_identity("web")).unwrap().state, SyncState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_retry_records_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (reconciler, client, cluster) = create_retrying_test_reconciler(cancel);
    client.fail_next("add_monitor", unavailable());

    let outcome = reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap();

    assert_eq!(outcome, Outcome::Interrupted);
    assert_eq!(client.add_calls(), 1);
    assert!(cluster.reports(&ingress_identity("web")).is_empty());
    assert_eq!(cluster.binding(&ingress_identity("web")), None);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_resume_or_delete_keeps_state() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (reconciler, client, cluster) = create_retrying_test_reconciler(cancel);
    let monitor = create_test_monitor("web-check", "prod", "https://example.com/", Some("m-1"));
    cluster.bind(&monitor_identity("web-check"), "m-1");
    client.fail_next("get_monitor", unavailable());
    client.fail_next("delete_monitor", unavailable());

    let resumed = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Resume, ObservedResource::Monitor(monitor.clone())))
        .await
        .unwrap();
    let deleted = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Delete, ObservedResource::Monitor(monitor)))
        .await
        .unwrap();

    assert_eq!(resumed, Outcome::Interrupted);
    assert_eq!(deleted, Outcome::Interrupted);
    assert!(cluster.reports(&monitor_identity("web-check")).is_empty());
    assert_eq!(cluster.binding(&monitor_identity("web-check")), Some("m-1".to_string()));
}

#[tokio::test]
async fn test_lookup_error_does_not_create() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    cluster.bind(&ingress_identity("web"), "m-1");
    client.fail_next("get_monitor", server_error());

    let outcome = reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap();
    assert!(matches!(outcome, Outcome::Failed(_)));
    assert_eq!(client.add_calls(), 0);
    assert_eq!(cluster.binding(&ingress_identity("web")), Some("m-1".to_string()));
}

#[tokio::test]
async fn test_binding_write_failure_keeps_created_monitor() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    cluster.fail_record(true);

    let Outcome::Created(id) = reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap() else {
        panic!("expected Created");
    };
    assert!(client.monitor(&id).is_some());
    assert_eq!(client.delete_calls(), 0);
    assert_eq!(cluster.binding(&ingress_identity("web")), None);
}

#[tokio::test]
async fn test_delete_removes_bound_monitor() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    let Outcome::Created(id) = reconciler.reconcile(&web_ingress(&[ENABLED])).await.unwrap() else {
        panic!("expected Created");
    };

    let deleted = web_ingress(&[ENABLED, ("lunalytics.io/monitor-id", id.as_str())]);
    let outcome = reconciler.reconcile(&with_kind(deleted, EventKind::Delete)).await.unwrap();

    assert_eq!(outcome, Outcome::Deleted(id));
    assert_eq!(client.monitor_count(), 0);
    assert_eq!(cluster.binding(&ingress_identity("web")), None);
}

#[tokio::test]
async fn test_delete_of_missing_monitor_succeeds() {
    let (reconciler, client, _cluster) = create_test_reconciler(MonitoringPolicy::default());
    let deleted = web_ingress(&[ENABLED, ("lunalytics.io/monitor-id", "gone")]);

    let outcome = reconciler.reconcile(&with_kind(deleted, EventKind::Delete)).await.unwrap();
    assert_eq!(outcome, Outcome::Deleted("gone".to_string()));
    assert_eq!(client.delete_calls(), 1);
}

#[tokio::test]
async fn test_delete_without_binding_is_noop() {
    let (reconciler, client, _cluster) = create_test_reconciler(MonitoringPolicy::default());
    let outcome = reconciler
        .reconcile(&with_kind(web_ingress(&[ENABLED]), EventKind::Delete))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Skipped);
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_delete_failure_is_reported_not_raised() {
    let (reconciler, client, _cluster) = create_test_reconciler(MonitoringPolicy::default());
    client.fail_next("delete_monitor", server_error());
    let monitor = create_test_monitor("web-check", "prod", "https://example.com/", Some("m-1"));

    let outcome = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Delete, ObservedResource::Monitor(monitor)))
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Failed(_)));
    assert_eq!(client.calls(), vec![lunalytics_client::MockCall::Delete("m-1".to_string())]);
}

#[tokio::test]
async fn test_resume_refreshes_statistics() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    let event = web_ingress(&[ENABLED]);
    let Outcome::Created(id) = reconciler.reconcile(&event).await.unwrap() else {
        panic!("expected Created");
    };
    client.set_stats(&id, 99.5, 42.0);

    let outcome = reconciler.reconcile(&with_kind(event, EventKind::Resume)).await.unwrap();
    assert_eq!(outcome, Outcome::Refreshed(id));
    assert_eq!(client.add_calls(), 1);
    assert_eq!(client.edit_calls(), 0);

    let report = cluster.last_report(&ingress_identity("web")).unwrap();
    assert_eq!(report.message, "Monitor validated successfully");
    let stats = report.stats.unwrap();
    assert_eq!(stats.uptime_percentage, 99.5);
    assert_eq!(stats.average_latency, 42.0);
}

#[tokio::test]
async fn test_resume_of_missing_monitor_marks_stale() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    cluster.bind(&monitor_identity("web-check"), "gone");
    let monitor = create_test_monitor("web-check", "prod", "https://example.com/", Some("gone"));

    let outcome = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Resume, ObservedResource::Monitor(monitor)))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Stale("gone".to_string()));
    assert_eq!(client.add_calls(), 0);
    let report = cluster.last_report(&monitor_identity("web-check")).unwrap();
    assert_eq!(report.state, SyncState::Error);
    assert_eq!(report.message, "Monitor not found in Lunalytics");
}

#[tokio::test]
async fn test_resume_without_binding_is_noop() {
    let (reconciler, client, _cluster) = create_test_reconciler(MonitoringPolicy::default());
    let outcome = reconciler
        .reconcile(&with_kind(web_ingress(&[ENABLED]), EventKind::Resume))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Skipped);
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_monitor_resource_uses_spec_fields() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    let mut monitor = create_test_monitor("web-check", "prod", "http://example.com/", None);
    monitor.spec.method = Some("post".to_string());
    monitor.spec.request_timeout = Some(10);

    let Outcome::Created(id) = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Upsert, ObservedResource::Monitor(monitor)))
        .await
        .unwrap()
    else {
        panic!("expected Created");
    };

    let stored = client.monitor(&id).unwrap();
    assert_eq!(stored.name, "Monitor/web-check");
    assert_eq!(stored.method, "POST");
    assert_eq!(stored.request_timeout, 10);
    assert_eq!(cluster.binding(&monitor_identity("web-check")), Some(id));
}

#[test]
fn test_monitor_declaration_leaves_blank_url_unset() {
    let monitor = create_test_monitor("web-check", "prod", "  ", None);
    let Declared::Spec(partial) = monitor_desired_spec(&monitor) else {
        panic!("expected a declared spec");
    };
    assert_eq!(partial.url, None);
    assert_eq!(partial.name.as_deref(), Some("Monitor/web-check"));
}

#[tokio::test]
async fn test_monitor_without_url_reports_validation_error() {
    let (reconciler, client, cluster) = create_test_reconciler(MonitoringPolicy::default());
    let monitor = create_test_monitor("web-check", "prod", "", None);

    let Outcome::Invalid(errors) = reconciler
        .reconcile(&MonitorEvent::new(EventKind::Upsert, ObservedResource::Monitor(monitor)))
        .await
        .unwrap()
    else {
        panic!("expected Invalid");
    };
    assert_eq!(errors, vec!["URL is required".to_string()]);
    assert!(client.calls().is_empty());

    let report = cluster.last_report(&monitor_identity("web-check")).unwrap();
    assert_eq!(report.state, SyncState::Error);
    assert_eq!(report.message, "Validation failed: URL is required");
    assert_eq!(cluster.binding(&monitor_identity("web-check")), None);
}

#[tokio::test]
async fn test_event_handler_swallows_errors() {
    let (reconciler, client, _cluster) = create_test_reconciler(MonitoringPolicy::default());
    client.fail_next("add_monitor", server_error());
    reconciler.handle(web_ingress(&[ENABLED])).await;
    assert_eq!(client.add_calls(), 1);
}
