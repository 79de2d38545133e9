//! Monitor URL derivation for resources without an explicit `lunalytics.io/url`.
//!
//! Only the first rule/path (Ingress) or first port (Service) is considered.

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use tracing::{debug, warn};

const TLS_PORT_HINTS: [&str; 3] = ["https", "ssl", "tls"];

/// `{proto}://{host}{path}` from the first rule of an Ingress.
///
/// https when the Ingress declares any TLS block. Missing rules, host or
/// paths yield `None`.
pub fn build_ingress_url(ingress: &Ingress) -> Option<String> {
    let name = ingress.metadata.name.as_deref().unwrap_or("<unknown>");
    let Some(spec) = ingress.spec.as_ref() else {
        warn!("Ingress {} has no spec", name);
        return None;
    };

    let Some(rule) = spec.rules.as_ref().and_then(|rules| rules.first()) else {
        warn!("Ingress {} has no rules", name);
        return None;
    };

    let Some(host) = rule.host.as_deref().filter(|h| !h.is_empty()) else {
        warn!("Ingress {} rule has no host", name);
        return None;
    };

    let Some(first_path) = rule.http.as_ref().and_then(|http| http.paths.first()) else {
        warn!("Ingress {} rule has no HTTP paths", name);
        return None;
    };
    let path = first_path.path.as_deref().filter(|p| !p.is_empty()).unwrap_or("/");

    let tls = spec.tls.as_ref().is_some_and(|tls| !tls.is_empty());
    let protocol = if tls { "https" } else { "http" };

    let url = format!("{}://{}{}", protocol, host, path);
    debug!("Built Ingress URL: {}", url);
    Some(url)
}

/// In-cluster DNS URL of a Service's first port.
///
/// https when the port name contains "https", "ssl" or "tls".
pub fn build_service_url(service: &Service) -> Option<String> {
    let name = service.metadata.name.as_deref()?;
    let namespace = service.metadata.namespace.as_deref().unwrap_or("default");

    let Some(port) = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
    else {
        warn!("Service {}/{} has no ports", namespace, name);
        return None;
    };

    if port.port <= 0 {
        warn!("Service {}/{} port has no port number", namespace, name);
        return None;
    }

    let port_name = port.name.as_deref().unwrap_or_default().to_ascii_lowercase();
    let protocol = if TLS_PORT_HINTS.iter().any(|hint| port_name.contains(hint)) {
        "https"
    } else {
        "http"
    };

    let url = format!(
        "{}://{}.{}.svc.cluster.local:{}/",
        protocol, name, namespace, port.port
    );
    debug!("Built Service URL: {}", url);
    Some(url)
}
