//! Namespace participation policy.

use std::collections::{BTreeMap, BTreeSet};

/// Default namespace annotation consulted by the `annotation` strategy.
pub const DEFAULT_ANNOTATION_KEY: &str = "lunalytics.io/enabled";
/// Default value the `annotation` strategy expects.
pub const DEFAULT_ANNOTATION_VALUE: &str = "true";

/// Which namespaces the operator reconciles resources in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceFilterPolicy {
    /// Every namespace
    #[default]
    All,
    /// Only the listed namespaces
    List(BTreeSet<String>),
    /// Namespaces whose own annotations carry `key: value`
    Annotation { key: String, value: String },
    /// A strategy name nobody recognised; nothing is monitored
    Unrecognized(String),
}

impl NamespaceFilterPolicy {
    /// Builds a policy from its configuration parts.
    pub fn from_parts(
        strategy: &str,
        namespaces: Vec<String>,
        annotation_key: Option<String>,
        annotation_value: Option<String>,
    ) -> Self {
        match strategy.trim().to_ascii_lowercase().as_str() {
            "all" | "" => NamespaceFilterPolicy::All,
            "list" => NamespaceFilterPolicy::List(namespaces.into_iter().collect()),
            "annotation" => NamespaceFilterPolicy::Annotation {
                key: annotation_key.unwrap_or_else(|| DEFAULT_ANNOTATION_KEY.to_string()),
                value: annotation_value.unwrap_or_else(|| DEFAULT_ANNOTATION_VALUE.to_string()),
            },
            other => NamespaceFilterPolicy::Unrecognized(other.to_string()),
        }
    }

    /// Whether deciding needs the namespace's annotations.
    pub fn needs_namespace_annotations(&self) -> bool {
        matches!(self, NamespaceFilterPolicy::Annotation { .. })
    }

    /// Decides whether resources in `namespace` participate.
    pub fn is_monitored(&self, namespace: &str, annotations: Option<&BTreeMap<String, String>>) -> bool {
        match self {
            NamespaceFilterPolicy::All => true,
            NamespaceFilterPolicy::List(namespaces) => namespaces.contains(namespace),
            NamespaceFilterPolicy::Annotation { key, value } => annotations
                .and_then(|a| a.get(key))
                .is_some_and(|v| v == value),
            NamespaceFilterPolicy::Unrecognized(_) => false,
        }
    }
}
