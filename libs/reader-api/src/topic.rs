use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TENANT: &str = "public";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Storage domain of a topic: the `<domain>://` prefix of its full name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicDomain {
    Persistent,
    NonPersistent,
}

impl TopicDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicDomain::Persistent => "persistent",
            TopicDomain::NonPersistent => "non-persistent",
        }
    }
}

impl fmt::Display for TopicDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicNameError {
    #[error("topic name is empty")]
    Empty,

    #[error("unknown topic domain '{0}' (expected 'persistent' or 'non-persistent')")]
    UnknownDomain(String),

    #[error("invalid topic name '{0}': expected <name>, <tenant>/<namespace>/<name> or <domain>://<tenant>/<namespace>/<name>")]
    InvalidFormat(String),
}

/// Fully-qualified topic name.
///
/// Short names are expanded on parse:
/// - `my-topic` → `persistent://public/default/my-topic`
/// - `acme/orders/my-topic` → `persistent://acme/orders/my-topic`
///
/// Names that already carry a domain are kept as they are, including the
/// legacy four-segment form `<domain>://<tenant>/<cluster>/<namespace>/<name>`.
/// Parsing an already-qualified name yields the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicName {
    full: String,
    domain: TopicDomain,
    tenant: String,
    cluster: Option<String>,
    namespace: String,
    local_name: String,
}

impl TopicName {
    pub fn parse(name: &str) -> Result<Self, TopicNameError> {
        if name.trim().is_empty() {
            return Err(TopicNameError::Empty);
        }

        let (domain, rest) = match name.split_once("://") {
            Some((domain, rest)) => {
                let domain = match domain {
                    "persistent" => TopicDomain::Persistent,
                    "non-persistent" => TopicDomain::NonPersistent,
                    other => return Err(TopicNameError::UnknownDomain(other.to_string())),
                };
                (Some(domain), rest)
            }
            None => (None, name),
        };

        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(TopicNameError::InvalidFormat(name.to_string()));
        }

        let (tenant, cluster, namespace, local_name) = match (domain, segments.as_slice()) {
            (None, [local]) => (DEFAULT_TENANT, None, DEFAULT_NAMESPACE, *local),
            (_, [tenant, namespace, local]) => (*tenant, None, *namespace, *local),
            (Some(_), [tenant, cluster, namespace, local]) => {
                (*tenant, Some(*cluster), *namespace, *local)
            }
            _ => return Err(TopicNameError::InvalidFormat(name.to_string())),
        };

        let domain = domain.unwrap_or(TopicDomain::Persistent);
        let full = match cluster {
            Some(cluster) => format!("{domain}://{tenant}/{cluster}/{namespace}/{local_name}"),
            None => format!("{domain}://{tenant}/{namespace}/{local_name}"),
        };

        Ok(Self {
            full,
            domain,
            tenant: tenant.to_string(),
            cluster: cluster.map(str::to_string),
            namespace: namespace.to_string(),
            local_name: local_name.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }

    pub fn domain(&self) -> TopicDomain {
        self.domain
    }

    pub fn is_persistent(&self) -> bool {
        self.domain == TopicDomain::Persistent
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Cluster segment of a legacy four-segment name.
    pub fn cluster(&self) -> Option<&str> {
        self.cluster.as_deref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl FromStr for TopicName {
    type Err = TopicNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for TopicName {
    fn as_ref(&self) -> &str {
        &self.full
    }
}

impl Serialize for TopicName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.full)
    }
}

impl<'de> Deserialize<'de> for TopicName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TopicName::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_gets_default_tenant_and_namespace() {
        let topic = TopicName::parse("my-topic").unwrap();
        assert_eq!(topic.as_str(), "persistent://public/default/my-topic");
        assert_eq!(topic.tenant(), "public");
        assert_eq!(topic.namespace(), "default");
        assert_eq!(topic.local_name(), "my-topic");
        assert!(topic.is_persistent());
    }

    #[test]
    fn three_segment_name_gets_persistent_domain() {
        let topic = TopicName::parse("acme/orders/created").unwrap();
        assert_eq!(topic.as_str(), "persistent://acme/orders/created");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "my-topic",
            "acme/orders/created",
            "non-persistent://public/default/ticks",
            "persistent://acme/us-west/orders/created",
        ] {
            let once = TopicName::parse(raw).unwrap();
            let twice = TopicName::parse(once.as_str()).unwrap();
            assert_eq!(once, twice, "{raw}");
        }
    }

    #[test]
    fn legacy_cluster_segment_is_kept() {
        let topic = TopicName::parse("persistent://acme/us-west/orders/created").unwrap();
        assert_eq!(topic.cluster(), Some("us-west"));
        assert_eq!(topic.namespace(), "orders");
        assert_eq!(topic.local_name(), "created");
    }

    #[test]
    fn non_persistent_domain() {
        let topic = TopicName::parse("non-persistent://public/default/ticks").unwrap();
        assert_eq!(topic.domain(), TopicDomain::NonPersistent);
        assert!(!topic.is_persistent());
    }

    #[test]
    fn rejects_malformed_names() {
        assert_eq!(TopicName::parse(""), Err(TopicNameError::Empty));
        assert!(matches!(
            TopicName::parse("kafka://public/default/t"),
            Err(TopicNameError::UnknownDomain(d)) if d == "kafka"
        ));
        assert!(matches!(TopicName::parse("a/b"), Err(TopicNameError::InvalidFormat(_))));
        assert!(matches!(TopicName::parse("a//b"), Err(TopicNameError::InvalidFormat(_))));
        assert!(matches!(
            TopicName::parse("persistent://public/default/"),
            Err(TopicNameError::InvalidFormat(_))
        ));
        assert!(matches!(
            TopicName::parse("a/b/c/d"),
            Err(TopicNameError::InvalidFormat(_))
        ));
    }

    #[test]
    fn rejects_blank_names_and_segments() {
        assert_eq!(TopicName::parse("   "), Err(TopicNameError::Empty));
        assert_eq!(TopicName::parse("\t\n"), Err(TopicNameError::Empty));
        assert!(matches!(
            TopicName::parse("public/ /orders"),
            Err(TopicNameError::InvalidFormat(_))
        ));
        assert!(matches!(
            TopicName::parse("persistent://public/default/  "),
            Err(TopicNameError::InvalidFormat(_))
        ));
    }
}
