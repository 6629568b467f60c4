//! Manifest-backed topology provider.
//!
//! # Responsibilities
//! - Read a point-in-time dump of cluster objects (services, ingresses, aliases)
//! - Keep only objects opted in through the annotation prefix
//! - Normalize them into a validated `Snapshot`
//!
//! # Design Decisions
//! - The file is re-read on every fetch; no state is carried between ticks
//! - Any malformed object fails the whole fetch, so a half-understood cluster
//!   never reaches the renderer

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::topology::{
    Endpoint, HttpService, HttpServiceGroup, Snapshot, TcpService, TopologyProvider,
};

/// Annotation suffix that turns a service into a TCP listener.
pub const LISTEN_PORT_ANNOTATION: &str = "listen-port";

/// Raw cluster objects as written in the manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Alias host name -> `"{ingress}.{namespace}"`.
    pub aliases: BTreeMap<String, String>,
    pub services: Vec<ServiceObject>,
    pub ingresses: Vec<IngressObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceObject {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub target_port: u16,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub endpoints: Vec<EndpointObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointObject {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngressObject {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub rules: Vec<IngressRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngressRule {
    #[serde(default)]
    pub path: String,
    pub service: String,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::TopologyFetch(format!("invalid manifest: {}", e)))
    }

    /// Normalize opted-in objects into a snapshot.
    pub fn to_snapshot(&self, annotation_prefix: &str) -> Result<Snapshot> {
        let prefix = format!("{}/", annotation_prefix.trim_end_matches('/'));
        let opted_in = |annotations: &BTreeMap<String, String>| {
            annotations.keys().any(|k| k.starts_with(&prefix))
        };

        let mut tcp_services = Vec::new();
        for svc in self.services.iter().filter(|s| opted_in(&s.annotations)) {
            let key = format!("{}{}", prefix, LISTEN_PORT_ANNOTATION);
            let Some(raw) = svc.annotations.get(&key) else {
                continue;
            };
            let listen_port: u16 = raw.trim().parse().map_err(|_| {
                Error::TopologyFetch(format!(
                    "service {}/{} has invalid {} annotation {:?}",
                    svc.namespace, svc.name, key, raw
                ))
            })?;
            tcp_services.push(TcpService {
                namespace: svc.namespace.clone(),
                name: svc.name.clone(),
                listen_port,
                target_port: svc.target_port,
                endpoints: endpoints(svc),
            });
        }

        let mut http_groups = Vec::new();
        for ing in self.ingresses.iter().filter(|i| opted_in(&i.annotations)) {
            let mut services = Vec::with_capacity(ing.rules.len());
            for rule in &ing.rules {
                let backend = self
                    .services
                    .iter()
                    .find(|s| s.namespace == ing.namespace && s.name == rule.service)
                    .ok_or_else(|| {
                        Error::TopologyFetch(format!(
                            "ingress {}/{} routes {:?} to unknown service {}",
                            ing.namespace, ing.name, rule.path, rule.service
                        ))
                    })?;
                services.push(HttpService {
                    namespace: ing.namespace.clone(),
                    name: backend.name.clone(),
                    path: rule.path.clone(),
                    target_port: backend.target_port,
                    endpoints: endpoints(backend),
                });
            }

            http_groups.push(HttpServiceGroup {
                name: ing.name.clone(),
                namespace: ing.namespace.clone(),
                aliases: self.aliases_for(&ing.name, &ing.namespace),
                services,
            });
        }

        Ok(Snapshot::new(http_groups, tcp_services)?)
    }

    /// Every alias pointing at `{name}.{namespace}`.
    fn aliases_for(&self, name: &str, namespace: &str) -> BTreeSet<String> {
        let target = format!("{}.{}", name, namespace);
        self.aliases
            .iter()
            .filter(|(_, v)| **v == target)
            .map(|(k, _)| k.clone())
            .collect()
    }
}

fn endpoints(svc: &ServiceObject) -> Vec<Endpoint> {
    svc.endpoints
        .iter()
        .map(|e| Endpoint::new(e.name.clone(), e.address.clone(), e.port))
        .collect()
}

/// Reads the manifest from disk on every fetch.
#[derive(Debug, Clone)]
pub struct ManifestProvider {
    path: PathBuf,
    annotation_prefix: String,
}

impl ManifestProvider {
    pub fn new(path: &Path, annotation_prefix: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            annotation_prefix: annotation_prefix.into(),
        }
    }
}

#[async_trait]
impl TopologyProvider for ManifestProvider {
    async fn fetch_topology(&self) -> Result<Snapshot> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::TopologyFetch(format!("reading manifest {:?}: {}", self.path, e))
        })?;
        let manifest = Manifest::parse(&content)?;
        let snapshot = manifest.to_snapshot(&self.annotation_prefix)?;

        tracing::debug!(
            path = ?self.path,
            http_groups = snapshot.http_groups().len(),
            tcp_services = snapshot.tcp_services().len(),
            "Topology fetched"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "gateway.example.com";

    const MANIFEST: &str = r#"
[aliases]
"apps.example.com" = "ing1.svc1"
"other.example.com" = "ing2.svc1"

[[services]]
namespace = "svc1"
name = "web"
target_port = 8080
endpoints = [
    { name = "web-1", address = "10.1.0.1" },
    { name = "web-2", address = "10.1.0.2", port = 9090 },
]

[[services]]
namespace = "svc1"
name = "api"
endpoints = [{ name = "api-1", address = "10.1.1.1", port = 7000 }]

[[services]]
namespace = "ns1"
name = "redis"
annotations = { "gateway.example.com/listen-port" = "6379" }
endpoints = [{ name = "redis-0", address = "10.2.0.1", port = 6379 }]

[[services]]
namespace = "ns1"
name = "ignored"
annotations = { "unrelated.io/listen-port" = "7000" }

[[ingresses]]
namespace = "svc1"
name = "ing1"
annotations = { "gateway.example.com/enabled" = "true" }
rules = [
    { path = "/", service = "web" },
    { path = "/v0", service = "api" },
]

[[ingresses]]
namespace = "svc1"
name = "not-opted-in"
rules = [{ service = "web" }]
"#;

    #[test]
    fn test_normalizes_opted_in_objects() {
        let snapshot = Manifest::parse(MANIFEST).unwrap().to_snapshot(PREFIX).unwrap();

        assert_eq!(snapshot.tcp_services().len(), 1);
        let redis = &snapshot.tcp_services()[0];
        assert_eq!(redis.upstream_name(), "ns1__redis");
        assert_eq!(redis.listen_port, 6379);

        assert_eq!(snapshot.http_groups().len(), 1);
        let group = &snapshot.http_groups()[0];
        assert_eq!(group.name, "ing1");
        assert_eq!(group.aliases.iter().collect::<Vec<_>>(), vec!["apps.example.com"]);
        assert_eq!(group.services[0].name, "web");
        assert_eq!(group.services[0].target_port, 8080);
        assert_eq!(group.services[0].endpoints[1].port, 9090);
        assert_eq!(group.services[1].path, "/v0");
    }

    #[test]
    fn test_unknown_backend_service_is_malformed() {
        let manifest = Manifest::parse(
            r#"
[[ingresses]]
namespace = "a"
name = "b"
annotations = { "gateway.example.com/enabled" = "true" }
rules = [{ path = "/", service = "missing" }]
"#,
        )
        .unwrap();
        let err = manifest.to_snapshot(PREFIX).unwrap_err();
        assert!(err.to_string().contains("unknown service missing"));
    }

    #[test]
    fn test_invalid_listen_port_is_malformed() {
        let manifest = Manifest::parse(
            r#"
[[services]]
namespace = "a"
name = "b"
annotations = { "gateway.example.com/listen-port" = "http" }
"#,
        )
        .unwrap();
        assert!(matches!(manifest.to_snapshot(PREFIX), Err(Error::TopologyFetch(_))));
    }

    #[test]
    fn test_listen_port_collision_fails_fetch() {
        let manifest = Manifest::parse(
            r#"
[[services]]
namespace = "a"
name = "one"
annotations = { "gateway.example.com/listen-port" = "19822" }

[[services]]
namespace = "b"
name = "two"
annotations = { "gateway.example.com/listen-port" = "19822" }
"#,
        )
        .unwrap();
        let err = manifest.to_snapshot(PREFIX).unwrap_err();
        assert!(err.to_string().contains("19822"));
    }

    #[tokio::test]
    async fn test_provider_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.toml");
        std::fs::write(&path, MANIFEST).unwrap();

        let provider = ManifestProvider::new(&path, PREFIX);
        let first = provider.fetch_topology().await.unwrap();
        let second = provider.fetch_topology().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_provider_missing_file() {
        let provider = ManifestProvider::new(Path::new("/nonexistent/cluster.toml"), PREFIX);
        assert!(matches!(provider.fetch_topology().await, Err(Error::TopologyFetch(_))));
    }
}
