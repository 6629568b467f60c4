//! Canonical routing topology.
//!
//! # Design Decisions
//! - Every value is rebuilt from scratch on each fetch; nothing is mutated in place
//! - `Snapshot` can only be obtained through `Snapshot::new`, which enforces the
//!   routing invariants, so the renderer never sees an ambiguous topology
//! - Ordering is whatever the provider supplied; it is preserved verbatim

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::{IpAddr, Ipv6Addr};
use thiserror::Error;

/// A single routable backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// Diagnostic identifier, usually the pod name.
    pub name: String,
    /// IP address or host name.
    pub address: String,
    /// Target port; `0` means "use the service default".
    pub port: u16,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
        }
    }

    /// `address:port`, substituting `default_port` when no port is set.
    pub fn socket_addr(&self, default_port: u16) -> String {
        let port = if self.port == 0 { default_port } else { self.port };
        match self.address.parse::<Ipv6Addr>() {
            Ok(v6) => format!("[{}]:{}", v6, port),
            Err(_) => format!("{}:{}", self.address, port),
        }
    }
}

/// One path-routed unit inside a virtual host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpService {
    pub namespace: String,
    pub name: String,
    /// Request path prefix. Empty means `/`.
    pub path: String,
    /// Port used for endpoints that do not carry their own.
    pub target_port: u16,
    pub endpoints: Vec<Endpoint>,
}

impl HttpService {
    /// The nginx location this service is routed under.
    pub fn location(&self) -> &str {
        if self.path.is_empty() {
            "/"
        } else {
            &self.path
        }
    }

    /// Port substituted for endpoints with port `0`.
    pub fn default_port(&self) -> u16 {
        if self.target_port == 0 {
            80
        } else {
            self.target_port
        }
    }
}

/// A virtual host: canonical name plus aliases, routing to path-ordered services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpServiceGroup {
    pub name: String,
    pub namespace: String,
    /// Additional host names. A set, so rendering order is always sorted.
    pub aliases: BTreeSet<String>,
    pub services: Vec<HttpService>,
}

impl HttpServiceGroup {
    /// `{name}.{namespace}.{zone}`
    pub fn canonical_host(&self, cluster_zone: &str) -> String {
        format!("{}.{}.{}", self.name, self.namespace, cluster_zone)
    }

    /// `{namespace}__{group}__{service}`
    pub fn upstream_name(&self, service: &HttpService) -> String {
        format!("{}__{}__{}", self.namespace, self.name, service.name)
    }

    fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// A raw TCP listener forwarding to a pool of endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TcpService {
    pub namespace: String,
    pub name: String,
    pub listen_port: u16,
    /// Port used for endpoints that do not carry their own; `0` falls back to `listen_port`.
    pub target_port: u16,
    pub endpoints: Vec<Endpoint>,
}

impl TcpService {
    /// `{namespace}__{service}`
    pub fn upstream_name(&self) -> String {
        format!("{}__{}", self.namespace, self.name)
    }

    pub fn default_port(&self) -> u16 {
        if self.target_port == 0 {
            self.listen_port
        } else {
            self.target_port
        }
    }

    fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Invariant violations detected while assembling a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("http group {group} has no services")]
    EmptyGroup { group: String },

    #[error("http group {group} is defined more than once")]
    DuplicateGroup { group: String },

    #[error("http group {group} has unroutable path {path:?}")]
    InvalidPath { group: String, path: String },

    #[error("http group {group} routes path {path:?} more than once")]
    DuplicatePath { group: String, path: String },

    /// A cluster-supplied string that cannot be spliced into nginx.conf as-is.
    #[error("{object} has invalid {field} {value:?}")]
    InvalidValue {
        object: String,
        field: &'static str,
        value: String,
    },

    #[error("tcp listen port {port} claimed by both {first} and {second}")]
    DuplicateListenPort {
        port: u16,
        first: String,
        second: String,
    },
}

/// Paths are spliced into `location` directives and must not break out of them.
fn is_routable_path(path: &str) -> bool {
    path.starts_with('/')
        && !path
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '\'' | '"'))
}

/// Object names become upstream identifiers and comments: `[A-Za-z0-9._-]+`.
fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// RFC 1123 host name, optionally with a leading `*.` wildcard label.
fn is_hostname(host: &str) -> bool {
    let host = host.strip_prefix("*.").unwrap_or(host);
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn is_endpoint_address(address: &str) -> bool {
    address.parse::<IpAddr>().is_ok() || (!address.starts_with("*.") && is_hostname(address))
}

fn check(
    ok: bool,
    object: impl FnOnce() -> String,
    field: &'static str,
    value: &str,
) -> Result<(), SnapshotError> {
    if ok {
        Ok(())
    } else {
        Err(SnapshotError::InvalidValue {
            object: object(),
            field,
            value: value.to_string(),
        })
    }
}

fn check_endpoints(object: &str, endpoints: &[Endpoint]) -> Result<(), SnapshotError> {
    for ep in endpoints {
        check(is_identifier(&ep.name), || object.to_string(), "endpoint name", &ep.name)?;
        check(
            is_endpoint_address(&ep.address),
            || format!("{} endpoint {}", object, ep.name),
            "address",
            &ep.address,
        )?;
    }
    Ok(())
}

/// Point-in-time routing topology handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    http_groups: Vec<HttpServiceGroup>,
    tcp_services: Vec<TcpService>,
}

impl Snapshot {
    /// Build a snapshot, rejecting anything that cannot be routed unambiguously.
    pub fn new(
        http_groups: Vec<HttpServiceGroup>,
        tcp_services: Vec<TcpService>,
    ) -> Result<Self, SnapshotError> {
        let mut groups = HashSet::new();
        for group in &http_groups {
            check(is_identifier(&group.namespace), || group.key(), "namespace", &group.namespace)?;
            check(is_identifier(&group.name), || group.key(), "name", &group.name)?;
            for alias in &group.aliases {
                check(is_hostname(alias), || group.key(), "alias", alias)?;
            }
            if group.services.is_empty() {
                return Err(SnapshotError::EmptyGroup { group: group.key() });
            }
            if !groups.insert(group.key()) {
                return Err(SnapshotError::DuplicateGroup { group: group.key() });
            }

            let mut paths = HashSet::new();
            for svc in &group.services {
                let object = || format!("{} service {}/{}", group.key(), svc.namespace, svc.name);
                check(is_identifier(&svc.namespace), object, "namespace", &svc.namespace)?;
                check(is_identifier(&svc.name), object, "name", &svc.name)?;
                check_endpoints(&object(), &svc.endpoints)?;
                if !is_routable_path(svc.location()) {
                    return Err(SnapshotError::InvalidPath {
                        group: group.key(),
                        path: svc.path.clone(),
                    });
                }
                if !paths.insert(svc.location()) {
                    return Err(SnapshotError::DuplicatePath {
                        group: group.key(),
                        path: svc.location().to_string(),
                    });
                }
            }
        }

        let mut ports: HashMap<u16, String> = HashMap::new();
        for svc in &tcp_services {
            check(is_identifier(&svc.namespace), || svc.key(), "namespace", &svc.namespace)?;
            check(is_identifier(&svc.name), || svc.key(), "name", &svc.name)?;
            check_endpoints(&format!("tcp service {}", svc.key()), &svc.endpoints)?;
            if let Some(first) = ports.insert(svc.listen_port, svc.key()) {
                return Err(SnapshotError::DuplicateListenPort {
                    port: svc.listen_port,
                    first,
                    second: svc.key(),
                });
            }
        }

        Ok(Self {
            http_groups,
            tcp_services,
        })
    }

    /// The minimal topology: no groups, no TCP services.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn http_groups(&self) -> &[HttpServiceGroup] {
        &self.http_groups
    }

    pub fn tcp_services(&self) -> &[TcpService] {
        &self.tcp_services
    }

    pub fn is_empty(&self) -> bool {
        self.http_groups.is_empty() && self.tcp_services.is_empty()
    }
}
