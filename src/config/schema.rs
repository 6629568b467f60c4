//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the controller.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the gateway controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Reconciliation loop and topology source.
    pub controller: ControllerConfig,

    /// Managed nginx process.
    pub nginx: NginxConfig,

    /// Controller liveness endpoint.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Reconciliation loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Seconds between topology refreshes.
    pub refresh_interval_secs: u64,

    /// DNS zone appended to `{name}.{namespace}` to form canonical host names.
    pub cluster_zone: String,

    /// Cluster objects opt in with an annotation under this prefix.
    pub annotation_prefix: String,

    /// Cluster manifest read by the topology provider on every tick.
    pub manifest_path: PathBuf,

    /// Log nginx management actions instead of performing them.
    pub dry_run: bool,
}

impl ControllerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            cluster_zone: "cluster.local".to_string(),
            annotation_prefix: "gateway.example.com".to_string(),
            manifest_path: PathBuf::from("/etc/gateway-controller/cluster.toml"),
            dry_run: false,
        }
    }
}

/// nginx process and artifact configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NginxConfig {
    /// nginx executable.
    pub binary: PathBuf,

    /// Arguments placed before `-c <config_file>` on every invocation.
    pub binary_args: Vec<String>,

    /// Rendered configuration file.
    pub config_file: PathBuf,

    /// Process-identity marker; its existence means nginx is running.
    pub pid_file: PathBuf,

    /// Named pipe nginx writes its logs into.
    pub log_pipe: PathBuf,

    /// Port of nginx's own health listener.
    pub health_port: u16,

    /// Port every virtual host and the default server listen on.
    pub http_port: u16,

    pub worker_connections: u32,

    /// Level passed to nginx `error_log`.
    pub error_log_level: String,

    /// Upper bound on a single validate/start/reload invocation.
    pub command_timeout_secs: u64,
}

impl NginxConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("nginx"),
            binary_args: Vec::new(),
            config_file: PathBuf::from("/etc/nginx/nginx.conf"),
            pid_file: PathBuf::from("/var/run/nginx.pid"),
            log_pipe: PathBuf::from("/var/run/nginx-log.pipe"),
            health_port: 7332,
            http_port: 80,
            worker_connections: 512,
            error_log_level: "warn".to_string(),
            command_timeout_secs: 10,
        }
    }
}

/// Controller liveness endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Bind address (e.g., "0.0.0.0:7333").
    pub bind_address: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7333".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "gateway_controller=info,nginx=info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
