//! Command line flags.
//!
//! Every flag can also be supplied through a `GATEWAY_CONTROLLER_*`
//! environment variable. Flags that are not given leave the file (or
//! default) value in place.

use clap::Parser;
use std::path::PathBuf;

use crate::config::schema::{GatewayConfig, LogFormat};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gateway-controller")]
#[command(version, about = "Keeps an nginx reverse proxy in sync with cluster services", long_about = None)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "GATEWAY_CONTROLLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seconds between attempts to build and reload a new nginx config
    #[arg(long, env = "GATEWAY_CONTROLLER_REFRESH_INTERVAL")]
    pub refresh_interval: Option<u64>,

    /// DNS zone used to build canonical virtual host names
    #[arg(long, env = "GATEWAY_CONTROLLER_CLUSTER_ZONE")]
    pub cluster_zone: Option<String>,

    /// Annotation prefix that opts cluster objects into routing
    #[arg(long, env = "GATEWAY_CONTROLLER_ANNOTATION_PREFIX")]
    pub annotation_prefix: Option<String>,

    /// Cluster manifest to read topology from
    #[arg(long, env = "GATEWAY_CONTROLLER_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Log nginx management commands rather than executing them
    #[arg(long, env = "GATEWAY_CONTROLLER_NGINX_DRY_RUN")]
    pub nginx_dry_run: bool,

    /// nginx executable
    #[arg(long, env = "GATEWAY_CONTROLLER_NGINX_BIN")]
    pub nginx_bin: Option<PathBuf>,

    /// Rendered nginx configuration file
    #[arg(long, env = "GATEWAY_CONTROLLER_NGINX_CONFIG")]
    pub nginx_config: Option<PathBuf>,

    /// nginx PID file
    #[arg(long, env = "GATEWAY_CONTROLLER_NGINX_PID_FILE")]
    pub nginx_pid_file: Option<PathBuf>,

    /// Named pipe nginx logs into
    #[arg(long, env = "GATEWAY_CONTROLLER_NGINX_LOG_PIPE")]
    pub nginx_log_pipe: Option<PathBuf>,

    /// Port for nginx's own health listener
    #[arg(long, env = "GATEWAY_CONTROLLER_NGINX_HEALTH_PORT")]
    pub nginx_health_port: Option<u16>,

    /// Port for the controller's liveness endpoint
    #[arg(long, env = "GATEWAY_CONTROLLER_HEALTH_PORT")]
    pub health_port: Option<u16>,

    /// Log output format
    #[arg(long, env = "GATEWAY_CONTROLLER_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,
}

impl Args {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(secs) = self.refresh_interval {
            config.controller.refresh_interval_secs = secs;
        }
        if let Some(zone) = &self.cluster_zone {
            config.controller.cluster_zone = zone.clone();
        }
        if let Some(prefix) = &self.annotation_prefix {
            config.controller.annotation_prefix = prefix.clone();
        }
        if let Some(path) = &self.manifest {
            config.controller.manifest_path = path.clone();
        }
        if self.nginx_dry_run {
            config.controller.dry_run = true;
        }
        if let Some(bin) = &self.nginx_bin {
            config.nginx.binary = bin.clone();
        }
        if let Some(path) = &self.nginx_config {
            config.nginx.config_file = path.clone();
        }
        if let Some(path) = &self.nginx_pid_file {
            config.nginx.pid_file = path.clone();
        }
        if let Some(path) = &self.nginx_log_pipe {
            config.nginx.log_pipe = path.clone();
        }
        if let Some(port) = self.nginx_health_port {
            config.nginx.health_port = port;
        }
        if let Some(port) = self.health_port {
            config.health.bind_address = format!("0.0.0.0:{}", port);
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
    }
}
