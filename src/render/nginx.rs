//! nginx configuration renderer.
//!
//! # Responsibilities
//! - Compile the static block templates once
//! - Expand a `Snapshot` into a complete nginx.conf, byte for byte deterministic
//! - Always emit the health listener and the fail-closed default server
//!
//! # Design Decisions
//! - Output order follows snapshot order exactly; aliases are a sorted set
//! - An upstream shared by several paths of one group is emitted once
//! - Empty sections still render (`stream {}` with no servers is valid)

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::GatewayConfig;
use crate::render::template::{Template, TemplateError};
use crate::topology::{Endpoint, Snapshot};

const MAIN: &str = r#"pid {{ pid_file }};
daemon on;

error_log {{ log_pipe }} {{ error_log_level }};

events {
    worker_connections {{ worker_connections }};
}

http {
    access_log {{ log_pipe }};

    server {
        listen {{ health_port }};
        location /health {
            return 200 'Healthy!';
        }
    }

    server {
        listen {{ http_port }} default_server;
        location / {
            return {{ default_status }};
        }
    }
{{ http_servers }}}

stream {
{{ tcp_servers }}}
"#;

const VIRTUAL_HOST: &str = r#"
    server {
        listen {{ http_port }};
        server_name {{ server_names }};
{{ locations }}    }
"#;

const LOCATION: &str = r#"        location {{ path }} {
            proxy_set_header Host $host;
            proxy_pass http://{{ upstream }};
        }
"#;

const UPSTREAM: &str = r#"    upstream {{ upstream }} {
{{ servers }}    }
"#;

const UPSTREAM_SERVER: &str = "        server {{ address }};  # {{ endpoint }}\n";

/// nginx refuses an upstream without servers; this placeholder is never selected.
const EMPTY_UPSTREAM_SERVER: &str = "        server 127.0.0.1:1 down;\n";

const STREAM_SERVER: &str = r#"
    server {
        listen {{ listen_port }};
        proxy_pass {{ upstream }};
    }
"#;

/// Cluster-independent settings baked into every render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticConfig {
    pub pid_file: PathBuf,
    pub log_pipe: PathBuf,
    pub error_log_level: String,
    pub worker_connections: u32,
    pub health_port: u16,
    pub http_port: u16,
    /// Status returned for traffic no virtual host claims.
    pub default_status: u16,
    pub cluster_zone: String,
}

impl From<&GatewayConfig> for StaticConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            pid_file: config.nginx.pid_file.clone(),
            log_pipe: config.nginx.log_pipe.clone(),
            error_log_level: config.nginx.error_log_level.clone(),
            worker_connections: config.nginx.worker_connections,
            health_port: config.nginx.health_port,
            http_port: config.nginx.http_port,
            default_status: 404,
            cluster_zone: config.controller.cluster_zone.clone(),
        }
    }
}

/// Turns snapshots into nginx.conf bytes.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: StaticConfig,
    main: Template,
    virtual_host: Template,
    location: Template,
    upstream: Template,
    upstream_server: Template,
    stream_server: Template,
}

impl Renderer {
    /// Compile all templates. Failure here is a programming error.
    pub fn new(config: StaticConfig) -> Result<Self, TemplateError> {
        Ok(Self {
            main: Template::compile(
                "main",
                MAIN,
                &[
                    "pid_file",
                    "log_pipe",
                    "error_log_level",
                    "worker_connections",
                    "health_port",
                    "http_port",
                    "default_status",
                    "http_servers",
                    "tcp_servers",
                ],
            )?,
            virtual_host: Template::compile(
                "virtual_host",
                VIRTUAL_HOST,
                &["http_port", "server_names", "locations"],
            )?,
            location: Template::compile("location", LOCATION, &["path", "upstream"])?,
            upstream: Template::compile("upstream", UPSTREAM, &["upstream", "servers"])?,
            upstream_server: Template::compile(
                "upstream_server",
                UPSTREAM_SERVER,
                &["address", "endpoint"],
            )?,
            stream_server: Template::compile(
                "stream_server",
                STREAM_SERVER,
                &["listen_port", "upstream"],
            )?,
            config,
        })
    }

    pub fn static_config(&self) -> &StaticConfig {
        &self.config
    }

    /// Render `snapshot` into a complete configuration file.
    pub fn render(&self, snapshot: &Snapshot) -> Result<Vec<u8>, TemplateError> {
        let http_port = self.config.http_port.to_string();

        let mut http_servers = String::new();
        for group in snapshot.http_groups() {
            let canonical = group.canonical_host(&self.config.cluster_zone);
            let mut server_names = vec![canonical.as_str()];
            server_names.extend(
                group
                    .aliases
                    .iter()
                    .map(String::as_str)
                    .filter(|alias| *alias != canonical),
            );

            let mut locations = String::new();
            for svc in &group.services {
                self.location.render_into(
                    &mut locations,
                    &[("path", svc.location()), ("upstream", group.upstream_name(svc).as_str())],
                )?;
            }

            self.virtual_host.render_into(
                &mut http_servers,
                &[
                    ("http_port", http_port.as_str()),
                    ("server_names", server_names.join(" ").as_str()),
                    ("locations", locations.as_str()),
                ],
            )?;

            let mut emitted = HashSet::new();
            for svc in &group.services {
                let name = group.upstream_name(svc);
                if emitted.insert(name.clone()) {
                    self.render_upstream(&mut http_servers, &name, &svc.endpoints, svc.default_port())?;
                }
            }
        }

        let mut tcp_servers = String::new();
        for svc in snapshot.tcp_services() {
            let upstream = svc.upstream_name();
            self.stream_server.render_into(
                &mut tcp_servers,
                &[
                    ("listen_port", svc.listen_port.to_string().as_str()),
                    ("upstream", upstream.as_str()),
                ],
            )?;
            self.render_upstream(&mut tcp_servers, &upstream, &svc.endpoints, svc.default_port())?;
        }

        let rendered = self.main.render(&[
            ("pid_file", self.config.pid_file.display().to_string().as_str()),
            ("log_pipe", self.config.log_pipe.display().to_string().as_str()),
            ("error_log_level", self.config.error_log_level.as_str()),
            ("worker_connections", self.config.worker_connections.to_string().as_str()),
            ("health_port", self.config.health_port.to_string().as_str()),
            ("http_port", http_port.as_str()),
            ("default_status", self.config.default_status.to_string().as_str()),
            ("http_servers", http_servers.as_str()),
            ("tcp_servers", tcp_servers.as_str()),
        ])?;

        Ok(rendered.into_bytes())
    }

    fn render_upstream(
        &self,
        out: &mut String,
        name: &str,
        endpoints: &[Endpoint],
        default_port: u16,
    ) -> Result<(), TemplateError> {
        let mut servers = String::new();
        for ep in endpoints {
            self.upstream_server.render_into(
                &mut servers,
                &[
                    ("address", ep.socket_addr(default_port).as_str()),
                    ("endpoint", ep.name.as_str()),
                ],
            )?;
        }
        if servers.is_empty() {
            servers.push_str(EMPTY_UPSTREAM_SERVER);
        }
        self.upstream.render_into(out, &[("upstream", name), ("servers", servers.as_str())])
    }
}
