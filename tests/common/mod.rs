//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use gateway_controller::config::{GatewayConfig, NginxConfig};
use gateway_controller::render::{Renderer, StaticConfig};
use gateway_controller::topology::{Endpoint, HttpService, HttpServiceGroup, Snapshot, TcpService};

/// Stand-in for the nginx binary.
///
/// Appends its arguments to `invocations.log` and fails `-t` whenever the
/// config under test contains the word `broken`. `START_ACTION` is replaced
/// by one of the start behaviours below.
const FAKE_NGINX: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
echo "$@" >> "$dir/invocations.log"
config=""
mode="start"
while [ $# -gt 0 ]; do
    case "$1" in
        -c) config="$2"; shift 2 ;;
        -t) mode="validate"; shift ;;
        -s) mode="signal-$2"; shift 2 ;;
        *) shift ;;
    esac
done
case "$mode" in
    validate)
        if grep -q broken "$config"; then
            echo "nginx: [emerg] invalid directive in $config" >&2
            exit 1
        fi
        ;;
    start)
        START_ACTION
        ;;
esac
exit 0
"#;

/// PID file written before the launcher exits.
const START_FOREGROUND: &str = r#"echo $$ > "$dir/nginx.pid""#;

/// Like real nginx: the launcher returns at once and a detached master writes
/// the PID file a little later.
const START_DAEMONIZED: &str =
    r#"( sleep 0.3; echo 1 > "$dir/nginx.pid" ) </dev/null >/dev/null 2>&1 &"#;

/// A scratch directory holding a fake nginx and its artifacts.
pub struct FakeNginx {
    pub dir: tempfile::TempDir,
}

impl FakeNginx {
    pub fn new() -> Self {
        Self::with_start(START_FOREGROUND)
    }

    pub fn daemonizing() -> Self {
        Self::with_start(START_DAEMONIZED)
    }

    fn with_start(action: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = FAKE_NGINX.replace("START_ACTION", action);
        std::fs::write(dir.path().join("nginx.sh"), script).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// nginx settings pointing every artifact into the scratch directory.
    ///
    /// The script is run through `sh` so it never has to be executable.
    pub fn config(&self) -> NginxConfig {
        NginxConfig {
            binary: PathBuf::from("sh"),
            binary_args: vec![self.path().join("nginx.sh").display().to_string()],
            config_file: self.path().join("nginx.conf"),
            pid_file: self.path().join("nginx.pid"),
            log_pipe: self.path().join("nginx-log.pipe"),
            command_timeout_secs: 5,
            ..NginxConfig::default()
        }
    }

    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(self.path().join("invocations.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.invocations().iter().filter(|line| line.ends_with(verb)).count()
    }

    pub fn config_on_disk(&self) -> String {
        std::fs::read_to_string(self.path().join("nginx.conf")).unwrap()
    }

    pub fn mark_running(&self) {
        std::fs::write(self.path().join("nginx.pid"), "1\n").unwrap();
    }
}

pub fn renderer() -> Renderer {
    Renderer::new(StaticConfig::from(&GatewayConfig::default())).unwrap()
}

pub fn endpoint(name: &str, address: &str, port: u16) -> Endpoint {
    Endpoint::new(name, address, port)
}

pub fn http_service(namespace: &str, name: &str, path: &str, endpoints: Vec<Endpoint>) -> HttpService {
    HttpService {
        namespace: namespace.into(),
        name: name.into(),
        path: path.into(),
        target_port: 0,
        endpoints,
    }
}

pub fn tcp_service(namespace: &str, name: &str, listen_port: u16, endpoints: Vec<Endpoint>) -> TcpService {
    TcpService {
        namespace: namespace.into(),
        name: name.into(),
        listen_port,
        target_port: 0,
        endpoints,
    }
}

/// Group `ing1` in namespace `svc1`, aliased as `apps.example.com`, routing `/` and `/v0`.
pub fn aliased_group() -> HttpServiceGroup {
    HttpServiceGroup {
        name: "ing1".into(),
        namespace: "svc1".into(),
        aliases: ["apps.example.com".to_string()].into_iter().collect(),
        services: vec![
            http_service(
                "svc1",
                "web",
                "/",
                vec![endpoint("web-0", "10.1.0.1", 8080), endpoint("web-1", "10.1.0.2", 8080)],
            ),
            http_service("svc1", "api", "/v0", vec![endpoint("api-0", "10.1.1.1", 9000)]),
        ],
    }
}

pub fn tcp_snapshot(name: &str) -> Snapshot {
    Snapshot::new(
        vec![],
        vec![tcp_service("ns1", name, 19822, vec![endpoint("db-0", "10.2.0.1", 5432)])],
    )
    .unwrap()
}
