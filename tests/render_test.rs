//! Rendering tests against complete topologies.

use gateway_controller::error::Error;
use gateway_controller::topology::{
    ManifestProvider, Snapshot, SnapshotError, StaticProvider, TopologyProvider,
};

mod common;

#[test]
fn test_aliased_group_routes_both_hosts() {
    let snapshot = Snapshot::new(vec![common::aliased_group()], vec![]).unwrap();
    let out = String::from_utf8(common::renderer().render(&snapshot).unwrap()).unwrap();

    let expected = r#"
    server {
        listen 80;
        server_name ing1.svc1.cluster.local apps.example.com;
        location / {
            proxy_set_header Host $host;
            proxy_pass http://svc1__ing1__web;
        }
        location /v0 {
            proxy_set_header Host $host;
            proxy_pass http://svc1__ing1__api;
        }
    }
    upstream svc1__ing1__web {
        server 10.1.0.1:8080;  # web-0
        server 10.1.0.2:8080;  # web-1
    }
    upstream svc1__ing1__api {
        server 10.1.1.1:9000;  # api-0
    }
"#;
    assert!(out.contains(expected), "rendered config:\n{}", out);

    // the fail-closed default and health listener are still there
    assert!(out.contains("listen 80 default_server;"));
    assert!(out.contains("listen 7332;"));
}

#[tokio::test]
async fn test_tcp_service_end_to_end() {
    let snapshot = Snapshot::new(
        vec![],
        vec![common::tcp_service(
            "ns1",
            "svc1",
            19822,
            vec![
                common::endpoint("pod-c", "10.0.0.3", 7000),
                common::endpoint("pod-a", "10.0.0.1", 7000),
                common::endpoint("pod-b", "10.0.0.2", 7000),
            ],
        )],
    )
    .unwrap();
    let provider = StaticProvider::new(snapshot);

    let fetched = provider.fetch_topology().await.unwrap();
    let out = String::from_utf8(common::renderer().render(&fetched).unwrap()).unwrap();

    assert_eq!(out.matches("listen 19822;").count(), 1);
    assert!(out.contains("        listen 19822;\n        proxy_pass ns1__svc1;\n"));

    let upstream = out.split("upstream ns1__svc1 {").nth(1).unwrap();
    let a = upstream.find("10.0.0.3:7000").unwrap();
    let b = upstream.find("10.0.0.1:7000").unwrap();
    let c = upstream.find("10.0.0.2:7000").unwrap();
    assert!(a < b && b < c, "endpoints out of input order:\n{}", out);
}

#[test]
fn test_render_is_byte_identical_across_calls() {
    let snapshot = Snapshot::new(
        vec![common::aliased_group()],
        vec![common::tcp_service("ns1", "svc1", 19822, vec![common::endpoint("a", "10.0.0.1", 1)])],
    )
    .unwrap();

    let first = common::renderer().render(&snapshot).unwrap();
    let second = common::renderer().render(&snapshot.clone()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_snapshot_has_only_static_listeners() {
    let out = String::from_utf8(common::renderer().render(&Snapshot::empty()).unwrap()).unwrap();
    assert_eq!(out.matches("server {").count(), 2);
    assert!(!out.contains("upstream"));
    assert!(out.contains("return 404;"));
    assert!(out.contains("stream {\n}"));
}

#[test]
fn test_ambiguous_snapshots_are_rejected() {
    let mut group = common::aliased_group();
    group.services[1].path = "/".into();
    assert!(matches!(
        Snapshot::new(vec![group], vec![]),
        Err(SnapshotError::DuplicatePath { .. })
    ));

    let result = Snapshot::new(
        vec![],
        vec![
            common::tcp_service("ns1", "a", 19822, vec![]),
            common::tcp_service("ns2", "b", 19822, vec![]),
        ],
    );
    assert!(matches!(result, Err(SnapshotError::DuplicateListenPort { port: 19822, .. })));
}

#[tokio::test]
async fn test_directive_smuggled_in_alias_never_reaches_nginx() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cluster.toml");
    std::fs::write(
        &path,
        r#"
[aliases]
"apps.example.com" = "ing1.svc1"
"x;\n        location /admin { return 200 'owned'; }\n        #" = "ing1.svc1"

[[services]]
namespace = "svc1"
name = "web"
endpoints = [{ name = "web-0", address = "10.1.0.1", port = 8080 }]

[[ingresses]]
namespace = "svc1"
name = "ing1"
annotations = { "gateway.example.com/enabled" = "true" }
rules = [{ path = "/", service = "web" }]
"#,
    )
    .unwrap();

    let provider = ManifestProvider::new(&path, "gateway.example.com");
    let err = provider.fetch_topology().await.unwrap_err();
    assert!(matches!(err, Error::TopologyFetch(_)));
    assert!(err.to_string().contains("invalid alias"), "{}", err);
}
