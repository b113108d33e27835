//! End-to-end resolution of manifest fixtures.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::path::{Path, PathBuf};

use corral_common::error::CorralError;
use corral_compose::model::{NetworkMode, RestartPolicy};
use corral_compose::{Manifest, ServiceKind, resolve_manifest};
use pretty_assertions::assert_eq;
use serde_json::json;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn full_manifest_maps_every_field() {
    let manifest = Manifest::from_file(&fixture("full.yml")).expect("should parse");
    let project = resolve_manifest(&manifest).expect("should resolve");
    assert_eq!(project.services.len(), 1);

    let web = &project.services[0];
    assert_eq!(web.name, "web");
    let json = serde_json::to_value(web.launch_config.as_ref().expect("launch config"))
        .expect("serialize");
    assert_eq!(
        json,
        json!({
            "imageUuid": "docker:nginx",
            "command": ["/bin/sh", "-c"],
            "entryPoint": ["/bin/foo", "bar"],
            "ports": ["80:81/tcp", "123/tcp", "21/tcp"],
            "expose": ["123", "21"],
            "dataVolumes": ["/tmp/foo", "/tmp/x:/tmp/y"],
            "volumeDriver": "foo",
            "environment": {"foo": "bar", "a": "b"},
            "dns": ["8.8.8.8", "1.1.1.1"],
            "dnsSearch": ["foo.com", "bar.com"],
            "capAdd": ["ALL", "SYS_ADMIN"],
            "capDrop": ["NET_ADMIN", "SYS_ADMIN"],
            "devices": ["/dev/sda:/dev/a:rwm", "/dev/sdb:/dev/c:ro"],
            "extraHosts": ["host:1.1.1.1", "host:2.2.2.2"],
            "restartPolicy": {"name": "always"},
            "networkMode": "host",
            "memory": 100,
            "memorySwap": 101,
            "cpuShares": 42,
            "cpuSet": "1,2",
            "privileged": true,
            "securityOpt": ["label:foo", "label:bar"],
            "pidMode": "host",
            "stdinOpen": true,
            "tty": true,
            "hostname": "myhostname",
            "domainName": "example.com",
            "workingDir": "/somewhere",
            "user": "somebody",
            "labels": {"a": "b", "c": "d"},
            "logConfig": {"driver": "syslog", "config": {"tag": "foo"}},
            "build": {
                "dockerfile": "something/other",
                "remote": "github.com/ibuildthecloud/tiny-build"
            }
        })
    );
    assert!(json.get("name").is_none());
}

#[test]
fn extends_across_files_with_env_files() {
    let manifest = Manifest::from_file(&fixture("extends/base.yml")).expect("should parse");
    let project = resolve_manifest(&manifest).expect("should resolve");
    let names: Vec<_> = project.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["base", "local", "other-base"]);

    let lc = |name: &str| {
        project
            .service(name)
            .and_then(|s| s.launch_config.clone())
            .expect(name)
    };

    let base = lc("base");
    assert_eq!(base.image_uuid.as_deref(), Some("docker:second"));
    let env: Vec<_> = base
        .environment
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        env,
        [("bar", "baz"), ("env", "2"), ("d", "e"), ("foo", "bar"), ("a", "b")]
    );

    let local = lc("local");
    assert_eq!(local.image_uuid.as_deref(), Some("docker:local"));
    assert_eq!(local.ports, ["80/tcp"]);
    assert_eq!(local.environment.get("key").map(String::as_str), Some("value"));

    let other = lc("other-base");
    assert_eq!(other.image_uuid.as_deref(), Some("docker:other"));
    assert_eq!(other.ports, ["80/tcp", "81/tcp"]);
    assert_eq!(other.environment.len(), 2);
}

#[test]
fn child_env_file_overrides_parent_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("parent.yml"),
        "base:\n  image: nginx\n  environment:\n    A: parent\n    B: parent\n",
    )
    .expect("write parent");
    std::fs::write(dir.path().join("child.env"), "A=child\n").expect("write env");
    let manifest = Manifest::parse(
        "web:\n  extends:\n    file: parent.yml\n    service: base\n  env_file: child.env\n",
        dir.path(),
    )
    .expect("should parse");

    let env = &manifest.get("web").expect("web").environment;
    assert_eq!(env.get("A").map(String::as_str), Some("child"));
    assert_eq!(env.get("B").map(String::as_str), Some("parent"));
}

#[test]
fn extends_cycle_across_files_is_reported() {
    let err = Manifest::from_file(&fixture("extends/cycle.yml")).unwrap_err();
    match err {
        CorralError::ExtendsCycle { chain } => {
            assert_eq!(chain.len(), 3, "chain: {chain:?}");
            assert!(chain.contains(&"web".to_string()), "chain: {chain:?}");
            assert!(chain[0].ends_with(":middle"), "chain: {chain:?}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn load_balancer_with_overlay() {
    let mut manifest =
        Manifest::from_file(&fixture("lb/docker-compose.yml")).expect("should parse");
    manifest
        .apply_overlay_file(&fixture("lb/rancher-compose.yml"))
        .expect("overlay");
    let project = resolve_manifest(&manifest).expect("should resolve");
    assert_eq!(project.services.len(), 2);

    let lb = project.service("lb").expect("lb");
    assert_eq!(lb.kind, ServiceKind::LoadBalancer);
    assert_eq!(lb.scale, Some(2));
    let json = serde_json::to_value(lb).expect("serialize");
    assert_eq!(json["type"], "loadBalancerService");
    assert_eq!(
        json["loadBalancerConfig"],
        json!({
            "name": "lb config",
            "appCookieStickinessPolicy": {
                "cookie": "foo",
                "maxLength": 1024,
                "requestLearn": true,
                "mode": "path_parameters"
            },
            "healthCheck": {
                "interval": 2000,
                "responseTimeout": 2000,
                "healthyThreshold": 2,
                "unhealthyThreshold": 3,
                "requestLine": "OPTIONS /ping HTTP/1.1\r\nHost:\\ www.example.com"
            }
        })
    );

    let web = project.service("web").expect("web");
    let health = web
        .launch_config
        .as_ref()
        .and_then(|lc| lc.health_check.as_ref())
        .expect("health check");
    assert_eq!(health.port, Some(80));
    assert_eq!(health.interval, Some(2000));

    assert_eq!(project.edges.len(), 1);
    assert_eq!(project.edges[0].to_string(), "lb -> web");
}

#[test]
fn external_ip_service() {
    let manifest = Manifest::from_file(&fixture("externalip/test.yml")).expect("should parse");
    let project = resolve_manifest(&manifest).expect("should resolve");
    let web = project.service("web").expect("web");
    let json = serde_json::to_value(web).expect("serialize");
    assert_eq!(json["type"], "externalService");
    assert!(json.get("launchConfig").is_none());
    assert_eq!(json["externalIpAddresses"], json!(["1.1.1.1", "2.2.2.2"]));
}

#[test]
fn sidekick_container_network_and_volumes() {
    let manifest = Manifest::parse(
        "web:\n  labels:\n    io.rancher.sidekicks: log\n  image: nginx\n\
         log:\n  net: container:web\n  image: mysql\n  volumes_from: [web]\n\
         log2:\n  image: bar\n",
        Path::new("."),
    )
    .expect("should parse");
    let project = resolve_manifest(&manifest).expect("should resolve");
    assert_eq!(project.services.len(), 2);

    let web = project.service("web").expect("web");
    let primary = web.launch_config.as_ref().expect("primary");
    assert_eq!(primary.network, NetworkMode::Managed);
    assert_eq!(web.secondary_launch_configs.len(), 1);
    let log = &web.secondary_launch_configs[0];
    assert_eq!(log.name.as_deref(), Some("log"));
    assert_eq!(log.image_uuid.as_deref(), Some("docker:mysql"));
    assert_eq!(log.network, NetworkMode::Container("web".into()));
    assert_eq!(log.data_volumes_from_launch_configs, ["web"]);

    let log2 = project.service("log2").expect("log2");
    assert_eq!(
        log2.launch_config.as_ref().and_then(|lc| lc.image_uuid.as_deref()),
        Some("docker:bar")
    );
}

#[test]
fn dns_service_and_link_aliases() {
    let manifest = Manifest::parse(
        "web1:\n  image: nginx\nweb2:\n  image: nginx\n\
         web:\n  image: rancher/dns-service\n  links:\n  - web1\n  - \"web2: second\"\n\
         foo:\n  image: nginx\n  links:\n    web: alias\n",
        Path::new("."),
    )
    .expect("should parse");
    let project = resolve_manifest(&manifest).expect("should resolve");

    assert_eq!(project.service("web").expect("web").kind, ServiceKind::Dns);
    let edges: Vec<_> = project.edges.iter().map(ToString::to_string).collect();
    assert_eq!(
        edges,
        ["web -> web1", "web -> web2 (as second)", "foo -> web (as alias)"]
    );
}

#[test]
fn restart_policy_variants() {
    let manifest = Manifest::parse(
        "a:\n  image: x\n  restart: on-failure:5\nb:\n  image: x\n  restart: on-failure\n",
        Path::new("."),
    )
    .expect("should parse");
    let project = resolve_manifest(&manifest).expect("should resolve");
    let policy = |name: &str| {
        project
            .service(name)
            .and_then(|s| s.launch_config.as_ref())
            .and_then(|lc| lc.restart_policy)
    };
    assert_eq!(
        policy("a"),
        Some(RestartPolicy::OnFailure {
            maximum_retry_count: Some(5)
        })
    );
    assert_eq!(
        policy("b"),
        Some(RestartPolicy::OnFailure {
            maximum_retry_count: None
        })
    );
}

#[test]
fn stdin_manifest_resolves_env_files_against_base_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("web.env"), "FROM_FILE=1\nSHARED=file\n").expect("write");
    let manifest = Manifest::parse(
        "web:\n  image: nginx\n  env_file: web.env\n  environment:\n    SHARED: inline\n",
        dir.path(),
    )
    .expect("should parse");
    let env = &manifest.get("web").expect("web").environment;
    assert_eq!(env.get("FROM_FILE").map(String::as_str), Some("1"));
    assert_eq!(env.get("SHARED").map(String::as_str), Some("inline"));
}

#[test]
fn missing_env_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = Manifest::parse("web:\n  image: nginx\n  env_file: nope.env\n", dir.path())
        .unwrap_err();
    assert!(matches!(err, CorralError::Io { .. }), "got: {err}");
}
