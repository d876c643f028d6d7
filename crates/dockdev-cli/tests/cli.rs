use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn dockdev() -> Command {
    Command::cargo_bin("dockdev").unwrap()
}

/// Puts a `docker` stub with a fixed exit code at the front of PATH so
/// tests control what the runtime gateway sees.
fn stub_docker(dir: &Path, exit_code: i32) -> std::ffi::OsString {
    use std::os::unix::fs::PermissionsExt;

    let bin = dir.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let stub = bin.join("docker");
    fs::write(&stub, format!("#!/bin/sh\nexit {exit_code}\n")).unwrap();
    fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

    let mut paths = vec![bin];
    paths.extend(std::env::split_paths(
        &std::env::var_os("PATH").unwrap_or_default(),
    ));
    std::env::join_paths(paths).unwrap()
}

fn write_env(root: &Path, hosts_file: &Path) {
    fs::write(
        root.join(".env"),
        format!(
            "NETWORK_NAME=devnet\n\
             PROJECT_START_IP=10.10.0.2\n\
             SHARED_MYSQL_IP=10.10.0.100\n\
             MYSQL_ROOT_PASSWORD=root\n\
             MYSQL_USER=app\n\
             MYSQL_PASSWORD=secret\n\
             HOSTS_FILE={}\n",
            hosts_file.display()
        ),
    )
    .unwrap();
}

#[test]
fn help_exits_zero() {
    dockdev()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn bare_invocation_without_terminal_prints_usage_and_fails() {
    let tmp = tempfile::tempdir().unwrap();
    dockdev()
        .args(["-C", tmp.path().to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn creation_in_empty_workspace_fails() {
    let tmp = tempfile::tempdir().unwrap();
    // No .env and (in CI) no reachable container runtime: either way the
    // workflow must stop before creating anything.
    dockdev()
        .args(["-C", tmp.path().to_str().unwrap(), "app.test"])
        .assert()
        .failure();
    assert!(!tmp.path().join("domains/app.test").exists());
}

#[test]
fn removing_an_unknown_project_reports_and_exits_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let hosts = tmp.path().join("hosts");
    fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();
    write_env(tmp.path(), &hosts);

    dockdev()
        .args(["-C", tmp.path().to_str().unwrap(), "rm", "ghost.test", "--yes", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""domain": "ghost.test""#))
        .stdout(predicate::str::contains("skipped"));
}

#[test]
fn recreating_an_existing_project_leaves_ip_map_and_certs_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let hosts = root.join("hosts");
    fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();
    write_env(root, &hosts);

    fs::create_dir_all(root.join("domains/app.test")).unwrap();
    let ipmap = "shared-mysql=10.10.0.100\napp.test=10.10.0.2\n";
    fs::write(root.join(".ipmap.env"), ipmap).unwrap();

    // Runtime reachable, so the workflow gets past preflight and must
    // stop on the duplicate project instead.
    let path = stub_docker(root, 0);
    dockdev()
        .env("PATH", &path)
        .args(["-C", root.to_str().unwrap(), "app.test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(root.join(".ipmap.env")).unwrap(), ipmap);
    assert!(!root.join("shared-services/certs").exists());
}

#[test]
fn proxy_reload_is_warned_when_runtime_is_unreachable() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let hosts = root.join("hosts");
    fs::write(&hosts, "127.0.0.1 localhost\n127.0.0.1 app.test\n").unwrap();
    write_env(root, &hosts);

    fs::write(root.join(".ipmap.env"), "app.test=10.10.0.2\n").unwrap();
    fs::create_dir_all(root.join("shared-services/sites")).unwrap();
    fs::write(
        root.join("shared-services/sites/app.test.conf"),
        "server {}\n",
    )
    .unwrap();

    // A site config was removed but the runtime is down: the reload step
    // must surface as a warning, not as "nothing to reload".
    let path = stub_docker(root, 1);
    dockdev()
        .env("PATH", &path)
        .args(["-C", root.to_str().unwrap(), "rm", "app.test", "--yes", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "proxy reload""#))
        .stdout(predicate::str::contains(r#""status": "warned""#))
        .stdout(predicate::str::contains("runtime unreachable"))
        .stderr(predicate::str::contains("warning"));
}

#[test]
fn rm_without_domain_outside_a_terminal_fails() {
    let tmp = tempfile::tempdir().unwrap();
    dockdev()
        .args(["-C", tmp.path().to_str().unwrap(), "rm"])
        .assert()
        .failure();
}

#[test]
fn removal_cleans_exactly_one_project() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let hosts = root.join("hosts");
    fs::write(
        &hosts,
        "127.0.0.1 localhost\n127.0.0.1 app.test\n127.0.0.1 app.test2\n",
    )
    .unwrap();
    write_env(root, &hosts);

    fs::create_dir_all(root.join("domains/app.test/data")).unwrap();
    fs::write(
        root.join("domains/app.test/docker-compose.yml"),
        "services: {}\n",
    )
    .unwrap();
    fs::write(
        root.join(".ipmap.env"),
        "shared-mysql=10.10.0.100\n\
         app.test=10.10.0.2\n\
         app.test_cache=10.10.0.3\n\
         app.test2=10.10.0.4\n",
    )
    .unwrap();
    fs::create_dir_all(root.join("shared-services/sites")).unwrap();
    fs::write(
        root.join("shared-services/sites/app.test.conf"),
        "server {}\n",
    )
    .unwrap();

    dockdev()
        .args(["-C", root.to_str().unwrap(), "rm", "app.test", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app.test"));

    assert!(!root.join("domains/app.test").exists());
    assert!(!root.join("shared-services/sites/app.test.conf").exists());
    assert_eq!(
        fs::read_to_string(root.join(".ipmap.env")).unwrap(),
        "shared-mysql=10.10.0.100\napp.test2=10.10.0.4\n"
    );
    assert_eq!(
        fs::read_to_string(&hosts).unwrap(),
        "127.0.0.1 localhost\n127.0.0.1 app.test2\n"
    );
}
