use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// A `tooldeck` command isolated from the caller's environment.
fn tooldeck(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tooldeck").unwrap();
    cmd.current_dir(dir)
        .env_remove("TOOLDECK_PROJECT_ROOT")
        .env_remove("TOOLDECK_INSTALL_ROOT")
        .env_remove("TOOLDECK_SERVICE_ACCOUNT_JSON")
        .env_remove("CIPD_CACHE_DIR")
        .env_remove("TOOLDECK_LOG");
    cmd
}

fn setup_project(dir: &Path) -> PathBuf {
    let tools = dir.join("tools");
    fs::create_dir_all(&tools).unwrap();
    fs::write(
        tools.join("default.json"),
        r#"{"included_files": ["base.json"]}"#,
    )
    .unwrap();
    fs::write(
        tools.join("base.json"),
        r#"{"packages": [{"path": "infra/cmake/${platform}", "tags": ["version:3.0"]}]}"#,
    )
    .unwrap();
    let config = dir.join("tooldeck.toml");
    fs::write(
        &config,
        "manifests = [\"tools/default.json\"]\n\n[install]\nroot = \"out\"\n",
    )
    .unwrap();
    config
}

#[test]
fn test_execute_init_creates_config() {
    let dir = tempdir().unwrap();
    tooldeck(dir.path()).arg("init").assert().success();

    let content = fs::read_to_string(dir.path().join("tooldeck.toml")).unwrap();
    assert!(content.contains("[client]"));
    assert!(content.contains("binary = \"cipd\""));

    tooldeck(dir.path()).arg("init").assert().failure();
}

#[test]
fn test_execute_platform() {
    let dir = tempdir().unwrap();
    let output = tooldeck(dir.path())
        .arg("platform")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let platform = String::from_utf8_lossy(&output).trim().to_string();
    let (os, _) = platform.split_once('-').unwrap();
    assert!(["linux", "mac", "windows"].contains(&os));
}

#[test]
fn test_execute_resolve() {
    let dir = tempdir().unwrap();
    let config = setup_project(dir.path());
    let output = tooldeck(dir.path())
        .arg("resolve")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lines: Vec<String> = String::from_utf8_lossy(&output).lines().map(str::to_string).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("default.json"));
    assert!(lines[1].ends_with("base.json"));
}

#[test]
fn test_execute_lock_print() {
    let dir = tempdir().unwrap();
    let config = setup_project(dir.path());
    let output = tooldeck(dir.path())
        .args(["lock", "--print", "--config"])
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lock = String::from_utf8_lossy(&output);
    assert!(lock.starts_with("$VerifiedPlatform linux-amd64\n"));
    assert!(lock.ends_with("@Subdir base\ninfra/cmake/${platform} version:3.0\n"));
    assert!(dir.path().join("out").join("packages.ensure").exists());
    assert!(dir.path().join("out").join("deduped-packages.json").exists());
}

#[test]
fn test_execute_update_without_manifests() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("empty.toml");
    fs::write(&config, "").unwrap();
    let output = tooldeck(dir.path())
        .arg("update")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("No manifests given"));
}

#[cfg(unix)]
mod fake_client {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Writes a shell script that answers like the package client.
    ///
    /// `ensure` records each call in `calls.log` next to the script and
    /// creates a `bin` folder for the `base` manifest.
    fn write_client(dir: &Path, logged_in: bool, visible: bool, ensure_exit: i32) -> PathBuf {
        let script = format!(
            r#"#!/bin/sh
dir="$(dirname "$0")"
case "$1" in
  auth-info) {auth_info} ;;
  ls) echo "No matching packages."; exit 0 ;;
  instances) exit {instances} ;;
  auth-login) exit 0 ;;
  ensure)
    echo ensure >> "$dir/calls.log"
    while [ $# -gt 0 ]; do
      if [ "$1" = "-root" ]; then root="$2"; fi
      shift
    done
    mkdir -p "$root/base/bin"
    echo "boom: ensure output"
    exit {ensure_exit} ;;
esac
exit 1
"#,
            auth_info = if logged_in { "echo 'Logged in as dev@example.com.'; exit 0" } else { "exit 1" },
            instances = if visible { 0 } else { 1 },
        );
        let path = dir.join("fake-cipd");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn calls(dir: &Path) -> usize {
        fs::read_to_string(dir.join("calls.log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    fn update(dir: &Path, config: &Path, client: &Path) -> Command {
        let mut cmd = tooldeck(dir);
        cmd.arg("update").arg("--config").arg(config).arg("--client").arg(client);
        cmd
    }

    #[test]
    fn test_update_exports_environment() {
        let dir = tempdir().unwrap();
        let config = setup_project(dir.path());
        let client = write_client(dir.path(), true, true, 0);

        let output = update(dir.path(), &config, &client)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let output = String::from_utf8_lossy(&output);
        assert!(output.contains("export TOOLDECK_INSTALL_DIR\n"));
        assert!(output.contains("export TOOLDECK_BASE_INSTALL_DIR\n"));
        assert!(output.contains("export TOOLDECK_DEFAULT_INSTALL_DIR\n"));
        assert!(output.contains("/out/packages/base/bin'\"${PATH:+:$PATH}\""));
        assert_eq!(calls(dir.path()), 1);
        assert!(dir.path().join("out").join("packages.sha256").exists());
        let log = fs::read_to_string(dir.path().join("out").join("packages.log")).unwrap();
        assert!(log.lines().next().unwrap().contains(" ensure -ensure-file "));
    }

    #[test]
    fn test_trusted_rerun_skips_install() {
        let dir = tempdir().unwrap();
        let config = setup_project(dir.path());
        let client = write_client(dir.path(), true, true, 0);

        update(dir.path(), &config, &client).arg("--trust-hash").assert().success();
        update(dir.path(), &config, &client).arg("--trust-hash").assert().success();
        assert_eq!(calls(dir.path()), 1);

        update(dir.path(), &config, &client).assert().success();
        assert_eq!(calls(dir.path()), 2);
    }

    #[test]
    fn test_json_format() {
        let dir = tempdir().unwrap();
        let config = setup_project(dir.path());
        let client = write_client(dir.path(), true, true, 0);
        let output = update(dir.path(), &config, &client)
            .args(["--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let actions: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(actions[0]["action"], "prepend");
        assert_eq!(actions[0]["key"], "PATH");
    }

    #[test]
    fn test_failed_install_shows_log() {
        let dir = tempdir().unwrap();
        let config = setup_project(dir.path());
        let client = write_client(dir.path(), true, true, 3);
        let output = update(dir.path(), &config, &client)
            .assert()
            .failure()
            .get_output()
            .stderr
            .clone();
        let stderr = String::from_utf8_lossy(&output);
        assert!(stderr.contains("exit code 3"));
        assert!(stderr.contains("boom: ensure output"));
        assert!(!dir.path().join("out").join("packages.sha256").exists());
    }

    #[test]
    fn test_access_denied_after_login() {
        let dir = tempdir().unwrap();
        let config = setup_project(dir.path());
        let client = write_client(dir.path(), false, false, 0);
        let output = update(dir.path(), &config, &client)
            .assert()
            .failure()
            .get_output()
            .stderr
            .clone();
        let stderr = String::from_utf8_lossy(&output);
        assert!(stderr.contains("does not have access"));
        assert!(stderr.contains("  infra/cmake"));
        assert_eq!(calls(dir.path()), 0);
    }
}
