//! Integration tests for the `ovnlab` CLI binary.
//!
//! Argument parsing, lab validation, exit codes and dry-run planning. The
//! dry-run tests talk to a throwaway OVSDB responder on a unix socket.
#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};

const LAB: &str = r#"{
    "vpc": {"name": "vlab", "mac_prefix": "e1:cc:ff", "id": 1},
    "switches": [
        {"name": "ls1", "id": 1, "type": "normal", "subnet": "10.0.1.0/24", "port_count": 2}
    ]
}"#;

/// Build a command with an isolated config environment.
fn ovnlab_cmd(home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("ovnlab");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG")
        .env_remove("OVNLAB_OUTPUT")
        .env_remove("OVNLAB_TIMEOUT")
        .env_remove("OVNLAB_NB_CONNECTION")
        .env_remove("OVNLAB_SOCKET_DIR")
        .env_remove("OVNLAB_LOG_LEVEL")
        .env_remove("OVNLAB_JSON_LOGS")
        .env("NO_COLOR", "1");
    cmd
}

fn write_lab(dir: &Path, doc: &str) -> PathBuf {
    let path = dir.join("lab.json");
    std::fs::write(&path, doc).unwrap();
    path
}

/// Serve an empty Northbound database on `<dir>/ovnnb_db.sock`: every
/// select returns no rows.
fn fake_northbound(dir: &Path) {
    serve_northbound(dir, |_| json!({"rows": []}));
}

/// Serve `<dir>/ovnnb_db.sock`, answering each transact operation with
/// `reply(op)`.
fn serve_northbound(dir: &Path, reply: fn(&Value) -> Value) {
    let listener = UnixListener::bind(dir.join("ovnnb_db.sock")).unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let mut writer = stream.try_clone().unwrap();
            let requests = serde_json::Deserializer::from_reader(stream).into_iter::<Value>();
            for request in requests {
                let Ok(request) = request else { break };
                let result = match request["method"].as_str() {
                    Some("list_dbs") => json!(["OVN_Northbound"]),
                    Some("transact") => Value::Array(
                        request["params"]
                            .as_array()
                            .unwrap()
                            .iter()
                            .skip(1)
                            .map(reply)
                            .collect(),
                    ),
                    _ => request["params"].clone(),
                };
                let reply = json!({"id": request["id"], "result": result, "error": null});
                if writer.write_all(reply.to_string().as_bytes()).is_err() {
                    break;
                }
            }
        }
    });
}

/// Accepts switches, then refuses every logical switch port insert.
fn rejects_ports(op: &Value) -> Value {
    let uuid = json!(["uuid", "6f1c2a4e-0d3b-4c5a-9e8f-1a2b3c4d5e6f"]);
    match (op["op"].as_str(), op["table"].as_str()) {
        (Some("insert"), Some("Logical_Switch_Port")) => {
            json!({"error": "constraint violation", "details": "port refused"})
        }
        (Some("insert"), _) => json!({"uuid": uuid}),
        (Some("mutate" | "update" | "delete"), _) => json!({"count": 1}),
        // Name lookups find the switch; listings stay empty.
        (Some("select"), Some("Logical_Switch")) if op["columns"] == json!(["_uuid"]) => {
            json!({"rows": [{"_uuid": uuid}]})
        }
        _ => json!({"rows": []}),
    }
}

// ── Help and version ────────────────────────────────────────────────

#[test]
fn no_args_prints_usage() {
    let home = tempfile::tempdir().unwrap();
    ovnlab_cmd(home.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    ovnlab_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn version_flag() {
    let home = tempfile::tempdir().unwrap();
    ovnlab_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ovnlab"));
}

#[test]
fn completions_generate_for_bash() {
    let home = tempfile::tempdir().unwrap();
    ovnlab_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ovnlab"));
}

// ── Validate ────────────────────────────────────────────────────────

#[test]
fn validate_shows_topology() {
    let home = tempfile::tempdir().unwrap();
    let lab = write_lab(home.path(), LAB);
    ovnlab_cmd(home.path())
        .args(["validate", "--config"])
        .arg(&lab)
        .assert()
        .success()
        .stdout(predicate::str::contains("vlab-ls1-lsp2"))
        .stdout(predicate::str::contains("e1:cc:ff:01:01:02"));
}

#[test]
fn validate_plain_lists_names() {
    let home = tempfile::tempdir().unwrap();
    let lab = write_lab(home.path(), LAB);
    ovnlab_cmd(home.path())
        .args(["validate", "--output", "plain", "--config"])
        .arg(&lab)
        .assert()
        .success()
        .stdout("vlab-ls1\nvlab-ls1-lsp1\nvlab-ls1-lsp2\n");
}

#[test]
fn validate_json_is_machine_readable() {
    let home = tempfile::tempdir().unwrap();
    let lab = write_lab(home.path(), LAB);
    let out = ovnlab_cmd(home.path())
        .args(["validate", "-o", "json", "--config"])
        .arg(&lab)
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["vpc"], "vlab");
    assert_eq!(v["switches"][0]["ports"].as_array().unwrap().len(), 2);
}

#[test]
fn invalid_lab_exits_with_usage_code() {
    let home = tempfile::tempdir().unwrap();
    let lab = write_lab(
        home.path(),
        r#"{"vpc": {"name": "vlab", "mac_prefix": "e1:cc:ff", "id": 1},
            "switches": [{"name": "ls1", "id": 1, "type": "normal", "subnet": "10.0.1.0/33",
                          "port_count": 2}]}"#,
    );
    ovnlab_cmd(home.path())
        .args(["validate", "--config"])
        .arg(&lab)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("switches[0].subnet"));
}

#[test]
fn missing_lab_file_exits_with_usage_code() {
    let home = tempfile::tempdir().unwrap();
    ovnlab_cmd(home.path())
        .args(["validate", "--config"])
        .arg(home.path().join("absent.json"))
        .assert()
        .failure()
        .code(2);
}

// ── Build / destroy ─────────────────────────────────────────────────

#[test]
fn build_without_database_is_a_connection_error() {
    let home = tempfile::tempdir().unwrap();
    let lab = write_lab(home.path(), LAB);
    ovnlab_cmd(home.path())
        .args(["build", "--timeout", "2", "--config"])
        .arg(&lab)
        .arg("--socket-dir")
        .arg(home.path().join("no-ovn"))
        .assert()
        .failure()
        .code(7)
        .stderr(predicate::str::contains("ovnnb_db.sock"));
}

#[test]
fn bad_connection_string_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let lab = write_lab(home.path(), LAB);
    ovnlab_cmd(home.path())
        .args(["build", "--nb-connection", "ssl:10.0.0.1:6641", "--config"])
        .arg(&lab)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("nb_connection"));
}

#[test]
fn dry_run_build_plans_every_object() {
    let home = tempfile::tempdir().unwrap();
    let lab = write_lab(home.path(), LAB);
    fake_northbound(home.path());

    let out = ovnlab_cmd(home.path())
        .args(["build", "--dry-run", "-o", "json", "--timeout", "5", "--config"])
        .arg(&lab)
        .arg("--socket-dir")
        .arg(home.path())
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let plan: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(plan["direction"], "build");
    let names: Vec<&str> = plan["operations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|op| op["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["vlab-ls1", "vlab-ls1-lsp1", "vlab-ls1-lsp2"]);
}

#[test]
fn dry_run_destroy_of_absent_lab_is_empty() {
    let home = tempfile::tempdir().unwrap();
    let lab = write_lab(home.path(), LAB);
    fake_northbound(home.path());

    ovnlab_cmd(home.path())
        .args(["destroy", "--dry-run", "-o", "plain", "--timeout", "5", "--config"])
        .arg(&lab)
        .arg("--socket-dir")
        .arg(home.path())
        .assert()
        .success()
        .stdout("");
}

#[test]
fn failed_build_lists_applied_and_pending_operations() {
    let home = tempfile::tempdir().unwrap();
    let lab = write_lab(home.path(), LAB);
    serve_northbound(home.path(), rejects_ports);

    ovnlab_cmd(home.path())
        .args(["build", "--timeout", "5", "--config"])
        .arg(&lab)
        .arg("--socket-dir")
        .arg(home.path())
        .assert()
        .failure()
        .code(9)
        .stderr(predicate::str::contains("vlab-ls1-lsp1"))
        .stderr(predicate::str::contains("port refused"))
        .stderr(predicate::str::contains("applied: create logical-switch 'vlab-ls1'"))
        .stderr(predicate::str::contains(
            "not attempted: create logical-switch-port 'vlab-ls1-lsp2'",
        ));
}

#[test]
fn destroy_requires_yes_when_not_interactive() {
    let home = tempfile::tempdir().unwrap();
    let lab = write_lab(home.path(), LAB);
    ovnlab_cmd(home.path())
        .args(["destroy", "--config"])
        .arg(&lab)
        .write_stdin("")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn config_show_renders_resolved_settings() {
    let home = tempfile::tempdir().unwrap();
    ovnlab_cmd(home.path())
        .args(["--timeout", "9", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout = 9"))
        .stdout(predicate::str::contains("socket_dir"));
}

#[test]
fn config_path_points_at_config_toml() {
    let home = tempfile::tempdir().unwrap();
    ovnlab_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}
