use assert_cmd::Command;
use predicates::prelude::*;

fn touchstone(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("touchstone").unwrap();
    cmd.current_dir(dir);
    cmd
}

#[test]
fn init_run_result_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    touchstone(dir.path())
        .args(["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("audit.yaml"));

    // The sample page: initial load, after the cookie script, after the
    // help interaction.
    touchstone(dir.path())
        .args(["run", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"session_id\": 1"))
        .stdout(predicate::str::contains("initial load"));

    let output = touchstone(dir.path())
        .args(["run", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let states = v["states"].as_array().unwrap();
    assert_eq!(states.len(), 3);
    // Banner violations present initially, gone after the script.
    assert_eq!(states[0]["counts"]["violations"], 3);
    assert_eq!(states[1]["counts"]["violations"], 1);
    // Help dialog adds its warning in the interaction state.
    assert_eq!(states[2]["counts"]["warnings"], 1);
    assert!(v["truncated"].is_null());

    let first_id = states[0]["id"].as_i64().unwrap();
    touchstone(dir.path())
        .args(["result", &first_id.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("img/missing-alt"));

    touchstone(dir.path())
        .args([
            "query",
            "by-issue",
            "--result",
            &first_id.to_string(),
            "--category",
            "violation",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("banner/low-contrast"));

    touchstone(dir.path())
        .args(["stats", "--script", "dismiss-cookies"])
        .assert()
        .success()
        .stdout(predicate::str::contains("schema version:"))
        .stdout(predicate::str::contains("script 'dismiss-cookies'"));
}

#[test]
fn init_refuses_to_clobber_without_force() {
    let dir = tempfile::tempdir().unwrap();
    touchstone(dir.path()).args(["init"]).assert().success();
    touchstone(dir.path()).args(["init"]).assert().failure();
    touchstone(dir.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn run_rejects_unknown_config_fields_in_strict_mode() {
    let dir = tempfile::tempdir().unwrap();
    touchstone(dir.path()).args(["init"]).assert().success();

    let config = dir.path().join("audit.yaml");
    let mut raw = std::fs::read_to_string(&config).unwrap();
    raw.push_str("crawl_depth: 3\n");
    std::fs::write(&config, raw).unwrap();

    touchstone(dir.path())
        .args(["run", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("crawl_depth"));

    touchstone(dir.path()).args(["run"]).assert().success();
}
