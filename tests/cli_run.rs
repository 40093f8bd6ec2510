use predicates::str::contains;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(prefix: &str, extension: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be available")
        .as_nanos();
    path.push(format!("{}-{}.{}", prefix, nanos, extension));
    path
}

const QUICK: [&str; 12] = [
    "--peak-users",
    "3",
    "--ramp-up",
    "100ms",
    "--full-load",
    "100ms",
    "--ramp-down",
    "100ms",
    "--tick",
    "5ms",
    "--report-interval",
    "50ms",
];

#[test]
fn run_human_prints_snapshots_and_summary() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.arg("run")
        .args(QUICK)
        .args(["--action", "browse:1:1-3", "--seed", "5"]);
    cmd.assert()
        .success()
        .stdout(contains("users="))
        .stdout(contains("] total users=0"))
        .stdout(contains("Phases:\nramp-up at 0.0ms\nfull-load at "))
        .stdout(contains("finished at "))
        .stdout(contains("success rate: 100.00%"));
}

#[test]
fn run_json_emits_one_object_per_line() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.arg("run")
        .args(QUICK)
        .args(["--action", "browse:0.5:1:1", "--action", "login:0.5:2:1"])
        .args(["--format", "json"]);
    let output = cmd.output().expect("binary should run");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    let values: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("every stdout line is json"))
        .collect();
    let (summary, snapshots) = values.split_last().expect("at least one line");

    assert!(snapshots.iter().any(|value| value["scope"] == "window"));
    assert_eq!(snapshots.last().expect("final snapshot")["scope"], "run");
    assert!(snapshots.iter().all(|value| value["success_rate"] == 0.0));
    assert_eq!(summary["summary"]["totals"]["success_rate"], 0.0);
    assert_eq!(summary["summary"]["phases"][3]["phase"], "finished");
}

#[test]
fn run_writes_report_file() {
    let report = temp_path("ramp-sim-report", "json");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.arg("run")
        .args(QUICK)
        .args(["--action", "browse:1:1"])
        .args(["--output", report.to_str().unwrap()]);
    cmd.assert().success();

    let contents = fs::read_to_string(&report).expect("report should be written");
    let value: serde_json::Value = serde_json::from_str(&contents).expect("valid json");
    let snapshots = value["snapshots"].as_array().expect("snapshots array");
    assert!(!snapshots.is_empty());
    assert_eq!(snapshots.last().unwrap()["scope"], "run");
    assert_eq!(value["totals"]["success_rate"], 1.0);
    let _ = fs::remove_file(&report);
}

#[test]
fn run_from_toml_config() {
    let config = r#"
seed = 1

[load]
peak_users = 2
ramp_up = "80ms"
full_load = "80ms"
ramp_down = "80ms"
timeout = "1s"

[control]
tick = "5ms"
report_interval = "40ms"
launch_policy = "one-per-tick"

[[actions]]
name = "slow"
weight = 1.0
min_latency = "30ms"
max_latency = "30ms"
"#;
    let path = temp_path("ramp-sim-config", "toml");
    fs::write(&path, config).expect("config write should succeed");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.args(["run", "--config", path.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(contains("peak active: 2"))
        .stdout(contains("success rate: 100.00%"));
    let _ = fs::remove_file(&path);
}
