use predicates::str::contains;

#[test]
fn weights_must_sum_to_one() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.args(["run", "--action", "a:0.5:10", "--action", "b:0.4:10"]);
    cmd.assert()
        .failure()
        .stderr(contains("Error: action weights must sum to 1"));
}

#[test]
fn actions_are_required() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.arg("run");
    cmd.assert()
        .failure()
        .stderr(contains("Error: at least one action is required"));
}

#[test]
fn zero_peak_users_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.args(["run", "--peak-users", "0", "--action", "a:1:10"]);
    cmd.assert()
        .failure()
        .stderr(contains("Error: peak users must be greater than 0"));
}

#[test]
fn zero_duration_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.args(["show-config", "--full-load", "0s", "--action", "a:1:10"]);
    cmd.assert()
        .failure()
        .stderr(contains("Error: full load must be greater than 0"));
}

#[test]
fn malformed_action_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.args(["run", "--action", "browse:heavy:10"]);
    cmd.assert().failure().stderr(contains(
        "Error: invalid action entry 'browse:heavy:10': expected name:weight:min_ms[-max_ms][:failure_rate]",
    ));
}

#[test]
fn inverted_latency_range_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.args(["show-config", "--action", "browse:1:80-20"]);
    cmd.assert().failure().stderr(contains(
        "Error: latency range for 'browse' is empty: min must not exceed max",
    ));
}

#[test]
fn missing_config_file_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.args(["run", "--config", "does-not-exist.toml"]);
    cmd.assert()
        .failure()
        .stderr(contains("Error: failed to read config 'does-not-exist.toml'"));
}

#[test]
fn unparseable_duration_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ramp-sim");
    cmd.args(["run", "--tick", "soon", "--action", "a:1:10"]);
    cmd.assert()
        .failure()
        .stderr(contains("invalid duration 'soon'"));
}
