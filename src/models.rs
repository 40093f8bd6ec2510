use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SimConfig {
    #[serde(default)]
    pub load: LoadProfile,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

/// Shape of the ramp: how many users at peak and how long each phase lasts.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoadProfile {
    pub peak_users: usize,
    #[serde(with = "humantime_serde")]
    pub ramp_up: Duration,
    #[serde(with = "humantime_serde")]
    pub full_load: Duration,
    #[serde(with = "humantime_serde")]
    pub ramp_down: Duration,
    /// Budget handed to every action call. Actions enforce it themselves.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self {
            peak_users: 5,
            ramp_up: Duration::from_secs(5),
            full_load: Duration::from_secs(5),
            ramp_down: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    /// Minimum duration of one control-loop iteration.
    #[serde(with = "humantime_serde")]
    pub tick: Duration,
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub progress_interval: Duration,
    pub launch_policy: LaunchPolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(20),
            report_interval: Duration::from_secs(1),
            progress_interval: Duration::from_secs(2),
            launch_policy: LaunchPolicy::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchPolicy {
    /// Launch the whole gap between target and population each tick.
    #[default]
    FullDeficit,
    /// Launch at most one worker per tick.
    OnePerTick,
}

impl fmt::Display for LaunchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LaunchPolicy::FullDeficit => "full-deficit",
            LaunchPolicy::OnePerTick => "one-per-tick",
        };
        f.write_str(label)
    }
}

/// A simulated action as described in a config file or on the command line.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ActionConfig {
    pub name: String,
    pub weight: f64,
    #[serde(with = "humantime_serde")]
    pub min_latency: Duration,
    #[serde(with = "humantime_serde")]
    pub max_latency: Duration,
    #[serde(default)]
    pub failure_rate: f64,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default = "default_failure_status")]
    pub failure_status: u16,
}

fn default_status() -> u16 {
    200
}

fn default_failure_status() -> u16 {
    500
}

impl ActionConfig {
    pub fn new(name: impl Into<String>, weight: f64, latency: Duration) -> Self {
        Self {
            name: name.into(),
            weight,
            min_latency: latency,
            max_latency: latency,
            failure_rate: 0.0,
            status: default_status(),
            failure_status: default_failure_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_fills_defaults() {
        let config: SimConfig = toml::from_str(
            r#"
seed = 7

[load]
peak_users = 12
ramp_up = "2s"

[[actions]]
name = "browse"
weight = 1.0
min_latency = "10ms"
max_latency = "30ms"
"#,
        )
        .expect("config should parse");

        assert_eq!(config.load.peak_users, 12);
        assert_eq!(config.load.ramp_up, Duration::from_secs(2));
        assert_eq!(config.load.full_load, Duration::from_secs(5));
        assert_eq!(config.load.timeout, Duration::from_secs(10));
        assert_eq!(config.control, ControlConfig::default());
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.actions[0].status, 200);
        assert_eq!(config.actions[0].failure_status, 500);
        assert_eq!(config.actions[0].failure_rate, 0.0);
    }

    #[test]
    fn launch_policy_uses_kebab_case() {
        let control: ControlConfig =
            serde_json::from_str(r#"{"launch_policy":"one-per-tick","tick":"5ms"}"#)
                .expect("control should parse");
        assert_eq!(control.launch_policy, LaunchPolicy::OnePerTick);
        assert_eq!(control.tick, Duration::from_millis(5));
        assert_eq!(LaunchPolicy::FullDeficit.to_string(), "full-deficit");
    }
}
