use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use humantime_serde::re::humantime;

use crate::error::{Error, Result};
use crate::models::{ActionConfig, LaunchPolicy, SimConfig};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ramp-sim", about = "Ramp virtual users through a timed load test")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a load test and stream snapshots to stdout
    Run(RunArgs),
    /// Print the resolved configuration without running
    ShowConfig(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    #[arg(long, value_enum, default_value_t = FormatArg::Human)]
    pub format: FormatArg,
    #[arg(long, help = "Write every snapshot and the run totals to this JSON file")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    #[arg(long, help = "TOML or JSON configuration file")]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub peak_users: Option<usize>,
    #[arg(long, value_parser = parse_duration)]
    pub ramp_up: Option<Duration>,
    #[arg(long, value_parser = parse_duration)]
    pub full_load: Option<Duration>,
    #[arg(long, value_parser = parse_duration)]
    pub ramp_down: Option<Duration>,
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,
    #[arg(long, value_parser = parse_duration)]
    pub tick: Option<Duration>,
    #[arg(long, value_parser = parse_duration)]
    pub report_interval: Option<Duration>,
    #[arg(long, value_parser = parse_duration)]
    pub progress_interval: Option<Duration>,
    #[arg(long, value_enum)]
    pub launch_policy: Option<LaunchPolicyArg>,
    #[arg(
        long = "action",
        help = "Simulated action name:weight:min_ms[-max_ms][:failure_rate]; repeatable, replaces config file actions"
    )]
    pub actions: Vec<String>,
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Human,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Human => OutputFormat::Human,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchPolicyArg {
    FullDeficit,
    OnePerTick,
}

impl From<LaunchPolicyArg> for LaunchPolicy {
    fn from(value: LaunchPolicyArg) -> Self {
        match value {
            LaunchPolicyArg::FullDeficit => LaunchPolicy::FullDeficit,
            LaunchPolicyArg::OnePerTick => LaunchPolicy::OnePerTick,
        }
    }
}

pub fn parse_args() -> Result<Cli> {
    Cli::try_parse().map_err(|err| match err.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => err.exit(),
        _ => Error::Cli(err.to_string()),
    })
}

fn parse_duration(input: &str) -> Result<Duration> {
    humantime::parse_duration(input.trim()).map_err(|_| Error::InvalidDuration(input.to_string()))
}

/// Defaults, then the config file, then flags.
pub fn build_config(args: &ConfigArgs) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SimConfig::default(),
    };

    let load = &mut config.load;
    if let Some(peak_users) = args.peak_users {
        load.peak_users = peak_users;
    }
    if let Some(ramp_up) = args.ramp_up {
        load.ramp_up = ramp_up;
    }
    if let Some(full_load) = args.full_load {
        load.full_load = full_load;
    }
    if let Some(ramp_down) = args.ramp_down {
        load.ramp_down = ramp_down;
    }
    if let Some(timeout) = args.timeout {
        load.timeout = timeout;
    }

    let control = &mut config.control;
    if let Some(tick) = args.tick {
        control.tick = tick;
    }
    if let Some(report_interval) = args.report_interval {
        control.report_interval = report_interval;
    }
    if let Some(progress_interval) = args.progress_interval {
        control.progress_interval = progress_interval;
    }
    if let Some(policy) = args.launch_policy {
        control.launch_policy = policy.into();
    }

    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if !args.actions.is_empty() {
        config.actions = args
            .actions
            .iter()
            .map(|entry| parse_action(entry))
            .collect::<Result<Vec<_>>>()?;
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<SimConfig> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::ConfigIo(format!(
            "failed to read config '{}': {}",
            path.display(),
            err
        ))
    })?;
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or("");

    match ext {
        "toml" => toml::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse TOML: {}", err))),
        "json" => serde_json::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse JSON: {}", err))),
        "" => Err(Error::UnsupportedConfigFormat("unknown".to_string())),
        _ => Err(Error::UnsupportedConfigFormat(ext.to_string())),
    }
}

/// Parses `name:weight:min_ms[-max_ms][:failure_rate]`.
pub fn parse_action(input: &str) -> Result<ActionConfig> {
    let trimmed = input.trim();
    let invalid = || Error::InvalidActionEntry(trimmed.to_string());

    let parts: Vec<&str> = trimmed.split(':').map(str::trim).collect();
    if !(3..=4).contains(&parts.len()) || parts[0].is_empty() {
        return Err(invalid());
    }

    let weight: f64 = parts[1].parse().map_err(|_| invalid())?;
    let (min_ms, max_ms) = match parts[2].split_once('-') {
        Some((min, max)) => (
            min.trim().parse::<u64>().map_err(|_| invalid())?,
            max.trim().parse::<u64>().map_err(|_| invalid())?,
        ),
        None => {
            let fixed = parts[2].parse::<u64>().map_err(|_| invalid())?;
            (fixed, fixed)
        }
    };

    let mut action = ActionConfig::new(parts[0], weight, Duration::from_millis(min_ms));
    action.max_latency = Duration::from_millis(max_ms);
    if let Some(rate) = parts.get(3) {
        action.failure_rate = rate.parse().map_err(|_| invalid())?;
    }
    Ok(action)
}

pub fn describe_config(config: &SimConfig) -> String {
    let load = &config.load;
    let control = &config.control;
    let mut output = String::new();
    let _ = writeln!(output, "Peak users: {}", load.peak_users);
    let _ = writeln!(output, "Ramp up: {}", humantime::format_duration(load.ramp_up));
    let _ = writeln!(output, "Full load: {}", humantime::format_duration(load.full_load));
    let _ = writeln!(output, "Ramp down: {}", humantime::format_duration(load.ramp_down));
    let _ = writeln!(output, "Timeout: {}", humantime::format_duration(load.timeout));
    let _ = writeln!(output, "Tick: {}", humantime::format_duration(control.tick));
    let _ = writeln!(
        output,
        "Report interval: {}",
        humantime::format_duration(control.report_interval)
    );
    let _ = writeln!(
        output,
        "Progress interval: {}",
        humantime::format_duration(control.progress_interval)
    );
    let _ = writeln!(output, "Launch policy: {}", control.launch_policy);
    match config.seed {
        Some(seed) => {
            let _ = writeln!(output, "Seed: {}", seed);
        }
        None => output.push_str("Seed: none\n"),
    }
    output.push_str("Actions:\n");
    for action in &config.actions {
        let _ = writeln!(
            output,
            "- {} (weight: {}, latency: {}..{}, failure rate: {})",
            action.name,
            action.weight,
            humantime::format_duration(action.min_latency),
            humantime::format_duration(action.max_latency),
            action.failure_rate
        );
    }
    output
}
