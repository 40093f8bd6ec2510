use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::models::LoadProfile;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    RampUp,
    FullLoad,
    RampDown,
    Finished,
}

impl Phase {
    pub fn is_finished(self) -> bool {
        self == Phase::Finished
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::RampUp => "ramp-up",
            Phase::FullLoad => "full-load",
            Phase::RampDown => "ramp-down",
            Phase::Finished => "finished",
        };
        f.write_str(label)
    }
}

/// Number of concurrent users the pool should hold `elapsed` into `phase`.
///
/// Ramp-up rounds up so the next user is due slightly early; ramp-down rounds
/// down so retirement is early as well.
pub fn target_concurrency(phase: Phase, elapsed: Duration, load: &LoadProfile) -> usize {
    let peak = load.peak_users as f64;
    match phase {
        Phase::RampUp => {
            let fraction = elapsed.as_secs_f64() / load.ramp_up.as_secs_f64();
            ((peak * fraction).ceil() as usize).min(load.peak_users)
        }
        Phase::FullLoad => load.peak_users,
        Phase::RampDown => {
            let fraction = elapsed.as_secs_f64() / load.ramp_down.as_secs_f64();
            (peak * (1.0 - fraction)).floor().max(0.0) as usize
        }
        Phase::Finished => 0,
    }
}

/// Phase to move to given the current population, or `None` to stay.
pub fn next_phase(
    phase: Phase,
    active: usize,
    elapsed: Duration,
    load: &LoadProfile,
) -> Option<Phase> {
    match phase {
        Phase::RampUp if active >= load.peak_users => Some(Phase::FullLoad),
        Phase::FullLoad if elapsed >= load.full_load => Some(Phase::RampDown),
        Phase::RampDown if active == 0 => Some(Phase::Finished),
        _ => None,
    }
}
