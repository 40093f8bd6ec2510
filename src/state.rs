use std::time::{Duration, Instant};

use serde::Serialize;

use crate::phase::Phase;
use crate::stats::RunTotals;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PhaseChange {
    pub phase: Phase,
    /// Offset from the start of the run.
    #[serde(rename = "at_ms", serialize_with = "crate::stats::as_millis")]
    pub at: Duration,
}

/// Orchestrator-owned control state.
#[derive(Clone, Debug)]
pub struct SimulatorState {
    pub phase: Phase,
    pub run_started: Instant,
    pub phase_started: Instant,
    pub history: Vec<PhaseChange>,
}

impl SimulatorState {
    pub fn new(now: Instant) -> Self {
        Self {
            phase: Phase::RampUp,
            run_started: now,
            phase_started: now,
            history: vec![PhaseChange {
                phase: Phase::RampUp,
                at: Duration::ZERO,
            }],
        }
    }

    pub fn phase_elapsed(&self) -> Duration {
        self.phase_started.elapsed()
    }

    pub fn enter(&mut self, phase: Phase, now: Instant) {
        self.phase = phase;
        self.phase_started = now;
        self.history.push(PhaseChange {
            phase,
            at: now.duration_since(self.run_started),
        });
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub phases: Vec<PhaseChange>,
    pub launched_users: u64,
    pub peak_active: usize,
    pub snapshots: usize,
    pub aggregation_stalls: usize,
    pub totals: RunTotals,
    #[serde(rename = "duration_ms", serialize_with = "crate::stats::as_millis")]
    pub duration: Duration,
    #[serde(rename = "slowest_tick_ms", serialize_with = "crate::stats::as_millis")]
    pub slowest_tick: Duration,
}

impl RunSummary {
    pub fn phase_sequence(&self) -> Vec<Phase> {
        self.phases.iter().map(|change| change.phase).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_starts_in_ramp_up_and_records_transitions() {
        let start = Instant::now();
        let mut state = SimulatorState::new(start);
        assert_eq!(state.phase, Phase::RampUp);

        state.enter(Phase::FullLoad, start + Duration::from_millis(40));
        assert_eq!(state.phase, Phase::FullLoad);
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[1].at, Duration::from_millis(40));
    }
}
