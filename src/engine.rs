use std::thread;
use std::time::{Duration, Instant};

use crate::actions::ActionCatalog;
use crate::error::{Error, Result};
use crate::models::SimConfig;
use crate::outcome::{outcome_channel, OutcomeReceiver};
use crate::output::ReportSink;
use crate::phase::{self, Phase};
use crate::pool::WorkerPool;
use crate::state::{RunSummary, SimulatorState};
use crate::stats::{AggregatorHandle, StatsAggregator};

/// Drives one load test from ramp-up to finish.
pub struct Simulator {
    config: SimConfig,
    pool: WorkerPool,
    receiver: OutcomeReceiver,
    sink: Box<dyn ReportSink>,
}

impl Simulator {
    /// Fails on invalid configuration, before anything is launched.
    pub fn new(config: SimConfig, catalog: ActionCatalog, sink: Box<dyn ReportSink>) -> Result<Self> {
        validate_config(&config)?;
        let (sender, receiver) = outcome_channel();
        let pool = WorkerPool::new(
            catalog,
            sender,
            config.load.timeout,
            config.control.launch_policy,
            config.seed,
        );

        Ok(Self {
            config,
            pool,
            receiver,
            sink,
        })
    }

    pub fn run(self) -> Result<RunSummary> {
        let Simulator {
            config,
            mut pool,
            receiver,
            sink,
        } = self;
        let load = &config.load;
        let control = &config.control;

        let started = Instant::now();
        let mut state = SimulatorState::new(started);
        let aggregator = StatsAggregator::new(receiver, pool.active_set(), started);
        let aggregator = AggregatorHandle::spawn(aggregator, control.report_interval, sink)?;

        tracing::info!(
            peak_users = load.peak_users,
            ramp_up_ms = load.ramp_up.as_millis() as u64,
            full_load_ms = load.full_load.as_millis() as u64,
            ramp_down_ms = load.ramp_down.as_millis() as u64,
            launch_policy = %control.launch_policy,
            "starting load test"
        );

        let mut last_progress: Option<Instant> = None;
        let mut slowest_tick = Duration::ZERO;

        loop {
            let tick_started = Instant::now();

            if let Some(next) =
                phase::next_phase(state.phase, pool.active(), state.phase_elapsed(), load)
            {
                state.enter(next, Instant::now());
                tracing::info!(phase = %next, active = pool.active(), "entering phase");
            }
            if state.phase.is_finished() {
                break;
            }

            let target = phase::target_concurrency(state.phase, state.phase_elapsed(), load);
            let reconcile = pool.reconcile(target);

            let now = Instant::now();
            if progress_due(reconcile.changed(), last_progress, now, control.progress_interval) {
                tracing::info!(
                    phase = %state.phase,
                    active = reconcile.active,
                    peak = load.peak_users,
                    "current number of users: {}/{}",
                    reconcile.active,
                    load.peak_users
                );
                last_progress = Some(now);
            }

            let spent = tick_started.elapsed();
            slowest_tick = slowest_tick.max(spent);
            if let Some(remaining) = control.tick.checked_sub(spent) {
                thread::sleep(remaining);
            }
        }

        // In-flight workers are left to finish on their own.
        let report = aggregator.finish()?;
        let duration = started.elapsed();
        tracing::info!(
            outcomes = report.totals.outcome_count,
            success_rate = report.totals.success_rate,
            duration_ms = duration.as_millis() as u64,
            "load test finished"
        );

        Ok(RunSummary {
            phases: state.history,
            launched_users: pool.launched(),
            peak_active: pool.peak_active(),
            snapshots: report.snapshots,
            aggregation_stalls: report.stalls,
            totals: report.totals,
            duration,
            slowest_tick,
        })
    }
}

/// Population log lines are skipped when nothing changed or the previous
/// one is younger than `interval`.
fn progress_due(changed: bool, last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    changed && last.map_or(true, |at| now.saturating_duration_since(at) >= interval)
}

pub fn run_simulation(
    config: &SimConfig,
    catalog: ActionCatalog,
    sink: Box<dyn ReportSink>,
) -> Result<RunSummary> {
    Simulator::new(config.clone(), catalog, sink)?.run()
}

pub fn validate_config(config: &SimConfig) -> Result<()> {
    let load = &config.load;
    if load.peak_users == 0 {
        return Err(Error::PeakUsersZero);
    }
    let durations = [
        ("ramp up", load.ramp_up),
        ("full load", load.full_load),
        ("ramp down", load.ramp_down),
        ("timeout", load.timeout),
        ("tick", config.control.tick),
        ("report interval", config.control.report_interval),
    ];
    for (field, value) in durations {
        if value.is_zero() {
            return Err(Error::NonPositiveDuration(field));
        }
    }
    Ok(())
}
