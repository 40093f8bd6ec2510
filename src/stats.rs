//! Windowed statistics over outcomes and the periodic task that publishes
//! them.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Sender};
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::outcome::{Outcome, OutcomeReceiver};
use crate::output::ReportSink;
use crate::pool::ActiveSet;

/// Mergeable accumulator over outcome latencies and successes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Window {
    count: u64,
    successes: u64,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
}

impl Window {
    pub fn consume(&mut self, outcome: &Outcome) {
        self.count += 1;
        if outcome.success {
            self.successes += 1;
        }
        self.total += outcome.elapsed;
        self.min = Some(self.min.map_or(outcome.elapsed, |min| min.min(outcome.elapsed)));
        self.max = self.max.max(outcome.elapsed);
    }

    pub fn merge(&mut self, other: &Window) {
        self.count += other.count;
        self.successes += other.successes;
        self.total += other.total;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = self.max.max(other.max);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Zero-valued when the window saw nothing.
    pub fn stats(&self) -> LatencyStats {
        if self.count == 0 {
            return LatencyStats::default();
        }
        LatencyStats {
            outcome_count: self.count,
            success_count: self.successes,
            avg_latency: avg(self.total, self.count),
            min_latency: self.min.unwrap_or_default(),
            max_latency: self.max,
            success_rate: self.successes as f64 / self.count as f64,
        }
    }
}

fn avg(total: Duration, count: u64) -> Duration {
    Duration::from_nanos((total.as_nanos() / count as u128) as u64)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub outcome_count: u64,
    pub success_count: u64,
    #[serde(rename = "avg_latency_ms", serialize_with = "as_millis")]
    pub avg_latency: Duration,
    #[serde(rename = "min_latency_ms", serialize_with = "as_millis")]
    pub min_latency: Duration,
    #[serde(rename = "max_latency_ms", serialize_with = "as_millis")]
    pub max_latency: Duration,
    pub success_rate: f64,
}

/// Cumulative statistics of a whole run.
pub type RunTotals = LatencyStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotScope {
    /// Outcomes drained since the previous snapshot.
    Window,
    /// Every outcome of the run; emitted once, last.
    Run,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsSnapshot {
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub scope: SnapshotScope,
    pub active_users: usize,
    pub outcome_count: u64,
    #[serde(rename = "avg_latency_ms", serialize_with = "as_millis")]
    pub avg_latency: Duration,
    #[serde(rename = "min_latency_ms", serialize_with = "as_millis")]
    pub min_latency: Duration,
    #[serde(rename = "max_latency_ms", serialize_with = "as_millis")]
    pub max_latency: Duration,
    pub success_rate: f64,
}

impl StatsSnapshot {
    fn new(elapsed: Duration, scope: SnapshotScope, active_users: usize, stats: LatencyStats) -> Self {
        Self {
            elapsed,
            scope,
            active_users,
            outcome_count: stats.outcome_count,
            avg_latency: stats.avg_latency,
            min_latency: stats.min_latency,
            max_latency: stats.max_latency,
            success_rate: stats.success_rate,
        }
    }

    /// `[active_users, outcome_count, avg_s, success_rate, max_s, min_s]`
    pub fn row(&self) -> [f64; 6] {
        [
            self.active_users as f64,
            self.outcome_count as f64,
            self.avg_latency.as_secs_f64(),
            self.success_rate,
            self.max_latency.as_secs_f64(),
            self.min_latency.as_secs_f64(),
        ]
    }
}

pub(crate) fn as_millis<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_nanos() as f64 / 1_000_000.0)
}

/// Drains the outcome channel and turns each drain into a snapshot.
pub struct StatsAggregator {
    receiver: OutcomeReceiver,
    active: ActiveSet,
    started: Instant,
    totals: Window,
}

impl StatsAggregator {
    pub fn new(receiver: OutcomeReceiver, active: ActiveSet, started: Instant) -> Self {
        Self {
            receiver,
            active,
            started,
            totals: Window::default(),
        }
    }

    fn drain(&mut self) -> Window {
        let mut window = Window::default();
        for batch in self.receiver.drain() {
            for outcome in &batch.outcomes {
                window.consume(outcome);
            }
        }
        self.totals.merge(&window);
        window
    }

    /// One drain cycle, labeled with the population at this instant.
    pub fn collect(&mut self) -> StatsSnapshot {
        let window = self.drain();
        StatsSnapshot::new(
            self.started.elapsed(),
            SnapshotScope::Window,
            self.active.len(),
            window.stats(),
        )
    }

    /// Drains what is left and summarizes the whole run.
    pub fn finish(&mut self) -> StatsSnapshot {
        self.drain();
        StatsSnapshot::new(
            self.started.elapsed(),
            SnapshotScope::Run,
            self.active.len(),
            self.totals.stats(),
        )
    }

    pub fn totals(&self) -> RunTotals {
        self.totals.stats()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AggregatorReport {
    /// Snapshots handed to the sink, the final one included.
    pub snapshots: usize,
    pub stalls: usize,
    pub totals: RunTotals,
}

/// Running aggregator thread.
pub struct AggregatorHandle {
    shutdown: Sender<()>,
    handle: JoinHandle<Result<AggregatorReport>>,
}

impl AggregatorHandle {
    pub fn spawn(
        aggregator: StatsAggregator,
        interval: Duration,
        sink: Box<dyn ReportSink>,
    ) -> Result<Self> {
        let (shutdown, stop) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name("stats-aggregator".to_string())
            .spawn(move || run_aggregator(aggregator, interval, sink, stop))
            .map_err(|err| Error::Spawn("aggregator", err))?;
        Ok(Self { shutdown, handle })
    }

    /// Forces the final snapshot, finalizes the sink and waits for the
    /// aggregator to exit.
    pub fn finish(self) -> Result<AggregatorReport> {
        let _ = self.shutdown.send(());
        self.handle
            .join()
            .map_err(|_| Error::ThreadPanicked("aggregator"))?
    }
}

fn run_aggregator(
    mut aggregator: StatsAggregator,
    interval: Duration,
    mut sink: Box<dyn ReportSink>,
    stop: crossbeam_channel::Receiver<()>,
) -> Result<AggregatorReport> {
    let ticker = crossbeam_channel::tick(interval);
    let mut snapshots = 0;
    let mut stalls = 0;

    loop {
        select! {
            recv(ticker) -> _ => {
                let cycle = Instant::now();
                let snapshot = aggregator.collect();
                publish(sink.as_mut(), &snapshot);
                snapshots += 1;
                let took = cycle.elapsed();
                if took > interval {
                    stalls += 1;
                    tracing::warn!(
                        took_ms = took.as_millis() as u64,
                        interval_ms = interval.as_millis() as u64,
                        "aggregation cycle overran its interval"
                    );
                }
            }
            recv(stop) -> _ => break,
        }
    }

    let last = aggregator.finish();
    publish(sink.as_mut(), &last);
    snapshots += 1;
    let totals = aggregator.totals();
    sink.finalize(&totals)?;

    Ok(AggregatorReport {
        snapshots,
        stalls,
        totals,
    })
}

fn publish(sink: &mut dyn ReportSink, snapshot: &StatsSnapshot) {
    if let Err(err) = sink.record(snapshot) {
        tracing::warn!(error = %err, "report sink rejected snapshot");
    }
}
