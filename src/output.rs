use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::state::RunSummary;
use crate::stats::{RunTotals, SnapshotScope, StatsSnapshot};

/// Consumer of snapshots. Lives on the aggregator thread.
pub trait ReportSink: Send {
    fn record(&mut self, snapshot: &StatsSnapshot) -> Result<()>;

    /// Called once after the final snapshot.
    fn finalize(&mut self, totals: &RunTotals) -> Result<()>;
}

impl ReportSink for Vec<Box<dyn ReportSink>> {
    fn record(&mut self, snapshot: &StatsSnapshot) -> Result<()> {
        let mut first_err = None;
        for sink in self.iter_mut() {
            if let Err(err) = sink.record(snapshot) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn finalize(&mut self, totals: &RunTotals) -> Result<()> {
        let mut first_err = None;
        for sink in self.iter_mut() {
            if let Err(err) = sink.finalize(totals) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Writes one line per snapshot.
pub struct ConsoleSink {
    format: OutputFormat,
    writer: Box<dyn Write + Send>,
}

impl ConsoleSink {
    pub fn new(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        Self { format, writer }
    }

    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(format, Box::new(std::io::stdout()))
    }
}

impl ReportSink for ConsoleSink {
    fn record(&mut self, snapshot: &StatsSnapshot) -> Result<()> {
        let line = match self.format {
            OutputFormat::Human => human_line(snapshot),
            OutputFormat::Json => {
                serde_json::to_string(snapshot).map_err(|err| Error::Sink(err.to_string()))?
            }
        };
        writeln!(self.writer, "{}", line).map_err(|err| Error::Sink(err.to_string()))
    }

    fn finalize(&mut self, _totals: &RunTotals) -> Result<()> {
        self.writer
            .flush()
            .map_err(|err| Error::Sink(err.to_string()))
    }
}

fn human_line(snapshot: &StatsSnapshot) -> String {
    let label = match snapshot.scope {
        SnapshotScope::Window => "",
        SnapshotScope::Run => " total",
    };
    format!(
        "[{:>7.1}s]{} users={} outcomes={} avg={} min={} max={} success={:.1}%",
        snapshot.elapsed.as_secs_f64(),
        label,
        snapshot.active_users,
        snapshot.outcome_count,
        millis(snapshot.avg_latency),
        millis(snapshot.min_latency),
        millis(snapshot.max_latency),
        snapshot.success_rate * 100.0,
    )
}

fn millis(value: Duration) -> String {
    format!("{:.1}ms", value.as_nanos() as f64 / 1_000_000.0)
}

#[derive(Serialize)]
struct PersistedReport<'a> {
    snapshots: &'a [StatsSnapshot],
    totals: &'a RunTotals,
}

/// Keeps every snapshot and writes them, with the totals, to a JSON file
/// when the run is finalized.
pub struct JsonFileSink {
    path: PathBuf,
    snapshots: Vec<StatsSnapshot>,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshots: Vec::new(),
        }
    }
}

impl ReportSink for JsonFileSink {
    fn record(&mut self, snapshot: &StatsSnapshot) -> Result<()> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }

    fn finalize(&mut self, totals: &RunTotals) -> Result<()> {
        let file = File::create(&self.path).map_err(|err| {
            Error::Sink(format!(
                "failed to create report '{}': {}",
                self.path.display(),
                err
            ))
        })?;
        let mut writer = BufWriter::new(file);
        let report = PersistedReport {
            snapshots: &self.snapshots,
            totals,
        };
        serde_json::to_writer_pretty(&mut writer, &report)
            .map_err(|err| Error::Sink(err.to_string()))?;
        writer
            .flush()
            .map_err(|err| Error::Sink(err.to_string()))?;
        tracing::info!(path = %self.path.display(), "report written");
        Ok(())
    }
}

#[derive(Default)]
struct Recording {
    snapshots: Vec<StatsSnapshot>,
    totals: Option<RunTotals>,
}

/// In-memory sink whose clones share one log.
#[derive(Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<StatsSnapshot> {
        self.inner.lock().snapshots.clone()
    }

    pub fn last(&self) -> Option<StatsSnapshot> {
        self.inner.lock().snapshots.last().cloned()
    }

    pub fn totals(&self) -> Option<RunTotals> {
        self.inner.lock().totals
    }

    pub fn is_finalized(&self) -> bool {
        self.inner.lock().totals.is_some()
    }
}

impl ReportSink for RecordingSink {
    fn record(&mut self, snapshot: &StatsSnapshot) -> Result<()> {
        self.inner.lock().snapshots.push(snapshot.clone());
        Ok(())
    }

    fn finalize(&mut self, totals: &RunTotals) -> Result<()> {
        self.inner.lock().totals = Some(*totals);
        Ok(())
    }
}

pub trait Formatter {
    fn write(&self, summary: &RunSummary) -> String;
}

pub struct HumanFormatter;

pub struct JsonFormatter;

impl Formatter for HumanFormatter {
    fn write(&self, summary: &RunSummary) -> String {
        let mut output = String::new();
        output.push_str("Phases:\n");
        for change in &summary.phases {
            let _ = writeln!(output, "{} at {}", change.phase, millis(change.at));
        }
        let totals = &summary.totals;
        output.push_str("Summary:\n");
        let _ = writeln!(output, "launched users: {}", summary.launched_users);
        let _ = writeln!(output, "peak active: {}", summary.peak_active);
        let _ = writeln!(output, "snapshots: {}", summary.snapshots);
        let _ = writeln!(output, "outcomes: {}", totals.outcome_count);
        let _ = writeln!(output, "success rate: {:.2}%", totals.success_rate * 100.0);
        let _ = writeln!(output, "avg latency: {}", millis(totals.avg_latency));
        let _ = writeln!(output, "min latency: {}", millis(totals.min_latency));
        let _ = writeln!(output, "max latency: {}", millis(totals.max_latency));
        let _ = writeln!(output, "duration: {}", millis(summary.duration));
        let _ = writeln!(output, "slowest tick: {}", millis(summary.slowest_tick));
        let _ = writeln!(output, "aggregation stalls: {}", summary.aggregation_stalls);
        output
    }
}

#[derive(Serialize)]
struct TaggedSummary<'a> {
    summary: &'a RunSummary,
}

/// One `{"summary":...}` line, so it can follow the snapshot lines on stdout.
impl Formatter for JsonFormatter {
    fn write(&self, summary: &RunSummary) -> String {
        match serde_json::to_string(&TaggedSummary { summary }) {
            Ok(json) => format!("{}\n", json),
            Err(err) => format!("{{\"error\":\"{}\"}}\n", err),
        }
    }
}
