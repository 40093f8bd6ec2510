//! Results of action calls and the channel that carries them from workers to
//! the aggregator.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

/// Identifier of a virtual user. Assigned sequentially from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vu-{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OutcomeKind {
    Completed { status: u16 },
    Timeout,
    Error { message: String },
}

/// Result of one exchange with the target.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Outcome {
    pub target: String,
    pub elapsed: Duration,
    pub success: bool,
    pub kind: OutcomeKind,
    pub reason: Option<String>,
}

impl Outcome {
    /// An exchange that got a status back. Any 2xx counts as success, not
    /// just 200; use `with_success` for a stricter check.
    pub fn completed(target: impl Into<String>, elapsed: Duration, status: u16) -> Self {
        Self {
            target: target.into(),
            elapsed,
            success: (200..300).contains(&status),
            kind: OutcomeKind::Completed { status },
            reason: None,
        }
    }

    pub fn timed_out(target: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            target: target.into(),
            elapsed,
            success: false,
            kind: OutcomeKind::Timeout,
            reason: Some("timeout".to_string()),
        }
    }

    pub fn failed(target: impl Into<String>, elapsed: Duration, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            target: target.into(),
            elapsed,
            success: false,
            reason: Some(message.clone()),
            kind: OutcomeKind::Error { message },
        }
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == OutcomeKind::Timeout
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            OutcomeKind::Completed { status } => Some(status),
            _ => None,
        }
    }
}

/// Everything one action call produced, in order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutcomeBatch {
    pub user: UserId,
    pub action: String,
    pub outcomes: Vec<Outcome>,
}

#[derive(Clone)]
pub struct OutcomeSender {
    inner: Sender<OutcomeBatch>,
}

impl OutcomeSender {
    /// Never blocks. Batches sent after the receiver is gone are dropped.
    pub fn send(&self, batch: OutcomeBatch) {
        if let Err(err) = self.inner.send(batch) {
            tracing::debug!(user = %err.0.user, "outcome receiver gone, dropping batch");
        }
    }
}

#[derive(Clone)]
pub struct OutcomeReceiver {
    inner: Receiver<OutcomeBatch>,
}

impl OutcomeReceiver {
    /// Takes the batches queued when the drain starts; later arrivals wait
    /// for the next drain.
    pub fn drain(&self) -> Vec<OutcomeBatch> {
        let queued = self.inner.len();
        self.inner.try_iter().take(queued).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

pub fn outcome_channel() -> (OutcomeSender, OutcomeReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (OutcomeSender { inner: tx }, OutcomeReceiver { inner: rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn completed_classifies_by_status() {
        let ok = Outcome::completed("/", Duration::from_millis(3), 204);
        assert!(ok.success);
        assert_eq!(ok.status(), Some(204));

        assert!(Outcome::completed("/", Duration::ZERO, 299).success);
        assert!(!Outcome::completed("/", Duration::ZERO, 300).success);
        let strict = Outcome::completed("/", Duration::ZERO, 204).with_success(false);
        assert!(!strict.success);

        let not_found = Outcome::completed("/missing", Duration::from_millis(3), 404);
        assert!(!not_found.success);
        assert_eq!(not_found.reason, None);
    }

    #[test]
    fn timeouts_and_errors_are_failures() {
        let timeout = Outcome::timed_out("/slow", Duration::from_millis(50));
        assert!(!timeout.success);
        assert!(timeout.is_timeout());
        assert_eq!(timeout.reason.as_deref(), Some("timeout"));

        let error = Outcome::failed("/", Duration::ZERO, "connection refused");
        assert!(!error.success);
        assert!(!error.is_timeout());
        assert_eq!(error.status(), None);
        assert_eq!(error.reason.as_deref(), Some("connection refused"));
    }

    #[test]
    fn overrides_replace_defaults() {
        let outcome = Outcome::completed("/login", Duration::ZERO, 302)
            .with_success(true)
            .with_reason("Found");
        assert!(outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("Found"));
    }

    #[test]
    fn drain_collects_batches_from_many_producers() {
        let (tx, rx) = outcome_channel();
        let producers: Vec<_> = (1..=8)
            .map(|id| {
                let tx = tx.clone();
                thread::spawn(move || {
                    tx.send(OutcomeBatch {
                        user: UserId(id),
                        action: "a".to_string(),
                        outcomes: vec![Outcome::completed("/", Duration::ZERO, 200)],
                    })
                })
            })
            .collect();
        for producer in producers {
            producer.join().expect("producer should finish");
        }

        let mut users: Vec<u64> = rx.drain().iter().map(|batch| batch.user.0).collect();
        users.sort_unstable();
        assert_eq!(users, (1..=8).collect::<Vec<_>>());
        assert!(rx.is_empty());
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn send_after_receiver_dropped_is_ignored() {
        let (tx, rx) = outcome_channel();
        drop(rx);
        tx.send(OutcomeBatch {
            user: UserId(1),
            action: "a".to_string(),
            outcomes: Vec::new(),
        });
    }
}
