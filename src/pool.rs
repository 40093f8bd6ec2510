use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::actions::{ActionCatalog, WeightedSampler};
use crate::models::LaunchPolicy;
use crate::outcome::{Outcome, OutcomeBatch, OutcomeSender, UserId};

/// Handles of launched virtual users that have not been pruned yet.
///
/// Cloned into the aggregator so it can read the population while the
/// orchestrator inserts and prunes.
#[derive(Clone, Default)]
pub struct ActiveSet {
    inner: Arc<Mutex<BTreeMap<UserId, JoinHandle<()>>>>,
}

impl ActiveSet {
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    fn insert(&self, user: UserId, handle: JoinHandle<()>) {
        self.inner.lock().insert(user, handle);
    }

    /// Drops handles of finished workers without blocking on any of them.
    fn prune(&self) -> usize {
        let mut active = self.inner.lock();
        let before = active.len();
        active.retain(|_, handle| !handle.is_finished());
        before - active.len()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reconcile {
    pub pruned: usize,
    pub launched: usize,
    pub active: usize,
}

impl Reconcile {
    pub fn changed(&self) -> bool {
        self.pruned > 0 || self.launched > 0
    }
}

pub struct WorkerPool {
    catalog: ActionCatalog,
    sampler: WeightedSampler,
    outcomes: OutcomeSender,
    timeout: Duration,
    policy: LaunchPolicy,
    active: ActiveSet,
    next_id: u64,
    peak_active: usize,
}

impl WorkerPool {
    pub fn new(
        catalog: ActionCatalog,
        outcomes: OutcomeSender,
        timeout: Duration,
        policy: LaunchPolicy,
        seed: Option<u64>,
    ) -> Self {
        let sampler = WeightedSampler::new(&catalog.weights(), seed);
        Self {
            catalog,
            sampler,
            outcomes,
            timeout,
            policy,
            active: ActiveSet::default(),
            next_id: 1,
            peak_active: 0,
        }
    }

    pub fn active_set(&self) -> ActiveSet {
        self.active.clone()
    }

    pub fn active(&self) -> usize {
        self.active.len()
    }

    pub fn launched(&self) -> u64 {
        self.next_id - 1
    }

    pub fn peak_active(&self) -> usize {
        self.peak_active
    }

    /// Prunes finished workers, then launches toward `target` per the launch
    /// policy. Never retires running workers.
    pub fn reconcile(&mut self, target: usize) -> Reconcile {
        let pruned = self.active.prune();
        let mut active = self.active.len();
        let deficit = target.saturating_sub(active);
        let wanted = match self.policy {
            LaunchPolicy::FullDeficit => deficit,
            LaunchPolicy::OnePerTick => deficit.min(1),
        };

        let mut launched = 0;
        for _ in 0..wanted {
            if self.launch().is_none() {
                break;
            }
            launched += 1;
        }
        active += launched;
        self.peak_active = self.peak_active.max(active);

        Reconcile {
            pruned,
            launched,
            active,
        }
    }

    /// Starts one virtual user running a sampled action. Returns `None` when
    /// the OS refuses the thread; the id is not consumed in that case.
    pub fn launch(&mut self) -> Option<UserId> {
        let user = UserId(self.next_id);
        let entry = self.catalog.get(self.sampler.sample()).clone();
        let outcomes = self.outcomes.clone();
        let budget = self.timeout;

        let spawned = thread::Builder::new()
            .name(user.to_string())
            .spawn(move || {
                let started = Instant::now();
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    entry.action.perform(user, budget)
                }));
                let outcomes_list = match result {
                    Ok(list) if !list.is_empty() => list,
                    Ok(_) => vec![Outcome::failed(
                        &entry.name,
                        started.elapsed(),
                        "action returned no outcomes",
                    )],
                    Err(_) => vec![Outcome::failed(
                        &entry.name,
                        started.elapsed(),
                        "action panicked",
                    )],
                };
                outcomes.send(OutcomeBatch {
                    user,
                    action: entry.name,
                    outcomes: outcomes_list,
                });
            });

        match spawned {
            Ok(handle) => {
                self.next_id += 1;
                self.active.insert(user, handle);
                tracing::debug!(%user, "launched virtual user");
                Some(user)
            }
            Err(err) => {
                tracing::warn!(%user, error = %err, "failed to spawn virtual user");
                None
            }
        }
    }
}
