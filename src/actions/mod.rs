mod sampler;
mod simulated;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::ActionConfig;
use crate::outcome::{Outcome, UserId};

pub use sampler::WeightedSampler;
pub use simulated::SimulatedAction;

/// Tolerance allowed on the sum of catalog weights.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Unit of work a virtual user performs once.
///
/// Implementations must honor `budget` themselves and report failures,
/// timeouts included, as unsuccessful outcomes instead of panicking. The
/// returned list should never be empty.
pub trait Action: Send + Sync {
    fn perform(&self, user: UserId, budget: Duration) -> Vec<Outcome>;
}

impl<F> Action for F
where
    F: Fn(UserId, Duration) -> Vec<Outcome> + Send + Sync,
{
    fn perform(&self, user: UserId, budget: Duration) -> Vec<Outcome> {
        self(user, budget)
    }
}

#[derive(Clone)]
pub struct ActionEntry {
    pub name: String,
    pub weight: f64,
    pub action: Arc<dyn Action>,
}

impl ActionEntry {
    pub fn new(name: impl Into<String>, weight: f64, action: impl Action + 'static) -> Self {
        Self {
            name: name.into(),
            weight,
            action: Arc::new(action),
        }
    }
}

/// Validated, immutable set of weighted actions.
#[derive(Clone)]
pub struct ActionCatalog {
    entries: Vec<ActionEntry>,
}

impl ActionCatalog {
    pub fn new(entries: Vec<ActionEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::EmptyActions);
        }
        let mut names = HashSet::new();
        for entry in &entries {
            if entry.name.trim().is_empty() {
                return Err(Error::EmptyActionName);
            }
            if !(entry.weight > 0.0 && entry.weight <= 1.0) {
                return Err(Error::InvalidWeight {
                    name: entry.name.clone(),
                    weight: entry.weight,
                });
            }
            if !names.insert(entry.name.as_str()) {
                return Err(Error::DuplicateActionName(entry.name.clone()));
            }
        }
        let sum: f64 = entries.iter().map(|entry| entry.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(Error::WeightSum(sum));
        }

        Ok(Self { entries })
    }

    /// Catalog with a single action carrying the full weight.
    pub fn single(name: impl Into<String>, action: impl Action + 'static) -> Result<Self> {
        Self::new(vec![ActionEntry::new(name, 1.0, action)])
    }

    pub fn entries(&self) -> &[ActionEntry] {
        &self.entries
    }

    pub fn get(&self, idx: usize) -> &ActionEntry {
        &self.entries[idx]
    }

    pub fn weights(&self) -> Vec<f64> {
        self.entries.iter().map(|entry| entry.weight).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds a catalog of simulated actions from configuration.
pub fn build_catalog(actions: &[ActionConfig], seed: Option<u64>) -> Result<ActionCatalog> {
    let entries = actions
        .iter()
        .map(|config| {
            let action = SimulatedAction::new(config.clone(), seed)?;
            Ok(ActionEntry::new(config.name.clone(), config.weight, action))
        })
        .collect::<Result<Vec<_>>>()?;
    ActionCatalog::new(entries)
}
