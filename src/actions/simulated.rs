use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::actions::Action;
use crate::error::{Error, Result};
use crate::models::ActionConfig;
use crate::outcome::{Outcome, UserId};

/// Stand-in for a real network exchange: sleeps for a random latency in the
/// configured range and fails at the configured rate.
///
/// The timeout budget is enforced here: a latency past the budget sleeps only
/// for the budget and yields a timeout outcome.
pub struct SimulatedAction {
    config: ActionConfig,
    seed: Option<u64>,
}

impl SimulatedAction {
    pub fn new(config: ActionConfig, seed: Option<u64>) -> Result<Self> {
        if config.name.trim().is_empty() {
            return Err(Error::EmptyActionName);
        }
        if config.min_latency > config.max_latency {
            return Err(Error::InvalidLatencyRange(config.name));
        }
        if !(0.0..=1.0).contains(&config.failure_rate) {
            return Err(Error::InvalidFailureRate {
                name: config.name,
                rate: config.failure_rate,
            });
        }
        Ok(Self { config, seed })
    }

    fn rng_for(&self, user: UserId) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(user.0)),
            None => StdRng::from_entropy(),
        }
    }

    fn sample_latency(&self, rng: &mut StdRng) -> Duration {
        let min = self.config.min_latency.as_nanos() as u64;
        let max = self.config.max_latency.as_nanos() as u64;
        Duration::from_nanos(rng.gen_range(min..=max))
    }
}

impl Action for SimulatedAction {
    fn perform(&self, user: UserId, budget: Duration) -> Vec<Outcome> {
        let mut rng = self.rng_for(user);
        let latency = self.sample_latency(&mut rng);
        let fails = rng.gen::<f64>() < self.config.failure_rate;
        let started = Instant::now();

        if latency > budget {
            thread::sleep(budget);
            return vec![Outcome::timed_out(&self.config.name, started.elapsed())];
        }

        thread::sleep(latency);
        let status = if fails {
            self.config.failure_status
        } else {
            self.config.status
        };
        let outcome = Outcome::completed(&self.config.name, started.elapsed(), status);
        // Configured statuses decide success, whatever their numeric range.
        vec![outcome.with_success(!fails)]
    }
}
