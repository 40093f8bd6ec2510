use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Weighted random choice over catalog indices.
pub struct WeightedSampler {
    prefix_sums: Vec<f64>,
    rng: StdRng,
}

impl WeightedSampler {
    /// `weights` must be non-empty and positive; the catalog guarantees both.
    pub fn new(weights: &[f64], seed: Option<u64>) -> Self {
        let mut total = 0.0;
        let prefix_sums = weights
            .iter()
            .map(|weight| {
                total += weight;
                total
            })
            .collect();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { prefix_sums, rng }
    }

    pub fn sample(&mut self) -> usize {
        let total = self.prefix_sums.last().copied().unwrap_or(0.0);
        let point = self.rng.gen::<f64>() * total;
        let idx = self.prefix_sums.partition_point(|sum| *sum <= point);
        idx.min(self.prefix_sums.len().saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_samplers_agree() {
        let weights = [0.2, 0.3, 0.5];
        let mut a = WeightedSampler::new(&weights, Some(42));
        let mut b = WeightedSampler::new(&weights, Some(42));
        let picks_a: Vec<usize> = (0..50).map(|_| a.sample()).collect();
        let picks_b: Vec<usize> = (0..50).map(|_| b.sample()).collect();
        assert_eq!(picks_a, picks_b);
    }

    #[test]
    fn single_weight_always_picks_zero() {
        let mut sampler = WeightedSampler::new(&[1.0], None);
        assert!((0..100).all(|_| sampler.sample() == 0));
    }

    #[test]
    fn picks_follow_weights() {
        let mut sampler = WeightedSampler::new(&[0.7, 0.3], Some(7));
        let draws = 20_000;
        let first = (0..draws).filter(|_| sampler.sample() == 0).count();
        let share = first as f64 / draws as f64;
        assert!((share - 0.7).abs() < 0.02, "share was {}", share);
    }

    #[test]
    fn never_returns_out_of_range() {
        let mut sampler = WeightedSampler::new(&[0.25, 0.25, 0.25, 0.25], Some(1));
        assert!((0..10_000).all(|_| sampler.sample() < 4));
    }
}
