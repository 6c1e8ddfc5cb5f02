//! Draws synthetic `(t_stage, diag_time)` pairs and sampled observations for
//! [`crate::model::UnilateralModel::generate_dataset`]: a seedable `ChaCha8Rng` wrapped in a
//! small draw-one-outcome-at-a-time sampler.

use ndarray::Array2;
use rand::distributions::{Distribution as RandDistribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::distribution::DistributionDict;
use crate::error::{ModelError, Result};

/// Draws categorical outcomes with a seeded, reproducible RNG.
pub struct DiagTimeSampler {
    rng: ChaCha8Rng,
}

impl DiagTimeSampler {
    pub fn new(seed: Option<u64>) -> DiagTimeSampler {
        let rng = match seed {
            Some(seed) => SeedableRng::seed_from_u64(seed),
            None => SeedableRng::from_entropy(),
        };
        DiagTimeSampler { rng }
    }

    /// Draws `n` `(t_stage, diag_time)` pairs: first a T-stage from `t_stage_weights` (an
    /// outer categorical distribution over T-stages), then a diag time from that T-stage's
    /// pmf in `dists`.
    pub fn sample_t_stage_and_time(
        &mut self,
        dists: &DistributionDict,
        t_stage_weights: &[(String, f64)],
        n: usize,
    ) -> Result<Vec<(String, usize)>> {
        if t_stage_weights.is_empty() {
            return Err(ModelError::ParameterRange(
                "t_stage_weights must not be empty".to_string(),
            ));
        }
        let weights: Vec<f64> = t_stage_weights.iter().map(|(_, w)| *w).collect();
        let t_stage_dist = WeightedIndex::new(&weights)
            .map_err(|e| ModelError::ParameterRange(format!("invalid T-stage weights: {}", e)))?;

        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let idx = t_stage_dist.sample(&mut self.rng);
            let t_stage = &t_stage_weights[idx].0;
            let pmf = dists.pmf(t_stage).ok_or_else(|| {
                ModelError::MissingData(format!(
                    "no diagnose-time distribution configured for T-stage '{}'",
                    t_stage
                ))
            })?;
            let time_dist = WeightedIndex::new(pmf.iter().copied()).map_err(|e| {
                ModelError::ParameterRange(format!("invalid pmf for T-stage '{}': {}", t_stage, e))
            })?;
            let diag_time = time_dist.sample(&mut self.rng);
            out.push((t_stage.clone(), diag_time));
        }
        Ok(out)
    }

    /// Samples one observation index per row of `obs_dist` (each row a distribution over
    /// observation-vector indices).
    pub fn sample_observations(&mut self, obs_dist: &Array2<f64>) -> Result<Vec<usize>> {
        let mut out = Vec::with_capacity(obs_dist.nrows());
        for row in obs_dist.rows() {
            let dist = WeightedIndex::new(row.iter().copied())
                .map_err(|e| ModelError::ParameterRange(format!("invalid observation row: {}", e)))?;
            out.push(dist.sample(&mut self.rng));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn sampled_t_stages_only_come_from_the_weighted_set() {
        let mut dists = DistributionDict::new(2);
        dists.insert_frozen("early", arr1(&[0.2, 0.3, 0.5])).unwrap();
        dists.insert_frozen("late", arr1(&[0.1, 0.1, 0.8])).unwrap();

        let mut sampler = DiagTimeSampler::new(Some(42));
        let draws = sampler
            .sample_t_stage_and_time(&dists, &[("early".to_string(), 1.0)], 20)
            .unwrap();
        assert_eq!(draws.len(), 20);
        assert!(draws.iter().all(|(stage, t)| stage == "early" && *t <= 2));
    }

    #[test]
    fn missing_distribution_errors() {
        let dists = DistributionDict::new(2);
        let mut sampler = DiagTimeSampler::new(Some(1));
        let result = sampler.sample_t_stage_and_time(&dists, &[("early".to_string(), 1.0)], 5);
        assert!(result.is_err());
    }

    #[test]
    fn sampled_observations_are_in_range() {
        let obs_dist = arr2(&[[0.0, 1.0, 0.0], [0.5, 0.0, 0.5]]);
        let mut sampler = DiagTimeSampler::new(Some(7));
        let draws = sampler.sample_observations(&obs_dist).unwrap();
        assert_eq!(draws, vec![1, draws[1]]);
        assert!(draws[1] == 0 || draws[1] == 2);
    }
}
