//! Per-T-stage diagnose-time distributions: a `DistributionDict` maps T-stage to a pmf over
//! `{0,...,max_t}`, either `frozen` (fixed, parameter-free) or `parametric` (regenerated from
//! a scalar parameter on update).

use std::collections::BTreeMap;

use enum_dispatch::enum_dispatch;
use ndarray::Array1;
use statrs::distribution::{Binomial, Discrete};

use crate::error::{ModelError, Result};

/// Shared behaviour of a single T-stage's diagnose-time pmf, dispatched over its frozen and
/// parametric variants.
#[enum_dispatch]
pub trait DiagTimeDistTrait {
    fn pmf(&self) -> &Array1<f64>;
    fn max_t(&self) -> usize;
    /// `None` for a frozen distribution (it has no scalar parameter to read).
    fn param_value(&self) -> Option<f64>;
    /// Regenerates the pmf from a new scalar parameter. Errors on a frozen distribution.
    fn set_param(&mut self, value: f64) -> Result<()>;
}

/// A fixed, non-parametric pmf supplied directly by the caller.
#[derive(Clone, Debug)]
pub struct FrozenDist {
    pmf: Array1<f64>,
}

impl FrozenDist {
    pub fn new(pmf: Array1<f64>) -> Result<FrozenDist> {
        validate_pmf(&pmf)?;
        Ok(FrozenDist { pmf })
    }
}

impl DiagTimeDistTrait for FrozenDist {
    fn pmf(&self) -> &Array1<f64> {
        &self.pmf
    }

    fn max_t(&self) -> usize {
        self.pmf.len() - 1
    }

    fn param_value(&self) -> Option<f64> {
        None
    }

    fn set_param(&mut self, _value: f64) -> Result<()> {
        Err(ModelError::ParameterRange(
            "frozen distribution has no parameters".to_string(),
        ))
    }
}

/// A binomial diagnose-time pmf over `{0,...,max_t}` parameterized by a single success
/// probability `p`, regenerated whenever `p` changes. `max_t` plays the role of the
/// binomial's trial count.
#[derive(Clone, Debug)]
pub struct ParametricDist {
    max_t: usize,
    p: f64,
    pmf: Array1<f64>,
}

impl ParametricDist {
    pub fn new(max_t: usize, p: f64) -> Result<ParametricDist> {
        let mut dist = ParametricDist {
            max_t,
            p: 0.0,
            pmf: Array1::zeros(max_t + 1),
        };
        dist.recompute(p)?;
        Ok(dist)
    }

    fn recompute(&mut self, p: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&p) {
            return Err(ModelError::ParameterRange(format!(
                "diagnose-time parameter must be in [0, 1], got {}",
                p
            )));
        }
        let binomial = Binomial::new(p.clamp(1e-12, 1.0 - 1e-12), self.max_t as u64)
            .map_err(|e| ModelError::ParameterRange(e.to_string()))?;
        let mut pmf = Array1::<f64>::zeros(self.max_t + 1);
        for t in 0..=self.max_t {
            pmf[t] = binomial.pmf(t as u64);
        }
        let sum = pmf.sum();
        if sum > 0.0 {
            pmf /= sum;
        }
        self.p = p;
        self.pmf = pmf;
        Ok(())
    }
}

impl DiagTimeDistTrait for ParametricDist {
    fn pmf(&self) -> &Array1<f64> {
        &self.pmf
    }

    fn max_t(&self) -> usize {
        self.max_t
    }

    fn param_value(&self) -> Option<f64> {
        Some(self.p)
    }

    fn set_param(&mut self, value: f64) -> Result<()> {
        self.recompute(value)
    }
}

/// A single T-stage's diagnose-time distribution: frozen or parametric.
#[enum_dispatch(DiagTimeDistTrait)]
#[derive(Clone, Debug)]
pub enum DiagTimeDist {
    Frozen(FrozenDist),
    Parametric(ParametricDist),
}

fn validate_pmf(pmf: &Array1<f64>) -> Result<()> {
    if pmf.iter().any(|&v| v < 0.0) {
        return Err(ModelError::ParameterRange(
            "pmf must be non-negative".to_string(),
        ));
    }
    let sum = pmf.sum();
    if (sum - 1.0).abs() > 1e-9 {
        return Err(ModelError::ParameterRange(format!(
            "pmf must be normalized, got sum {}",
            sum
        )));
    }
    Ok(())
}

/// Maps T-stage to its diagnose-time pmf. Every pmf shares the same `max_t`.
#[derive(Clone, Debug, Default)]
pub struct DistributionDict {
    max_t: usize,
    dists: BTreeMap<String, DiagTimeDist>,
}

impl DistributionDict {
    pub fn new(max_t: usize) -> DistributionDict {
        DistributionDict {
            max_t,
            dists: BTreeMap::new(),
        }
    }

    pub fn max_t(&self) -> usize {
        self.max_t
    }

    pub fn insert_frozen(&mut self, t_stage: &str, pmf: Array1<f64>) -> Result<()> {
        if pmf.len() != self.max_t + 1 {
            return Err(ModelError::ParameterRange(format!(
                "pmf for T-stage '{}' has length {}, expected {}",
                t_stage,
                pmf.len(),
                self.max_t + 1
            )));
        }
        let dist = FrozenDist::new(pmf)?;
        self.dists.insert(t_stage.to_string(), dist.into());
        Ok(())
    }

    pub fn insert_parametric(&mut self, t_stage: &str, p: f64) -> Result<()> {
        let dist = ParametricDist::new(self.max_t, p)?;
        self.dists.insert(t_stage.to_string(), dist.into());
        Ok(())
    }

    pub fn t_stages(&self) -> impl Iterator<Item = &String> {
        self.dists.keys()
    }

    pub fn pmf(&self, t_stage: &str) -> Option<&Array1<f64>> {
        self.dists.get(t_stage).map(|d| d.pmf())
    }

    /// The parameter key exposed for a parametric T-stage's scalar parameter, e.g.
    /// `"dist_early_p"`. Frozen T-stages contribute no parameter key.
    pub fn param_key(t_stage: &str) -> String {
        format!("dist_{}_p", t_stage)
    }

    pub fn get_param(&self, t_stage: &str) -> Option<f64> {
        self.dists.get(t_stage).and_then(|d| d.param_value())
    }

    pub fn set_param(&mut self, t_stage: &str, value: f64) -> Result<()> {
        let dist = self
            .dists
            .get_mut(t_stage)
            .ok_or_else(|| ModelError::ParameterRange(format!("unknown T-stage '{}'", t_stage)))?;
        dist.set_param(value)
    }

    /// T-stages whose distribution is parametric, i.e. those that contribute a parameter key.
    pub fn parametric_t_stages(&self) -> impl Iterator<Item = &String> {
        self.dists
            .iter()
            .filter(|(_, d)| d.param_value().is_some())
            .map(|(k, _)| k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_must_be_normalized() {
        let pmf = Array1::from_vec(vec![0.5, 0.4]);
        assert!(FrozenDist::new(pmf).is_err());
    }

    #[test]
    fn parametric_recomputes_on_set() {
        let mut dict = DistributionDict::new(3);
        dict.insert_parametric("early", 0.3).unwrap();
        let before = dict.pmf("early").unwrap().clone();
        dict.set_param("early", 0.6).unwrap();
        let after = dict.pmf("early").unwrap();
        assert_ne!(before, *after);
        assert!((after.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_t_stage_param_is_rejected() {
        let mut dict = DistributionDict::new(3);
        assert!(dict.set_param("nonexistent", 0.5).is_err());
    }
}
