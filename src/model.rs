//! The inference kernel: HMM evolution, likelihood (HMM & BN), posterior risk, and synthetic
//! dataset generation. This is the module that ties every other piece of the crate together.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};

use crate::data::{build_diagnose_matrices, selector_column, PatientData, BN_POOL_KEY};
use crate::distribution::DistributionDict;
use crate::error::{ModelError, Result};
use crate::graph::{Graph, GraphSpec};
use crate::matrix::{ObservationMatrix, TransitionMatrix};
use crate::modality::Modality;
use crate::node::AllowedStates;
use crate::params::ParameterTable;
use crate::state::{ObservationList, StateList};

/// Which interpretation a likelihood/risk query is computed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The full HMM, marginalizing over diagnose time via the per-T-stage pmf.
    Hmm,
    /// The static Bayesian-network interpretation (growth and time removed).
    Bn,
}

/// How to pick the `pi_marg` distribution used in [`UnilateralModel::risk`]'s HMM mode: a
/// caller who knows the patient's exact diagnose time can fix it, one who only knows the
/// T-stage marginalizes via that stage's pmf.
#[derive(Clone, Debug)]
pub enum TimeMarginal {
    /// Evolve to a single, exactly-known time step.
    FixedTime(usize),
    /// Marginalize over diagnose time using the named T-stage's pmf.
    TStagePmf(String),
}

/// A partial diagnosis: `(modality, lnl) -> observed bit`, entries not present are missing.
pub type GivenDiagnoses = BTreeMap<(String, String), bool>;
/// A partial target involvement pattern: `lnl -> state`, LNLs not present are "don't care".
pub type Involvement = BTreeMap<String, usize>;

/// The full posterior over hidden states, or its aggregate over an [`Involvement`] pattern.
#[derive(Clone, Debug, PartialEq)]
pub enum Risk {
    Distribution(Array1<f64>),
    Aggregate(f64),
}

/// Owns a [`Graph`] and every piece of derived state built on top of it: the memoized
/// transition/observation matrices, diagnostic modalities, diagnose-time distributions,
/// ingested patient data and its diagnose matrices, and the parameter surface.
///
/// The graph is owned outright (arena-indexed, not reference-counted) since nothing outside
/// `UnilateralModel` needs to share it.
#[derive(Clone)]
pub struct UnilateralModel {
    graph: Graph,
    states: StateList,
    observation_list: ObservationList,
    transition: TransitionMatrix,
    observation: ObservationMatrix,
    modalities: BTreeMap<String, Modality>,
    dists: DistributionDict,
    patient_data: Option<PatientData>,
    diagnose_matrices: Option<BTreeMap<String, Array2<f64>>>,
    param_table: ParameterTable,
}

impl UnilateralModel {
    /// Builds a model from a graph spec and the shared diagnose-time horizon `max_t`. No
    /// modalities or distributions are configured yet; callers add them with
    /// [`UnilateralModel::set_modality`] / [`UnilateralModel::set_frozen_distribution`] /
    /// [`UnilateralModel::set_parametric_distribution`] before loading data.
    pub fn new(spec: &GraphSpec, allowed_states: AllowedStates, max_t: usize) -> Result<UnilateralModel> {
        let graph = Graph::new(spec, allowed_states)?;
        let num_lnls = graph.num_lnls();
        let states = StateList::new(allowed_states, num_lnls);
        let dists = DistributionDict::new(max_t);
        let param_table = ParameterTable::build(&graph, dists.parametric_t_stages());

        Ok(UnilateralModel {
            graph,
            states,
            observation_list: ObservationList::new(num_lnls, 0),
            transition: TransitionMatrix::new(),
            observation: ObservationMatrix::new(),
            modalities: BTreeMap::new(),
            dists,
            patient_data: None,
            diagnose_matrices: None,
            param_table,
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn states(&self) -> &StateList {
        &self.states
    }

    // -- Parameter surface -------------------------------------------------------

    pub fn get_param(&self, key: &str) -> Result<f64> {
        self.param_table.get(key, &self.graph, &self.dists)
    }

    pub fn get_params(&self) -> BTreeMap<String, f64> {
        self.param_table.get_all(&self.graph, &self.dists)
    }

    pub fn param_keys(&self) -> impl Iterator<Item = &String> {
        self.param_table.keys()
    }

    /// Atomically applies every `(key, value)` pair and invalidates the transition matrix.
    /// Modalities and diagnose matrices are untouched by this call since neither
    /// spread/micro/growth probabilities nor diagnose-time parameters feed them.
    pub fn assign_params(&mut self, updates: &BTreeMap<String, f64>) -> Result<()> {
        self.param_table.assign(updates, &mut self.graph, &mut self.dists)?;
        self.transition.invalidate();
        Ok(())
    }

    // -- Modalities -----------------------------------------------------------

    /// Inserts or replaces a named modality. Invalidates the observation matrix and every
    /// diagnose matrix. Warns when overwriting a modality whose confusion matrix actually
    /// changes, flagging the cache flush.
    pub fn set_modality(&mut self, name: &str, modality: Modality) -> Result<()> {
        if let Some(existing) = self.modalities.get(name) {
            if existing.confusion_matrix() != modality.confusion_matrix() {
                log::warn!("modality '{}' changed; flushing observation/diagnose caches", name);
            }
        }
        self.modalities.insert(name.to_string(), modality);
        self.observation_list = ObservationList::new(self.graph.num_lnls(), self.modalities.len());
        self.observation.invalidate();
        self.diagnose_matrices = None;
        Ok(())
    }

    pub fn modality_names(&self) -> impl Iterator<Item = &String> {
        self.modalities.keys()
    }

    fn modalities_in_order(&self) -> Vec<Modality> {
        self.modalities.values().cloned().collect()
    }

    // -- Distributions -------------------------------------------------------------

    pub fn set_frozen_distribution(&mut self, t_stage: &str, pmf: Array1<f64>) -> Result<()> {
        self.dists.insert_frozen(t_stage, pmf)?;
        self.rebuild_param_table();
        Ok(())
    }

    pub fn set_parametric_distribution(&mut self, t_stage: &str, p: f64) -> Result<()> {
        self.dists.insert_parametric(t_stage, p)?;
        self.rebuild_param_table();
        Ok(())
    }

    fn rebuild_param_table(&mut self) {
        self.param_table = ParameterTable::build(&self.graph, self.dists.parametric_t_stages());
    }

    // -- Data ingestion --------------------------------------------------------

    /// Replaces any previously ingested patient table and rebuilds every `C_t` from scratch.
    /// Warns for T-stages present in the data that have no configured diagnose-time
    /// distribution; such T-stages are still built into `diagnose_matrices` (so `likelihood`
    /// can intersect against them), they are simply excluded from the likelihood sum itself.
    pub fn load_patient_data(&mut self, data: PatientData) -> Result<()> {
        let o = self.observation_matrix();
        let matrices = build_diagnose_matrices(&data, o, &self.observation_list);

        let configured: std::collections::BTreeSet<&String> = self.dists.t_stages().collect();
        for stage in matrices.keys() {
            if stage != BN_POOL_KEY && !configured.contains(stage) {
                log::warn!(
                    "T-stage '{}' present in patient data has no configured diagnose-time distribution",
                    stage
                );
            }
        }

        self.patient_data = Some(data);
        self.diagnose_matrices = Some(matrices);
        Ok(())
    }

    pub fn patient_data(&self) -> Result<&PatientData> {
        self.patient_data
            .as_ref()
            .ok_or_else(|| ModelError::MissingData("no patient data has been loaded".to_string()))
    }

    pub fn diagnose_matrices(&self) -> Result<&BTreeMap<String, Array2<f64>>> {
        self.diagnose_matrices
            .as_ref()
            .ok_or_else(|| ModelError::MissingData("diagnose matrices have not been built yet".to_string()))
    }

    // -- Matrix assembly ------------------------------------------------------

    pub fn transition_matrix(&mut self) -> &Array2<f64> {
        self.transition.get_or_build(&mut self.graph, &self.states)
    }

    pub fn observation_matrix(&mut self) -> &Array2<f64> {
        let modalities = self.modalities_in_order();
        self.observation
            .get_or_build(&self.states, &self.observation_list, &modalities)
    }

    // -- HMM evolution ---------------------------------------------------------------

    /// `pi_0 = (1, 0, ..., 0)`: every LNL healthy.
    fn pi0(&self) -> Array1<f64> {
        let mut pi0 = Array1::<f64>::zeros(self.states.len());
        pi0[0] = 1.0;
        pi0
    }

    /// Evolves `pi_0` forward to a single time `t`: `pi_t = pi_0 . T^t`.
    pub fn evolve(&mut self, t: usize) -> Array1<f64> {
        let full = self.evolve_distribution();
        full.row(t.min(full.nrows() - 1)).to_owned()
    }

    /// Evolves `pi_0` forward through every time step `0..=max_t`, returning the
    /// `(max_t+1) x S` matrix `Pi` whose row `t` is `pi_t`. Computed incrementally
    /// (`pi_t = pi_{t-1} . T`) rather than by repeated matrix powers, since every intermediate
    /// row is needed for the likelihood sum anyway.
    pub fn evolve_distribution(&mut self) -> Array2<f64> {
        let max_t = self.dists.max_t();
        let s = self.states.len();
        let t = self.transition_matrix().clone();

        let mut pi = Array2::<f64>::zeros((max_t + 1, s));
        pi.row_mut(0).assign(&self.pi0());
        for step in 1..=max_t {
            let prev = pi.row(step - 1).to_owned();
            let next = prev.dot(&t);
            pi.row_mut(step).assign(&next);
        }
        pi
    }

    /// `pi_BN[i] = prod_lnl P(state_i[lnl] | parents_under_state_i)`: the edge probability
    /// contract with growth and the time dimension removed, i.e. [`crate::node::Lnl::bn_prob`]
    /// evaluated at every state in [`StateList`] order.
    pub fn bn_distribution(&mut self) -> Array1<f64> {
        let s = self.states.len();
        let mut pi_bn = Array1::<f64>::zeros(s);
        for i in 0..s {
            self.graph.assign_state_vector(&self.states.state_at(i));
            let mut p = 1.0;
            for &lnl_id in self.graph.lnls() {
                p *= self.graph.node(lnl_id).as_lnl().unwrap().bn_prob(&self.graph);
            }
            pi_bn[i] = p;
        }
        pi_bn
    }

    // -- Likelihood ------------------------------------------------------------------

    /// Computes the data likelihood under `mode`. `log` selects log-likelihood (sum of logs)
    /// vs. the plain product. `given_params`, if supplied, is applied to a scratch copy of the
    /// model first: a `ParameterRangeError` from that assignment yields `-inf` (log) or `0`
    /// (linear) instead of propagating, while every other error (e.g. missing diagnose
    /// matrices) still fails loudly via `?`.
    pub fn likelihood(&mut self, mode: Mode, log: bool, given_params: Option<&BTreeMap<String, f64>>) -> Result<f64> {
        if let Some(params) = given_params {
            let mut scratch = self.clone();
            return match scratch.assign_params(params) {
                Ok(()) => scratch.likelihood(mode, log, None),
                Err(ModelError::ParameterRange(_)) => Ok(if log { f64::NEG_INFINITY } else { 0.0 }),
                Err(other) => Err(other),
            };
        }

        match mode {
            Mode::Hmm => self.likelihood_hmm(log),
            Mode::Bn => self.likelihood_bn(log),
        }
    }

    fn likelihood_hmm(&mut self, log: bool) -> Result<f64> {
        let matrices = self.diagnose_matrices()?.clone();
        let data_stages: std::collections::BTreeSet<String> = matrices
            .keys()
            .filter(|k| k.as_str() != BN_POOL_KEY)
            .cloned()
            .collect();
        let dist_stages: std::collections::BTreeSet<String> = self.dists.t_stages().cloned().collect();

        for stage in data_stages.difference(&dist_stages) {
            log::warn!("T-stage '{}' has data but no diagnose-time distribution; skipped", stage);
        }

        let stages: Vec<String> = data_stages.intersection(&dist_stages).cloned().collect();
        let pi = self.evolve_distribution();

        let mut total_log = 0.0;
        for stage in stages {
            let pmf = self
                .dists
                .pmf(&stage)
                .expect("stage was filtered against dists.t_stages()");
            let marginal = pmf.dot(&pi); // length-S vector: sum_t pmf[t] * pi_t
            let c = &matrices[&stage];
            let p = marginal.dot(c); // length P_s vector
            total_log += p.mapv(f64::ln).sum();
        }

        Ok(if log { total_log } else { total_log.exp() })
    }

    fn likelihood_bn(&mut self, log: bool) -> Result<f64> {
        let matrices = self.diagnose_matrices()?;
        let c_bn = matrices
            .get(BN_POOL_KEY)
            .ok_or_else(|| ModelError::MissingData("no patient data pooled for BN likelihood".to_string()))?
            .clone();
        let pi_bn = self.bn_distribution();
        let p = pi_bn.dot(&c_bn);
        let total_log = p.mapv(f64::ln).sum();
        Ok(if log { total_log } else { total_log.exp() })
    }

    // -- Risk -------------------------------------------------------------------------

    /// `d[i] = P(given_diagnoses | state_i)` via the same selector marginalization used for
    /// diagnose matrices, then `posterior = (pi_marg . d) / sum(pi_marg . d)`, optionally
    /// aggregated over every state matching the non-missing components of `involvement`.
    pub fn risk(
        &mut self,
        mode: Mode,
        time_marginal: Option<&TimeMarginal>,
        given_diagnoses: &GivenDiagnoses,
        involvement: Option<&Involvement>,
    ) -> Result<Risk> {
        let s = self.states.len();
        let entries = self.diagnosis_selector(given_diagnoses)?;
        let o = self.observation_matrix().clone();
        let d = selector_column(&entries, &o, &self.observation_list, s);

        let pi_marg = match mode {
            Mode::Bn => self.bn_distribution(),
            Mode::Hmm => {
                let marginal = match time_marginal {
                    Some(TimeMarginal::FixedTime(t)) => self.evolve(*t),
                    Some(TimeMarginal::TStagePmf(stage)) => {
                        let pmf = self
                            .dists
                            .pmf(stage)
                            .ok_or_else(|| {
                                ModelError::MissingData(format!(
                                    "no diagnose-time distribution configured for T-stage '{}'",
                                    stage
                                ))
                            })?
                            .clone();
                        let pi = self.evolve_distribution();
                        pmf.dot(&pi)
                    }
                    None => {
                        return Err(ModelError::MissingData(
                            "HMM risk requires a time_marginal (fixed time or T-stage pmf)".to_string(),
                        ))
                    }
                };
                marginal
            }
        };

        let joint = &pi_marg * &d;
        let norm = joint.sum();
        let posterior = if norm > 0.0 { &joint / norm } else { joint };

        match involvement {
            None => Ok(Risk::Distribution(posterior)),
            Some(pattern) => {
                let mut total = 0.0;
                for i in 0..s {
                    let state = self.states.state_at(i);
                    let matches = pattern.iter().all(|(lnl, &want)| {
                        self.graph
                            .lnls()
                            .iter()
                            .position(|&id| self.graph.node(id).name() == lnl)
                            .map(|idx| state[idx] == want)
                            .unwrap_or(false)
                    });
                    if matches {
                        total += posterior[i];
                    }
                }
                Ok(Risk::Aggregate(total))
            }
        }
    }

    /// Builds a per-entry selector from a sparse `(modality, lnl) -> bit` map, in
    /// [`ObservationList`] position order.
    fn diagnosis_selector(&self, given: &GivenDiagnoses) -> Result<Vec<Option<bool>>> {
        let modality_index: BTreeMap<&String, usize> =
            self.modalities.keys().enumerate().map(|(i, k)| (k, i)).collect();
        let mut entries = vec![None; self.observation_list.num_entries()];

        for ((modality, lnl), &bit) in given {
            let mod_idx = *modality_index
                .get(modality)
                .ok_or_else(|| ModelError::MissingData(format!("unknown modality '{}'", modality)))?;
            let lnl_idx = self
                .graph
                .lnls()
                .iter()
                .position(|&id| self.graph.node(id).name() == lnl)
                .ok_or_else(|| ModelError::MissingData(format!("unknown LNL '{}'", lnl)))?;
            entries[self.observation_list.entry_position(lnl_idx, mod_idx)] = Some(bit);
        }
        Ok(entries)
    }

    // -- Synthetic dataset generation -----------------------------------------------

    /// Draws `n` synthetic patients: T-stage + diag time from `t_stage_weights` joint with
    /// each stage's pmf, evolved state distribution indexed by the drawn time, multiplied by
    /// `O`, then one observation sampled per patient.
    pub fn generate_dataset(
        &mut self,
        n: usize,
        t_stage_weights: &[(String, f64)],
        seed: Option<u64>,
    ) -> Result<PatientData> {
        use crate::data::PatientRow;
        use crate::sampling::DiagTimeSampler;

        let mut sampler = DiagTimeSampler::new(seed);
        let draws = sampler.sample_t_stage_and_time(&self.dists, t_stage_weights, n)?;

        let pi = self.evolve_distribution();
        let o = self.observation_matrix().clone();

        let s = self.states.len();
        let z = self.observation_list.len();
        let mut obs_dist = Array2::<f64>::zeros((n, z));
        for (row_idx, (_, diag_time)) in draws.iter().enumerate() {
            let pi_t = pi.row((*diag_time).min(pi.nrows() - 1));
            let mut row_dist = Array1::<f64>::zeros(z);
            for i in 0..s {
                if pi_t[i] > 0.0 {
                    let contribution = o.row(i).to_owned() * pi_t[i];
                    row_dist = row_dist + contribution;
                }
            }
            obs_dist.row_mut(row_idx).assign(&row_dist);
        }

        let sampled = sampler.sample_observations(&obs_dist)?;
        let rows: Vec<PatientRow> = sampled
            .into_iter()
            .zip(draws.into_iter())
            .map(|(obs_idx, (t_stage, _))| {
                let bits = self.observation_list.observation_at(obs_idx);
                PatientRow::new(t_stage, bits.into_iter().map(Some).collect())
            })
            .collect();

        Ok(PatientData::new(rows))
    }
}

/// Row-sums of a matrix; exposed for the row-stochasticity tests on `T` and `O`.
pub fn row_sums(matrix: &Array2<f64>) -> Array1<f64> {
    matrix.sum_axis(Axis(1))
}
