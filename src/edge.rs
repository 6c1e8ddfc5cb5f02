//! Directed arcs between nodes, and the per-transition probability contract they implement.

use crate::error::{ModelError, Result};
use crate::node::{AllowedStates, NodeId};

/// An arc from `parent` to `child`.
///
/// `micro_mod` is only meaningful for LNL->LNL edges into a trinary child; it defaults to
/// `1.0` (no attenuation) everywhere else. A growth edge has `parent == child` and is only
/// legal on a trinary LNL.
#[derive(Clone, Debug)]
pub struct Edge {
    pub parent: NodeId,
    pub child: NodeId,
    spread_prob: f64,
    micro_mod: f64,
    pub is_tumor_spread: bool,
    pub is_growth: bool,
}

impl Edge {
    pub fn new(parent: NodeId, child: NodeId, is_tumor_spread: bool, is_growth: bool) -> Edge {
        Edge {
            parent,
            child,
            spread_prob: 0.0,
            micro_mod: 1.0,
            is_tumor_spread,
            is_growth,
        }
    }

    pub fn spread_prob(&self) -> f64 {
        self.spread_prob
    }

    pub fn set_spread_prob(&mut self, value: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ModelError::ParameterRange(format!(
                "spread_prob must be in [0, 1], got {}",
                value
            )));
        }
        self.spread_prob = value;
        Ok(())
    }

    pub fn micro_mod(&self) -> f64 {
        self.micro_mod
    }

    pub fn set_micro_mod(&mut self, value: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ModelError::ParameterRange(format!(
                "micro_mod must be in [0, 1], got {}",
                value
            )));
        }
        self.micro_mod = value;
        Ok(())
    }

    /// Effective spread probability contributed by this edge, given the parent's current
    /// state (`0`, `1` or `2`). Tumor parents are always fully involved and unaffected by
    /// `micro_mod`; an LNL parent in state `1` (microscopic) is attenuated by `micro_mod`,
    /// state `2` (macroscopic) is not.
    fn effective_spread(&self, parent_state: usize) -> f64 {
        if self.is_tumor_spread {
            return self.spread_prob;
        }
        match parent_state {
            0 => 0.0,
            1 => self.spread_prob * self.micro_mod,
            _ => self.spread_prob,
        }
    }

    /// Probability this edge contributes toward the child staying uninvolved (`0 -> 0`),
    /// given the parent's current state. Edges combine multiplicatively across a child's
    /// incoming edge set to form the child's overall "stay healthy" probability (see
    /// [`crate::matrix`]).
    pub fn factor_stay_healthy(&self, parent_state: usize) -> f64 {
        1.0 - self.effective_spread(parent_state)
    }

    /// `0 -> 1` transition probability contributed by this single edge in isolation. Used
    /// only to expose the rank-3 transition tensor for a standalone edge (tests, inspection);
    /// the model itself combines edges via [`Edge::factor_stay_healthy`].
    pub fn transition_tensor(&self, child_allowed: AllowedStates) -> ndarray::Array3<f64> {
        let parent_card = if self.is_tumor_spread {
            1
        } else {
            child_allowed.cardinality()
        };
        let child_card = child_allowed.cardinality();
        let mut tensor = ndarray::Array3::<f64>::zeros((parent_card, child_card, child_card));

        for parent_state in 0..parent_card {
            if self.is_growth {
                // Growth only acts on state 1 -> 2; states 0 and 2 are unaffected.
                tensor[[parent_state, 0, 0]] = 1.0;
                tensor[[parent_state, 1, 1]] = 1.0 - self.spread_prob;
                tensor[[parent_state, 1, 2]] = self.spread_prob;
                tensor[[parent_state, 2, 2]] = 1.0;
            } else {
                let stay = self.factor_stay_healthy(parent_state);
                tensor[[parent_state, 0, 0]] = stay;
                tensor[[parent_state, 0, 1]] = 1.0 - stay;
                for s in 1..child_card {
                    tensor[[parent_state, s, s]] = 1.0;
                }
            }
        }
        tensor
    }
}
