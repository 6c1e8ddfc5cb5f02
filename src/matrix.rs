//! Builders for the transition matrix `T` and observation matrix `O`.
//!
//! Both are memoized behind an explicit `Option` cache field rather than any form of
//! process-global state: the cache lives on the struct that owns it ([`TransitionMatrix`],
//! [`ObservationMatrix`]) and is evicted by calling [`TransitionMatrix::invalidate`] /
//! [`ObservationMatrix::invalidate`] whenever a dependency changes (see
//! [`crate::model::UnilateralModel`] for the invalidation wiring).

use ndarray::Array2;

use crate::graph::Graph;
use crate::modality::Modality;
use crate::node::NodeId;
use crate::state::{ObservationList, StateList};

/// Transition probabilities for a single LNL, given its current state, across all of its
/// possible next states. Index `k` is the probability of transitioning to state `k`.
fn lnl_transition_probs(graph: &Graph, lnl_id: NodeId) -> Vec<f64> {
    let lnl = graph.node(lnl_id).as_lnl().unwrap();
    let card = lnl.allowed_states.cardinality();
    let current = lnl.state();
    let top = card - 1;

    if current == top {
        // Both the binary "involved" state and the trinary "macroscopic" state are absorbing.
        let mut probs = vec![0.0; card];
        probs[top] = 1.0;
        return probs;
    }

    if lnl.is_trinary() && current == 1 {
        // State 1 -> 2 is driven exclusively by the growth self-edge.
        let growth_edge = graph.edge(lnl.growth_edge.expect("trinary LNL must have a growth edge"));
        let g = growth_edge.spread_prob();
        let mut probs = vec![0.0; card];
        probs[1] = 1.0 - g;
        probs[2] = g;
        return probs;
    }

    // current == 0: probability of staying healthy is the product, over all incoming
    // (non-growth) edges, of that edge's "no spread" factor.
    let mut stay_healthy = 1.0;
    for &edge_id in &lnl.in_edges {
        let edge = graph.edge(edge_id);
        if edge.is_growth {
            continue;
        }
        let parent_state = if edge.is_tumor_spread {
            1
        } else {
            graph.node(edge.parent).as_lnl().unwrap().state()
        };
        stay_healthy *= edge.factor_stay_healthy(parent_state);
    }

    let mut probs = vec![0.0; card];
    probs[0] = stay_healthy;
    probs[1] = 1.0 - stay_healthy;
    probs
}

/// Row-stochastic `S x S` matrix of hidden-state transition probabilities, memoized and
/// invalidated on edge-parameter mutation.
#[derive(Default, Clone)]
pub struct TransitionMatrix {
    cached: Option<Array2<f64>>,
}

impl TransitionMatrix {
    pub fn new() -> TransitionMatrix {
        TransitionMatrix { cached: None }
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Returns the cached matrix, assembling it first if necessary. `graph`'s node states are
    /// mutated in the process (one assignment per hidden state) but left in an unspecified
    /// state afterward; callers must not rely on `graph`'s state surviving this call.
    pub fn get_or_build(&mut self, graph: &mut Graph, states: &StateList) -> &Array2<f64> {
        if self.cached.is_none() {
            log::debug!("assembling transition matrix ({} states)", states.len());
            let s = states.len();
            let mut t = Array2::<f64>::zeros((s, s));
            let card = graph.allowed_states().cardinality();

            for i in 0..s {
                graph.assign_state_vector(&states.state_at(i));
                let per_lnl: Vec<Vec<f64>> = graph
                    .lnls()
                    .iter()
                    .map(|&id| lnl_transition_probs(graph, id))
                    .collect();

                for j in 0..s {
                    let mut idx = j;
                    let mut p = 1.0;
                    for lnl_probs in &per_lnl {
                        let digit = idx % card;
                        idx /= card;
                        p *= lnl_probs[digit];
                        if p == 0.0 {
                            break;
                        }
                    }
                    t[[i, j]] = p;
                }
            }
            self.cached = Some(t);
        }
        self.cached.as_ref().unwrap()
    }
}

/// Row-stochastic `S x |ObservationList|` matrix of observation probabilities, memoized and
/// invalidated on modality mutation.
#[derive(Default, Clone)]
pub struct ObservationMatrix {
    cached: Option<Array2<f64>>,
}

impl ObservationMatrix {
    pub fn new() -> ObservationMatrix {
        ObservationMatrix { cached: None }
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    pub fn get_or_build(
        &mut self,
        states: &StateList,
        observations: &ObservationList,
        modalities: &[Modality],
    ) -> &Array2<f64> {
        if self.cached.is_none() {
            log::debug!(
                "assembling observation matrix ({} states x {} observations)",
                states.len(),
                observations.len()
            );
            let s = states.len();
            let z = observations.len();
            let mut o = Array2::<f64>::zeros((s, z));

            for i in 0..s {
                let state = states.state_at(i);
                for j in 0..z {
                    let observation = observations.observation_at(j);
                    let mut p = 1.0;
                    for ((lnl_idx, &lnl_state), (mod_idx, modality)) in
                        itertools::iproduct!(state.iter().enumerate(), modalities.iter().enumerate())
                    {
                        if p == 0.0 {
                            break;
                        }
                        let pos = observations.entry_position(lnl_idx, mod_idx);
                        let observed = observation[pos] as usize;
                        p *= modality.confusion_matrix()[[observed, lnl_state]];
                    }
                    o[[i, j]] = p;
                }
            }
            self.cached = Some(o);
        }
        self.cached.as_ref().unwrap()
    }
}
