//! Tumor and LNL node representations.
//!
//! A [`Graph`](crate::graph::Graph) never owns a `Node` through a back-pointer; nodes and
//! edges are addressed by stable arena indices instead (see [`crate::graph`]).

use crate::graph::Graph;

/// Number of states an LNL can be in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllowedStates {
    /// Healthy (0) or involved (1).
    Binary,
    /// Healthy (0), microscopically involved (1) or macroscopically involved (2).
    Trinary,
}

impl AllowedStates {
    /// Number of distinct states, i.e. `|allowed_states|`.
    pub fn cardinality(&self) -> usize {
        match self {
            AllowedStates::Binary => 2,
            AllowedStates::Trinary => 3,
        }
    }

    pub fn is_trinary(&self) -> bool {
        matches!(self, AllowedStates::Trinary)
    }

    /// Highest index a state can take (`cardinality() - 1`).
    pub fn max_state(&self) -> usize {
        self.cardinality() - 1
    }
}

/// Index of an edge inside [`crate::graph::Graph::edges`].
pub type EdgeId = usize;
/// Index of a node inside [`crate::graph::Graph::nodes`].
pub type NodeId = usize;

/// A tumor node. Always involved; has outgoing edges only.
#[derive(Clone, Debug)]
pub struct Tumor {
    pub name: String,
    pub out_edges: Vec<EdgeId>,
}

impl Tumor {
    pub fn new(name: String) -> Tumor {
        Tumor {
            name,
            out_edges: Vec::new(),
        }
    }
}

/// A lymph node level. Its `state` is mutable and must stay within `allowed_states`.
#[derive(Clone, Debug)]
pub struct Lnl {
    pub name: String,
    pub allowed_states: AllowedStates,
    state: usize,
    pub in_edges: Vec<EdgeId>,
    pub out_edges: Vec<EdgeId>,
    /// The self-edge modelling `1->2` growth, only present for trinary LNLs.
    pub growth_edge: Option<EdgeId>,
}

impl Lnl {
    pub fn new(name: String, allowed_states: AllowedStates) -> Lnl {
        Lnl {
            name,
            allowed_states,
            state: 0,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
            growth_edge: None,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.allowed_states, AllowedStates::Binary)
    }

    pub fn is_trinary(&self) -> bool {
        self.allowed_states.is_trinary()
    }

    pub fn state(&self) -> usize {
        self.state
    }

    /// `P(self.state | parents' states)` under the static BN interpretation: the edge
    /// probability contract with growth and the time dimension removed.
    ///
    /// For a binary LNL this is just the usual "stay healthy" product of incoming edges'
    /// no-spread factors, or its complement. A trinary LNL has no direct mechanism for
    /// `0 -> 2` once growth is removed, so the "involved" mass is split between microscopic
    /// (1) and macroscopic (2) using the growth edge's `spread_prob` as the steady-state
    /// micro/macro mix.
    pub fn bn_prob(&self, graph: &Graph) -> f64 {
        let mut stay_healthy = 1.0;
        for &edge_id in &self.in_edges {
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
        let p_involved = 1.0 - stay_healthy;

        match self.state() {
            0 => stay_healthy,
            1 if self.is_trinary() => p_involved * (1.0 - self.growth_prob(graph)),
            2 if self.is_trinary() => p_involved * self.growth_prob(graph),
            _ => p_involved,
        }
    }

    fn growth_prob(&self, graph: &Graph) -> f64 {
        graph
            .edge(self.growth_edge.expect("trinary LNL must have a growth edge"))
            .spread_prob()
    }

    /// Sets the LNL's current state. Panics if `state` is not in `allowed_states`.
    pub fn set_state(&mut self, state: usize) {
        assert!(
            state <= self.allowed_states.max_state(),
            "state {} is out of range for {:?} LNL {}",
            state,
            self.allowed_states,
            self.name
        );
        self.state = state;
    }
}

/// A tagged node: either a [`Tumor`] or an [`Lnl`].
///
/// Modelled as an enum rather than a class hierarchy: "tumor vs LNL" is a fixed, closed set
/// of kinds known up front, so a `match` on the variant replaces a runtime `isinstance` check.
#[derive(Clone, Debug)]
pub enum Node {
    Tumor(Tumor),
    Lnl(Lnl),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Tumor(t) => &t.name,
            Node::Lnl(l) => &l.name,
        }
    }

    pub fn is_tumor(&self) -> bool {
        matches!(self, Node::Tumor(_))
    }

    pub fn as_lnl(&self) -> Option<&Lnl> {
        match self {
            Node::Lnl(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_lnl_mut(&mut self) -> Option<&mut Lnl> {
        match self {
            Node::Lnl(l) => Some(l),
            _ => None,
        }
    }

    /// Whether this node counts as "involved" for the purposes of an outgoing edge's spread
    /// computation. A tumor is always involved; an LNL is involved iff its state is `>= 1`.
    pub fn is_involved(&self) -> bool {
        match self {
            Node::Tumor(_) => true,
            Node::Lnl(l) => l.state() >= 1,
        }
    }
}
