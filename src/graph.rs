//! The graph of tumor and LNL nodes connected by spread/growth edges.
//!
//! Nodes and edges are arena-allocated in flat `Vec`s and addressed by stable [`NodeId`] /
//! [`EdgeId`] indices; nothing owns a back-pointer to anything else (see spec design notes on
//! cycles and back-references).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::edge::Edge;
use crate::error::{ModelError, Result};
use crate::node::{AllowedStates, EdgeId, Lnl, Node, NodeId, Tumor};

/// The kind of a node in a [`GraphSpec`] key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    Tumor,
    Lnl,
}

/// Input format for [`Graph::new`]: a `(kind, name) -> {child LNL names}` mapping. A
/// `BTreeMap` is used rather than a `HashMap` so that iteration order (and therefore node
/// insertion order) is deterministic and reproducible across runs, matching the "ordered and
/// exhaustive" framing the rest of the crate relies on for canonical state ordering.
pub type GraphSpec = BTreeMap<(NodeKind, String), BTreeSet<String>>;

/// Node names may not start with any of these, since each is a prefix `crate::params` uses to
/// build parameter keys.
const RESERVED_NAME_PREFIXES: &[&str] = &["spread_", "micro_", "growth_", "dist_"];

/// Owns all [`Node`]s and [`Edge`]s of a lymphatic system graph.
#[derive(Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    name_to_id: HashMap<String, NodeId>,
    /// LNL ids in canonical (alphabetical-by-name) order; this fixes the positional order used
    /// throughout the crate for state vectors, observation vectors and parameter names.
    lnl_order: Vec<NodeId>,
    tumor_order: Vec<NodeId>,
    allowed_states: AllowedStates,
}

impl Graph {
    /// Builds and validates a graph from its external spec.
    ///
    /// Validation performed eagerly, per spec: all referenced names resolve, names are unique
    /// across kinds, tumors have outgoing edges only (children must be LNLs), and the
    /// resulting LNLs all share `allowed_states`. A growth self-edge is added automatically for
    /// every LNL when `allowed_states` is [`AllowedStates::Trinary`].
    pub fn new(spec: &GraphSpec, allowed_states: AllowedStates) -> Result<Graph> {
        let mut nodes = Vec::with_capacity(spec.len());
        let mut name_to_id = HashMap::with_capacity(spec.len());

        for (kind, name) in spec.keys() {
            if let Some(prefix) = RESERVED_NAME_PREFIXES.iter().find(|p| name.starts_with(**p)) {
                return Err(ModelError::Construction(format!(
                    "node name '{}' starts with reserved parameter-key prefix '{}'",
                    name, prefix
                )));
            }
            if name_to_id.contains_key(name) {
                return Err(ModelError::Construction(format!(
                    "duplicate node name: {}",
                    name
                )));
            }
            let id = nodes.len();
            let node = match kind {
                NodeKind::Tumor => Node::Tumor(Tumor::new(name.clone())),
                NodeKind::Lnl => Node::Lnl(Lnl::new(name.clone(), allowed_states)),
            };
            nodes.push(node);
            name_to_id.insert(name.clone(), id);
        }

        let mut edges: Vec<Edge> = Vec::new();

        for ((kind, name), children) in spec.iter() {
            let parent_id = name_to_id[name];

            if children.contains(name) {
                return Err(ModelError::Construction(format!(
                    "{} lists itself as a child; growth edges are added automatically",
                    name
                )));
            }

            for child_name in children {
                let child_id = *name_to_id.get(child_name).ok_or_else(|| {
                    ModelError::Construction(format!(
                        "edge {} -> {} references an unknown node",
                        name, child_name
                    ))
                })?;
                if !matches!(nodes[child_id], Node::Lnl(_)) {
                    return Err(ModelError::Construction(format!(
                        "{} cannot be an edge target; only LNLs can be children",
                        child_name
                    )));
                }

                let is_tumor_spread = *kind == NodeKind::Tumor;
                let edge_id = edges.len();
                edges.push(Edge::new(parent_id, child_id, is_tumor_spread, false));

                match &mut nodes[parent_id] {
                    Node::Tumor(t) => t.out_edges.push(edge_id),
                    Node::Lnl(l) => l.out_edges.push(edge_id),
                }
                nodes[child_id].as_lnl_mut().unwrap().in_edges.push(edge_id);
            }
        }

        let mut lnl_order: Vec<NodeId> = name_to_id
            .iter()
            .filter(|(_, &id)| matches!(nodes[id], Node::Lnl(_)))
            .map(|(_, &id)| id)
            .collect();
        lnl_order.sort_by_key(|&id| nodes[id].name().to_string());

        let mut tumor_order: Vec<NodeId> = name_to_id
            .iter()
            .filter(|(_, &id)| matches!(nodes[id], Node::Tumor(_)))
            .map(|(_, &id)| id)
            .collect();
        tumor_order.sort_by_key(|&id| nodes[id].name().to_string());

        if tumor_order.is_empty() {
            return Err(ModelError::Construction(
                "graph must contain at least one tumor node".to_string(),
            ));
        }
        if lnl_order.is_empty() {
            return Err(ModelError::Construction(
                "graph must contain at least one LNL".to_string(),
            ));
        }

        if allowed_states.is_trinary() {
            for &lnl_id in &lnl_order {
                let edge_id = edges.len();
                edges.push(Edge::new(lnl_id, lnl_id, false, true));
                nodes[lnl_id].as_lnl_mut().unwrap().growth_edge = Some(edge_id);
                nodes[lnl_id].as_lnl_mut().unwrap().in_edges.push(edge_id);
            }
        }

        check_uniform_allowed_states(&nodes, &lnl_order)?;

        Ok(Graph {
            nodes,
            edges,
            name_to_id,
            lnl_order,
            tumor_order,
            allowed_states,
        })
    }

    pub fn allowed_states(&self) -> AllowedStates {
        self.allowed_states
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// LNL node ids in canonical order. This order fixes the positional layout of
    /// [`crate::state::StateList`] and every state vector in the crate.
    pub fn lnls(&self) -> &[NodeId] {
        &self.lnl_order
    }

    pub fn tumors(&self) -> &[NodeId] {
        &self.tumor_order
    }

    pub fn num_lnls(&self) -> usize {
        self.lnl_order.len()
    }

    pub fn find_id(&self, name: &str) -> Option<NodeId> {
        self.name_to_id.get(name).copied()
    }

    /// All tumor -> LNL edges.
    pub fn tumor_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.tumor_order
            .iter()
            .flat_map(move |&t| match &self.nodes[t] {
                Node::Tumor(tumor) => tumor.out_edges.iter().copied(),
                Node::Lnl(_) => unreachable!(),
            })
    }

    /// All LNL -> LNL edges, excluding growth self-edges.
    pub fn lnl_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.lnl_order.iter().flat_map(move |&l| {
            let lnl = self.nodes[l].as_lnl().unwrap();
            lnl.out_edges
                .iter()
                .copied()
                .filter(|&e| !self.edges[e].is_growth)
        })
    }

    /// All growth self-edges, one per LNL, in canonical order.
    pub fn growth_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.lnl_order
            .iter()
            .filter_map(move |&l| self.nodes[l].as_lnl().unwrap().growth_edge)
    }

    /// Reads the current state of every LNL, in canonical order.
    pub fn state_vector(&self) -> Vec<usize> {
        self.lnl_order
            .iter()
            .map(|&id| self.nodes[id].as_lnl().unwrap().state())
            .collect()
    }

    /// Assigns a new state to every LNL, in canonical order. Panics if `states.len()` does not
    /// match [`Graph::num_lnls`] or a value is out of range.
    pub fn assign_state_vector(&mut self, states: &[usize]) {
        assert_eq!(states.len(), self.lnl_order.len());
        for (&id, &s) in self.lnl_order.iter().zip(states.iter()) {
            self.nodes[id].as_lnl_mut().unwrap().set_state(s);
        }
    }
}

fn check_uniform_allowed_states(nodes: &[Node], lnl_order: &[NodeId]) -> Result<()> {
    let mut seen: Option<AllowedStates> = None;
    for &id in lnl_order {
        let allowed = nodes[id].as_lnl().unwrap().allowed_states;
        match seen {
            None => seen = Some(allowed),
            Some(prev) if prev != allowed => {
                return Err(ModelError::Construction(
                    "all LNLs in a graph must share the same allowed_states cardinality"
                        .to_string(),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}
