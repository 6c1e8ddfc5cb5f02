//! The string-keyed parameter surface: every tunable scalar — edge spread probabilities,
//! microscopic modifiers, growth probabilities, and per-T-stage diagnose-time parameters —
//! addressed by a key built from component identifiers.
//!
//! Keys are enumerated once from graph topology at construction time and mapped to a stable
//! slot via a [`bimap::BiMap`], so lookups work both directions without re-deriving names.

use std::collections::BTreeMap;

use bimap::BiMap;

use crate::distribution::DistributionDict;
use crate::error::{ModelError, Result};
use crate::graph::Graph;
use crate::node::EdgeId;

/// Reserved aggregate key: sets `micro_mod` on every LNL->LNL edge at once.
pub const MICRO_MOD_KEY: &str = "micro_mod";
/// Reserved aggregate key: sets `spread_prob` on every growth edge at once.
pub const GROWTH_KEY: &str = "growth";

#[derive(Clone, Debug)]
enum ParamTarget {
    Spread(EdgeId),
    Micro(EdgeId),
    Growth(EdgeId),
    Distribution(String),
}

/// Enumerates every parameter key derived from a graph's edges and a set of T-stages with
/// parametric diagnose-time distributions, and maps each to a stable slot.
#[derive(Clone, Debug, Default)]
pub struct ParameterTable {
    keys: BiMap<String, usize>,
    targets: Vec<ParamTarget>,
}

impl ParameterTable {
    /// Walks `graph`'s edges and `parametric_t_stages` to build the full key set. Call again
    /// (replacing the old table) whenever the set of parametric T-stages changes; the graph's
    /// own topology is fixed for the table's lifetime.
    pub fn build<'a>(
        graph: &Graph,
        parametric_t_stages: impl IntoIterator<Item = &'a String>,
    ) -> ParameterTable {
        let mut keys = BiMap::new();
        let mut targets = Vec::new();

        for edge_id in graph.tumor_edges() {
            let e = graph.edge(edge_id);
            let key = format!(
                "spread_{}_to_{}",
                graph.node(e.parent).name(),
                graph.node(e.child).name()
            );
            push(&mut keys, &mut targets, key, ParamTarget::Spread(edge_id));
        }

        for edge_id in graph.lnl_edges() {
            let e = graph.edge(edge_id);
            let key = format!(
                "spread_{}_to_{}",
                graph.node(e.parent).name(),
                graph.node(e.child).name()
            );
            push(&mut keys, &mut targets, key, ParamTarget::Spread(edge_id));

            if graph.allowed_states().is_trinary() {
                let micro_key = format!(
                    "micro_{}_to_{}",
                    graph.node(e.parent).name(),
                    graph.node(e.child).name()
                );
                push(&mut keys, &mut targets, micro_key, ParamTarget::Micro(edge_id));
            }
        }

        for edge_id in graph.growth_edges() {
            let e = graph.edge(edge_id);
            let key = format!("growth_{}", graph.node(e.child).name());
            push(&mut keys, &mut targets, key, ParamTarget::Growth(edge_id));
        }

        for t_stage in parametric_t_stages {
            let key = DistributionDict::param_key(t_stage);
            push(
                &mut keys,
                &mut targets,
                key,
                ParamTarget::Distribution(t_stage.clone()),
            );
        }

        ParameterTable { keys, targets }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.keys.left_values()
    }

    pub fn get(&self, key: &str, graph: &Graph, dists: &DistributionDict) -> Result<f64> {
        let &slot = self.keys.get_by_left(key).ok_or_else(|| unknown_key(key))?;
        Ok(match &self.targets[slot] {
            ParamTarget::Spread(e) => graph.edge(*e).spread_prob(),
            ParamTarget::Micro(e) => graph.edge(*e).micro_mod(),
            ParamTarget::Growth(e) => graph.edge(*e).spread_prob(),
            ParamTarget::Distribution(t) => dists.get_param(t).ok_or_else(|| unknown_key(key))?,
        })
    }

    pub fn get_all(&self, graph: &Graph, dists: &DistributionDict) -> BTreeMap<String, f64> {
        self.keys()
            .map(|k| {
                (
                    k.clone(),
                    self.get(k, graph, dists).expect("enumerated key must resolve"),
                )
            })
            .collect()
    }

    /// Atomically applies every `(key, value)` pair: all keys are validated — known and in
    /// `[0, 1]` — before any write happens, so a failing call leaves the model untouched. The
    /// reserved aggregate keys [`MICRO_MOD_KEY`] and [`GROWTH_KEY`] broadcast to every
    /// LNL->LNL edge / growth edge respectively.
    pub fn assign(
        &self,
        updates: &BTreeMap<String, f64>,
        graph: &mut Graph,
        dists: &mut DistributionDict,
    ) -> Result<()> {
        for (key, &value) in updates {
            if key == MICRO_MOD_KEY || key == GROWTH_KEY {
                validate_unit_range(key, value)?;
                continue;
            }
            if !self.keys.contains_left(key) {
                return Err(unknown_key(key));
            }
            validate_unit_range(key, value)?;
        }

        for (key, &value) in updates {
            match key.as_str() {
                MICRO_MOD_KEY => {
                    for e in graph.lnl_edges().collect::<Vec<_>>() {
                        graph.edge_mut(e).set_micro_mod(value)?;
                    }
                }
                GROWTH_KEY => {
                    for e in graph.growth_edges().collect::<Vec<_>>() {
                        graph.edge_mut(e).set_spread_prob(value)?;
                    }
                }
                _ => self.set_one(key, value, graph, dists)?,
            }
        }
        Ok(())
    }

    fn set_one(
        &self,
        key: &str,
        value: f64,
        graph: &mut Graph,
        dists: &mut DistributionDict,
    ) -> Result<()> {
        let slot = *self.keys.get_by_left(key).ok_or_else(|| unknown_key(key))?;
        match &self.targets[slot] {
            ParamTarget::Spread(e) => graph.edge_mut(*e).set_spread_prob(value),
            ParamTarget::Micro(e) => graph.edge_mut(*e).set_micro_mod(value),
            ParamTarget::Growth(e) => graph.edge_mut(*e).set_spread_prob(value),
            ParamTarget::Distribution(t) => dists.set_param(t, value),
        }
    }
}

fn validate_unit_range(key: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ModelError::ParameterRange(format!(
            "{} must be in [0, 1], got {}",
            key, value
        )));
    }
    Ok(())
}

fn unknown_key(key: &str) -> ModelError {
    ModelError::ParameterRange(format!("unknown parameter key: {}", key))
}

fn push(
    keys: &mut BiMap<String, usize>,
    targets: &mut Vec<ParamTarget>,
    key: String,
    target: ParamTarget,
) {
    let slot = targets.len();
    targets.push(target);
    let _ = keys.insert(key, slot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphSpec, NodeKind};
    use crate::node::AllowedStates;
    use std::collections::BTreeSet;

    fn small_graph() -> Graph {
        let mut spec: GraphSpec = BTreeMap::new();
        spec.insert(
            (NodeKind::Tumor, "T".to_string()),
            BTreeSet::from(["II".to_string()]),
        );
        spec.insert((NodeKind::Lnl, "II".to_string()), BTreeSet::new());
        Graph::new(&spec, AllowedStates::Binary).unwrap()
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut graph = small_graph();
        let mut dists = DistributionDict::new(2);
        let table = ParameterTable::build(&graph, std::iter::empty());
        let mut updates = BTreeMap::new();
        updates.insert("not_a_real_key".to_string(), 0.5);
        assert!(table.assign(&updates, &mut graph, &mut dists).is_err());
    }

    #[test]
    fn out_of_range_leaves_model_untouched() {
        let mut graph = small_graph();
        let mut dists = DistributionDict::new(2);
        let table = ParameterTable::build(&graph, std::iter::empty());
        let before = table.get_all(&graph, &dists);

        let mut updates = BTreeMap::new();
        updates.insert("spread_T_to_II".to_string(), 1.5);
        assert!(table.assign(&updates, &mut graph, &mut dists).is_err());

        let after = table.get_all(&graph, &dists);
        assert_eq!(before, after);
    }

    #[test]
    fn round_trips_through_get_and_assign() {
        let mut graph = small_graph();
        let mut dists = DistributionDict::new(2);
        let table = ParameterTable::build(&graph, std::iter::empty());

        let mut updates = BTreeMap::new();
        updates.insert("spread_T_to_II".to_string(), 0.42);
        table.assign(&updates, &mut graph, &mut dists).unwrap();

        let params = table.get_all(&graph, &dists);
        table.assign(&params, &mut graph, &mut dists).unwrap();
        let round_tripped = table.get_all(&graph, &dists);
        assert_eq!(params, round_tripped);
    }
}
