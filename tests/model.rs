use std::collections::{BTreeMap, BTreeSet};

use ndarray::arr1;

use lymph_spread::data::{PatientData, PatientRow};
use lymph_spread::graph::{GraphSpec, NodeKind};
use lymph_spread::model::{GivenDiagnoses, Mode, TimeMarginal, UnilateralModel};
use lymph_spread::modality::Modality;
use lymph_spread::node::AllowedStates;

fn single_trinary_lnl() -> UnilateralModel {
    let mut spec: GraphSpec = BTreeMap::new();
    spec.insert((NodeKind::Tumor, "T".to_string()), BTreeSet::from(["II".to_string()]));
    spec.insert((NodeKind::Lnl, "II".to_string()), BTreeSet::new());
    let mut model = UnilateralModel::new(&spec, AllowedStates::Trinary, 3).unwrap();
    let mut updates = BTreeMap::new();
    updates.insert("spread_T_to_II".to_string(), 0.2);
    updates.insert("growth_II".to_string(), 0.5);
    model.assign_params(&updates).unwrap();
    model
}

/// Trinary growth: from state 1, P(1->2) = 0.5, P(1->1) = 0.5; from state 0,
/// P(0->1) = 0.2, P(0->0) = 0.8.
#[test]
fn trinary_growth_transitions() {
    let mut model = single_trinary_lnl();
    let t = model.transition_matrix().clone();
    let states = model.states();

    let from0 = states.index_of(&[0]);
    let to0 = states.index_of(&[0]);
    let to1 = states.index_of(&[1]);
    assert!((t[[from0, to0]] - 0.8).abs() < 1e-12);
    assert!((t[[from0, to1]] - 0.2).abs() < 1e-12);

    let from1 = model.states().index_of(&[1]);
    let to2 = model.states().index_of(&[2]);
    assert!((t[[from1, to1]] - 0.5).abs() < 1e-12);
    assert!((t[[from1, to2]] - 0.5).abs() < 1e-12);
}

/// Row-stochastic, and no regression (monotone non-decreasing per coordinate) for a larger
/// trinary graph.
#[test]
fn transition_matrix_is_row_stochastic_and_monotone() {
    let mut spec: GraphSpec = BTreeMap::new();
    spec.insert(
        (NodeKind::Tumor, "T".to_string()),
        BTreeSet::from(["II".to_string(), "III".to_string()]),
    );
    spec.insert((NodeKind::Lnl, "II".to_string()), BTreeSet::from(["III".to_string()]));
    spec.insert((NodeKind::Lnl, "III".to_string()), BTreeSet::new());
    let mut model = UnilateralModel::new(&spec, AllowedStates::Trinary, 2).unwrap();
    let mut updates = BTreeMap::new();
    updates.insert("spread_T_to_II".to_string(), 0.3);
    updates.insert("spread_T_to_III".to_string(), 0.1);
    updates.insert("spread_II_to_III".to_string(), 0.25);
    updates.insert("micro_mod".to_string(), 0.6);
    updates.insert("growth".to_string(), 0.4);
    model.assign_params(&updates).unwrap();

    let t = model.transition_matrix().clone();
    let states = model.states();
    for i in 0..t.nrows() {
        let row_sum: f64 = t.row(i).sum();
        assert!((row_sum - 1.0).abs() < 1e-10);

        let from = states.state_at(i);
        for j in 0..t.ncols() {
            if t[[i, j]] > 1e-12 {
                let to = states.state_at(j);
                assert!(
                    from.iter().zip(to.iter()).all(|(&f, &tt)| tt >= f),
                    "regression from {:?} to {:?} with probability {}",
                    from,
                    to,
                    t[[i, j]]
                );
            }
        }
    }
}

/// A fresh read after mutation must reflect the new parameter, not a stale cache.
#[test]
fn cache_invalidates_on_parameter_mutation() {
    let mut model = single_trinary_lnl();
    let before = model.transition_matrix().clone();

    let mut updates = BTreeMap::new();
    updates.insert("spread_T_to_II".to_string(), 0.9);
    model.assign_params(&updates).unwrap();

    let after = model.transition_matrix().clone();
    assert_ne!(before, after);
}

/// assign_params(get_params()) round-trips to the identity.
#[test]
fn parameter_round_trip_is_identity() {
    let mut model = single_trinary_lnl();
    let before = model.get_params();
    model.assign_params(&before).unwrap();
    let after = model.get_params();
    assert_eq!(before, after);
}

#[test]
fn bn_likelihood_is_negative_log() {
    let mut model = single_trinary_lnl();
    model
        .set_modality("path", Modality::pathological(0.95, 0.9, AllowedStates::Trinary).unwrap())
        .unwrap();
    let rows = vec![
        PatientRow::new("any", vec![Some(true)]),
        PatientRow::new("any", vec![Some(false)]),
    ];
    model.load_patient_data(PatientData::new(rows)).unwrap();

    let ll = model.likelihood(Mode::Bn, true, None).unwrap();
    assert!(ll < 0.0);
    assert!(ll.is_finite());
}

#[test]
fn risk_aggregates_over_a_partial_involvement_pattern() {
    let mut spec: GraphSpec = BTreeMap::new();
    spec.insert(
        (NodeKind::Tumor, "T".to_string()),
        BTreeSet::from(["II".to_string(), "III".to_string()]),
    );
    spec.insert((NodeKind::Lnl, "II".to_string()), BTreeSet::from(["III".to_string()]));
    spec.insert((NodeKind::Lnl, "III".to_string()), BTreeSet::new());
    let mut model = UnilateralModel::new(&spec, AllowedStates::Binary, 3).unwrap();
    let mut updates = BTreeMap::new();
    updates.insert("spread_T_to_II".to_string(), 0.4);
    updates.insert("spread_T_to_III".to_string(), 0.1);
    updates.insert("spread_II_to_III".to_string(), 0.2);
    model.assign_params(&updates).unwrap();
    model.set_modality("A", Modality::clinical(0.9, 0.8, AllowedStates::Binary).unwrap()).unwrap();
    model.set_frozen_distribution("early", arr1(&[0.0, 0.0, 1.0, 0.0])).unwrap();

    let given = GivenDiagnoses::new();
    let mut involvement = BTreeMap::new();
    involvement.insert("II".to_string(), 1usize);

    let risk = model
        .risk(
            Mode::Hmm,
            Some(&TimeMarginal::TStagePmf("early".to_string())),
            &given,
            Some(&involvement),
        )
        .unwrap();

    match risk {
        lymph_spread::model::Risk::Aggregate(p) => {
            assert!((0.0..=1.0).contains(&p));
        }
        lymph_spread::model::Risk::Distribution(_) => panic!("expected an aggregate"),
    }
}
