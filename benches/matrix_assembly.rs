use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use lymph_spread::graph::{GraphSpec, NodeKind};
use lymph_spread::model::UnilateralModel;
use lymph_spread::modality::Modality;
use lymph_spread::node::AllowedStates;

/// A tumor spreading into a chain of five trinary LNLs, each spreading to the next.
fn chain_model(num_lnls: usize) -> UnilateralModel {
    let names: Vec<String> = (0..num_lnls).map(|i| format!("L{}", i)).collect();
    let mut spec: GraphSpec = BTreeMap::new();
    spec.insert(
        (NodeKind::Tumor, "T".to_string()),
        BTreeSet::from([names[0].clone()]),
    );
    for (i, name) in names.iter().enumerate() {
        let children = if i + 1 < names.len() {
            BTreeSet::from([names[i + 1].clone()])
        } else {
            BTreeSet::new()
        };
        spec.insert((NodeKind::Lnl, name.clone()), children);
    }

    let mut model = UnilateralModel::new(&spec, AllowedStates::Trinary, 10).unwrap();
    let mut updates = BTreeMap::new();
    updates.insert(format!("spread_T_to_{}", names[0]), 0.3);
    for i in 0..names.len() - 1 {
        updates.insert(format!("spread_{}_to_{}", names[i], names[i + 1]), 0.2);
    }
    updates.insert("micro_mod".to_string(), 0.5);
    updates.insert("growth".to_string(), 0.4);
    model.assign_params(&updates).unwrap();
    model.set_modality("path", Modality::pathological(0.9, 0.8, AllowedStates::Trinary).unwrap()).unwrap();
    model
}

fn assemble_transition_matrix(model: &mut UnilateralModel) {
    model.transition_matrix();
}

fn assemble_observation_matrix(model: &mut UnilateralModel) {
    model.observation_matrix();
}

pub fn criterion_benchmark_transition(c: &mut Criterion) {
    let mut group = c.benchmark_group("transition_matrix_assembly");
    group.sample_size(10).measurement_time(Duration::from_secs(10));
    group.bench_function("chain_of_5_trinary_lnls", move |b| {
        b.iter_batched(
            || chain_model(5),
            |mut model| assemble_transition_matrix(&mut model),
            criterion::BatchSize::PerIteration,
        )
    });
    group.finish();
}

pub fn criterion_benchmark_observation(c: &mut Criterion) {
    let mut group = c.benchmark_group("observation_matrix_assembly");
    group.sample_size(10).measurement_time(Duration::from_secs(10));
    group.bench_function("chain_of_5_trinary_lnls", move |b| {
        b.iter_batched(
            || chain_model(5),
            |mut model| assemble_observation_matrix(&mut model),
            criterion::BatchSize::PerIteration,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    criterion_benchmark_transition,
    criterion_benchmark_observation
);
criterion_main!(benches);
