//! Patient data ingestion and per-T-stage diagnose matrix construction.
//!
//! CSV loading itself is a collaborator's concern: this module only defines the shape a
//! patient table must have ([`PatientTable`]) and how it gets turned into `C_t` matrices,
//! plus a minimal in-crate [`PatientData`] fixture.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::state::ObservationList;

/// One patient's observed diagnoses, one entry per `(lnl, modality)` pair in
/// [`ObservationList`] position order. `None` marks a missing (unobserved) entry.
#[derive(Clone, Debug, PartialEq)]
pub struct PatientRow {
    pub t_stage: String,
    pub entries: Vec<Option<bool>>,
}

impl PatientRow {
    pub fn new(t_stage: impl Into<String>, entries: Vec<Option<bool>>) -> PatientRow {
        PatientRow {
            t_stage: t_stage.into(),
            entries,
        }
    }
}

/// A source of patient rows. Implement this over your own tabular collaborator (e.g. a
/// dataframe wrapper) rather than funnelling data through a concrete CSV type.
pub trait PatientTable {
    fn rows(&self) -> &[PatientRow];
}

/// The default in-crate patient table: a flat, owned `Vec` of rows.
#[derive(Clone, Debug, Default)]
pub struct PatientData {
    rows: Vec<PatientRow>,
}

impl PatientData {
    pub fn new(rows: Vec<PatientRow>) -> PatientData {
        PatientData { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl PatientTable for PatientData {
    fn rows(&self) -> &[PatientRow] {
        &self.rows
    }
}

/// Reserved diagnose-matrix key under which every patient is pooled regardless of T-stage,
/// used by the BN likelihood: `p = pi_BN . C_BN` over all patients pooled under this key.
pub const BN_POOL_KEY: &str = "BN";

/// Builds one `C_t` per T-stage present in `table`, plus a [`BN_POOL_KEY`] entry pooling every
/// patient. `C_t[i, j] = sum` over observation vectors admitted by patient `j`'s non-missing
/// entries of `O[i, z]`; missing entries marginalize across their axis. Each patient's column
/// is independent, so columns are built in parallel.
pub fn build_diagnose_matrices<T: PatientTable>(
    table: &T,
    observation_matrix: &Array2<f64>,
    observations: &ObservationList,
) -> BTreeMap<String, Array2<f64>> {
    let mut by_stage: BTreeMap<String, Vec<&PatientRow>> = BTreeMap::new();
    let mut pooled: Vec<&PatientRow> = Vec::with_capacity(table.rows().len());

    for row in table.rows() {
        by_stage.entry(row.t_stage.clone()).or_default().push(row);
        pooled.push(row);
    }
    by_stage.insert(BN_POOL_KEY.to_string(), pooled);

    by_stage
        .into_iter()
        .map(|(stage, rows)| {
            let matrix = diagnose_matrix_for(&rows, observation_matrix, observations);
            (stage, matrix)
        })
        .collect()
}

fn diagnose_matrix_for(
    rows: &[&PatientRow],
    observation_matrix: &Array2<f64>,
    observations: &ObservationList,
) -> Array2<f64> {
    let s = observation_matrix.nrows();
    let columns: Vec<Array1<f64>> = rows
        .par_iter()
        .map(|row| patient_column(row, observation_matrix, observations, s))
        .collect();

    let mut c = Array2::<f64>::zeros((s, columns.len()));
    for (j, col) in columns.into_iter().enumerate() {
        c.column_mut(j).assign(&col);
    }
    c
}

fn patient_column(
    row: &PatientRow,
    observation_matrix: &Array2<f64>,
    observations: &ObservationList,
    s: usize,
) -> Array1<f64> {
    selector_column(&row.entries, observation_matrix, observations, s)
}

/// Marginalizes `O` over every observation vector admitted by a partial selector: `entries[k]`
/// is `Some(bit)` for an observed `(lnl, modality)` position or `None` for an unobserved one.
/// Also reused by [`crate::model`] for risk's `given_diagnoses` marginalization.
pub(crate) fn selector_column(
    entries: &[Option<bool>],
    observation_matrix: &Array2<f64>,
    observations: &ObservationList,
    s: usize,
) -> Array1<f64> {
    let mut col = Array1::<f64>::zeros(s);
    for z in 0..observations.len() {
        let obs = observations.observation_at(z);
        let admitted = entries
            .iter()
            .zip(obs.iter())
            .all(|(entry, &bit)| entry.map_or(true, |v| v == bit));
        if admitted {
            for i in 0..s {
                col[i] += observation_matrix[[i, z]];
            }
        }
    }
    col
}
