//! Diagnostic modalities: column-stochastic confusion matrices `P(observation | hidden)`.

use ndarray::Array2;

use crate::error::{ModelError, Result};
use crate::node::AllowedStates;

/// A diagnostic modality's confusion matrix, shape `(2, |allowed_states|)`. Column `s` is the
/// distribution over `{observed negative, observed positive}` given hidden state `s`.
#[derive(Clone, Debug)]
pub struct Modality {
    matrix: Array2<f64>,
}

impl Modality {
    /// Wraps a caller-supplied confusion matrix, validating its shape against
    /// `allowed_states`: a `2x2` matrix is only accepted for a binary graph, `2x3` only for a
    /// trinary one.
    pub fn from_confusion_matrix(matrix: Array2<f64>, allowed_states: AllowedStates) -> Result<Modality> {
        let expected = (2, allowed_states.cardinality());
        if matrix.dim() != expected {
            return Err(ModelError::Shape(format!(
                "confusion matrix has shape {:?}, expected {:?}",
                matrix.dim(),
                expected
            )));
        }
        Ok(Modality { matrix })
    }

    /// Expands a `(specificity, sensitivity)` pair into a confusion matrix the same way the
    /// built-in `clinical` modality does: sensitivity applies uniformly to every involved
    /// state, without distinguishing microscopic from macroscopic involvement.
    pub fn from_spsn(specificity: f64, sensitivity: f64, allowed_states: AllowedStates) -> Result<Modality> {
        Modality::clinical(specificity, sensitivity, allowed_states)
    }

    /// Built-in convenience modality: specificity only affects state `0`; sensitivity is
    /// applied uniformly to every state `>= 1`.
    pub fn clinical(specificity: f64, sensitivity: f64, allowed_states: AllowedStates) -> Result<Modality> {
        validate_spsn(specificity, sensitivity)?;
        let card = allowed_states.cardinality();
        let mut matrix = Array2::<f64>::zeros((2, card));
        matrix[[0, 0]] = specificity;
        matrix[[1, 0]] = 1.0 - specificity;
        for s in 1..card {
            matrix[[0, s]] = 1.0 - sensitivity;
            matrix[[1, s]] = sensitivity;
        }
        Ok(Modality { matrix })
    }

    /// Built-in convenience modality: like `clinical` for binary graphs, but in the trinary
    /// case distinguishes microscopic from macroscopic involvement. Pathological exam is taken
    /// to detect macroscopic disease with certainty, and microscopic disease with the given
    /// `sensitivity`.
    pub fn pathological(specificity: f64, sensitivity: f64, allowed_states: AllowedStates) -> Result<Modality> {
        validate_spsn(specificity, sensitivity)?;
        let card = allowed_states.cardinality();
        let mut matrix = Array2::<f64>::zeros((2, card));
        matrix[[0, 0]] = specificity;
        matrix[[1, 0]] = 1.0 - specificity;
        matrix[[0, 1]] = 1.0 - sensitivity;
        matrix[[1, 1]] = sensitivity;
        if card == 3 {
            matrix[[0, 2]] = 0.0;
            matrix[[1, 2]] = 1.0;
        }
        Ok(Modality { matrix })
    }

    pub fn confusion_matrix(&self) -> &Array2<f64> {
        &self.matrix
    }
}

fn validate_spsn(specificity: f64, sensitivity: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&specificity) {
        return Err(ModelError::ParameterRange(format!(
            "specificity must be in [0, 1], got {}",
            specificity
        )));
    }
    if !(0.0..=1.0).contains(&sensitivity) {
        return Err(ModelError::ParameterRange(format!(
            "sensitivity must be in [0, 1], got {}",
            sensitivity
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clinical_columns_are_stochastic() {
        let m = Modality::clinical(0.9, 0.8, AllowedStates::Trinary).unwrap();
        for col in m.confusion_matrix().columns() {
            assert!((col.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn pathological_macroscopic_is_certain() {
        let m = Modality::pathological(0.9, 0.7, AllowedStates::Trinary).unwrap();
        assert_eq!(m.confusion_matrix()[[1, 2]], 1.0);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let matrix = Array2::<f64>::eye(2);
        let err = Modality::from_confusion_matrix(matrix, AllowedStates::Trinary);
        assert!(err.is_err());
    }
}
