//! Error types shared across the crate.

use thiserror::Error;

/// Error types produced while building or mutating a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Raised eagerly while assembling a [`crate::graph::Graph`] from its spec: duplicate
    /// names, dangling edges, mixed binary/trinary LNLs, or a tumor with incoming edges.
    #[error("graph construction failed: {0}")]
    Construction(String),

    /// A probability or modifier fell outside `[0, 1]`, or `assign_params` was given an
    /// unknown parameter key.
    #[error("parameter out of range or unknown: {0}")]
    ParameterRange(String),

    /// `diagnose_matrices` or patient data was read before any data had been ingested.
    #[error("no data has been loaded yet: {0}")]
    MissingData(String),

    /// A modality's confusion matrix has the wrong shape for the current hidden-state
    /// cardinality.
    #[error("invalid confusion matrix shape: {0}")]
    Shape(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
