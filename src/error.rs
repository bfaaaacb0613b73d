//! Crate-wide error type.
//!
//! Every fallible operation returns [`Result`]. Numerical invariants
//! (probability mass, deterministic task-set selection) are asserted instead:
//! a violation there is a defect in the model, not an input problem.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Unknown learning style '{0}' (expected s-flat, flat, hierarchical, RL or Bayes)")]
    UnknownLearningStyle(String),

    #[error("Unknown data set '{0}' (expected Aliens or PS)")]
    UnknownDataSet(String),

    #[error("Unknown parameter name '{0}'")]
    UnknownParameter(String),

    #[error("Learning style {style} cannot be used with data set {data_set}")]
    StyleMismatch {
        style: &'static str,
        data_set: &'static str,
    },

    #[error("Trial {trial} out of range: sequence has {len} trials")]
    TrialOutOfRange { trial: usize, len: usize },

    #[error("Stimulus ({context}, {alien}) outside task dimensions")]
    StimulusOutOfRange { context: usize, alien: usize },

    #[error("Action {action} outside [0, {n_actions})")]
    ActionOutOfRange { action: usize, n_actions: usize },

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: String, column: String },

    #[error("{path}:{line}: cannot parse column '{column}' value '{value}'")]
    MalformedCell {
        path: String,
        line: usize,
        column: String,
        value: String,
    },

    #[error("{path}:{line}: expected {expected} fields, found {found}")]
    RaggedRow {
        path: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{path}:{line}: column '{column}' value {value} outside [0, {limit})")]
    CellOutOfRange {
        path: String,
        line: usize,
        column: String,
        value: usize,
        limit: usize,
    },

    #[error("No files matching '{pattern}' in {}", dir.display())]
    NoDataFiles { dir: PathBuf, pattern: String },

    #[error("Trial data is empty")]
    EmptyData,

    #[error("Posterior archive has no entries for '{0}'")]
    MissingPosterior(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
