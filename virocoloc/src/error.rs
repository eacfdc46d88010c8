//! Error types, one enum per failure class of the analysis pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::params::ThresholdField;

/// Missing or unreadable input data. The operation is aborted and the
/// session keeps its previous state.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read image '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode TIFF '{path}': {source}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("Unsupported image '{path}': {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("Image '{path}' contains no pixels")]
    Empty { path: PathBuf },

    #[error("Pages of '{path}' differ in size")]
    InconsistentPages { path: PathBuf },

    #[error("{what} is {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("No file selected for {purpose}")]
    Cancelled { purpose: &'static str },
}

/// A threshold text field could not be used. Non-fatal: the previous
/// value stays in effect.
#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("'{text}' is not a positive number for {field}")]
    Invalid { field: ThresholdField, text: String },

    #[error("Unknown threshold '{0}' (expected thickness, upper_ratio, lower_ratio or area)")]
    UnknownField(String),
}

/// Degenerate algorithmic input detected at a stage boundary.
#[derive(Debug, Error)]
pub enum ComputationError {
    #[error("{stage} needs {missing}, which is not available")]
    MissingInput {
        stage: &'static str,
        missing: &'static str,
    },

    #[error("{stage} received an empty image")]
    EmptyImage { stage: &'static str },

    #[error("{stage}: {what} is {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        stage: &'static str,
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// The instance segmentation backend failed.
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("Failed to exchange data with the segmentation backend: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Failed to start segmentation program '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Segmentation program '{program}' exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Label map is {actual:?}, image is {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Reading or writing analysis records and reports failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed analysis record '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid analysis record '{path}': {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("Failed to write report '{path}': {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("No location selected for {purpose}")]
    Cancelled { purpose: &'static str },
}

/// Any failure of a pipeline stage.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Computation(#[from] ComputationError),

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
