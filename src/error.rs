//! Crate-wide error taxonomy.
//!
//! Each subsystem owns a narrow `thiserror` enum describing only the
//! integrity/configuration failures that are fatal to that subsystem (per
//! §7: per-point evaluation outcomes are data, carried on `EvalStatus`, and
//! never surface as a `Result::Err`). [`CoreError`] aggregates them for call
//! sites that want one error type to propagate with `?`.

use thiserror::Error;

/// Mesh geometry integrity errors.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("initial frame size is not fully defined for all {n} coordinates")]
    IncompleteInitialFrameSize { n: usize },
    #[error("minimum mesh size is not fully defined for all {n} coordinates")]
    IncompleteMinMeshSize { n: usize },
    #[error("frame size integrity check failed at coordinate {index}: mantissa {mantissa} is not one of {{1,2,5}}")]
    BadMantissa { index: usize, mantissa: i64 },
}

/// Progressive barrier integrity errors.
#[derive(Debug, Error)]
pub enum BarrierError {
    #[error("cannot update barrier with a point of dimension {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("hMax increased from {old} to {new}, violating the non-increasing invariant")]
    HMaxIncreased { old: String, new: String },
}

/// Cache integrity errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache update requested for a point not present in the cache")]
    UpdateOfMissingEntry,
    #[error("cache file line could not be parsed: {0}")]
    MalformedLine(String),
    #[error("I/O error reading/writing cache file: {0}")]
    Io(#[from] std::io::Error),
}

/// Evaluation queue / evaluator control integrity errors.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("lockQueue/unlockQueue called out of order (already locked by another producer)")]
    QueueAlreadyLocked,
    #[error("unlockQueue called without a matching lockQueue")]
    QueueNotLocked,
    #[error("blackbox process exited with non-zero status {0}")]
    BlackboxNonZeroExit(i32),
    #[error("blackbox produced {got} output tokens, expected at least {expected}")]
    TruncatedOutput { expected: usize, got: usize },
}

/// Parameter validation errors, returned by `Parameters::check_and_comply`.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("missing mandatory parameter: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("{name} has length {got}, expected {expected} (one per coordinate)")]
    WrongLength { name: &'static str, expected: usize, got: usize },
}

/// Aggregated crate error for call sites that want a single `Result` type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Barrier(#[from] BarrierError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),
    #[error(transparent)]
    Param(#[from] ParamError),
}
