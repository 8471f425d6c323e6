//! Crate root: public surface for the mesh adaptive direct search core.
//!
//! This module is the single entry-point for downstream drivers. It
//! re-exports the submodules that together implement a MADS-style
//! derivative-free blackbox optimizer: mesh/frame geometry, a progressive
//! barrier, poll direction generation, a content-addressed evaluation
//! cache, a lock/unlock evaluation queue, a rayon-backed evaluator control,
//! run parameters, and the iteration driver that ties them together.
//!
//! ## Invariants
//!
//! - **No NaN.** `Double` is the only scalar type that crosses module
//!   boundaries for anything that can be undefined or infinite; it never
//!   produces `f64::NAN` ([`double`]).
//! - **f/h are derived, never set directly.** An [`eval::Eval`]'s objective
//!   and constraint-violation values are always a pure function of its raw
//!   blackbox output vector and the current output-type list.
//! - **hMax is non-increasing.** [`barrier::ProgressiveBarrier::update_with_points`]
//!   returns an error rather than silently accepting a state that would
//!   raise it.
//! - **Parameters are read-only after `check_and_comply`.** A [`params::Parameters`]
//!   is only reachable behind an `Arc`, built once by
//!   [`params::ParametersBuilder::build`].
//! - **Cache and evaluator queue are process-wide singletons when installed**
//!   via [`cache::Cache::install_global`]; nothing else in this crate assumes
//!   a singleton exists, so tests can construct independent instances.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// `Double`: a real scalar extended with undefined/infinity sentinels.
pub mod double;
/// `ArrayOfDouble`, `Point`, and `Direction`.
pub mod arrays;
/// Crate-wide error taxonomy.
pub mod error;
/// Shared enums: input/output kinds, eval status, success type, direction family.
pub mod types;
/// `Eval` and `EvalPoint`.
pub mod eval;
/// Mesh / frame geometry (`GMesh`, `CsMesh`).
pub mod mesh;
/// The progressive barrier.
pub mod barrier;
/// Poll direction generation.
pub mod direction;
/// The content-addressed evaluation cache.
pub mod cache;
/// The evaluation queue.
pub mod queue;
/// Evaluator control: pops blocks, calls an `Evaluator`, updates the cache and barrier.
pub mod evaluator;
/// Poll: trial-point assembly around a frame center.
pub mod poll;
/// Run parameters.
pub mod params;
/// The iteration driver and the top-level solver.
pub mod iteration;

pub use double::Double;
pub use arrays::{ArrayOfDouble, Direction, NormType, Point};
pub use error::CoreError;
pub use eval::{Eval, EvalPoint, EvalType};
pub use iteration::{MadsSolver, SolveOutcome};
pub use params::{Parameters, ParametersBuilder};
pub use types::{BbInputType, BbOutputType, BbOutputTypeList, DirectionType, EvalStatus, MeshStopReason, SuccessType};
