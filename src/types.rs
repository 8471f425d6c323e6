//! Small shared enums: per-coordinate input kinds, per-output kinds,
//! evaluation status, success classification, and direction family tags.

use serde::{Deserialize, Serialize};

/// Per-coordinate kind of a blackbox input variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BbInputType {
    /// Continuous variable (default).
    Continuous,
    /// Integer variable; granularity is forced to `1`.
    Integer,
    /// Binary variable; domain is restricted to `{0, 1}`, granularity `1`.
    Binary,
}

impl BbInputType {
    /// The granularity this input kind imposes, or `0.0` for continuous
    /// (meaning "no forced granularity"; a user-supplied granularity still applies).
    pub fn forced_granularity(&self) -> Option<f64> {
        match self {
            BbInputType::Continuous => None,
            BbInputType::Integer | BbInputType::Binary => Some(1.0),
        }
    }
}

/// Per-output kind of a blackbox output value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BbOutputType {
    /// The objective to minimize. Multiple `Obj` entries are permitted for
    /// multi-objective drivers (§3); this crate does not itself combine
    /// them beyond what the caller directs (Non-goal: no Pareto maintenance).
    Obj,
    /// Extreme-barrier constraint: any positive value forces `h = +INF`.
    Eb,
    /// Progressive-barrier constraint: squared violations are summed into `h`.
    Pb,
    /// Relaxable progressive-barrier constraint; same aggregation as `Pb`.
    RPb,
    /// Informational output, not used in f/h computation.
    Info,
}

/// The ordered list of output kinds a blackbox's raw output vector is interpreted under.
pub type BbOutputTypeList = Vec<BbOutputType>;

/// Status of one [`crate::eval::Eval`] record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalStatus {
    NotStarted,
    InProgress,
    Ok,
    Failed,
    Error,
    UserRejected,
    ConsHOver,
}

impl EvalStatus {
    /// `true` for statuses from which `f`/`h` are meaningfully defined.
    pub fn is_ok(&self) -> bool {
        matches!(self, EvalStatus::Ok)
    }
}

/// Outcome of comparing a newly evaluated point against a barrier reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SuccessType {
    Unsuccessful,
    PartialSuccess,
    FullSuccess,
}

/// Which mesh-stopping condition (if any) has been reached.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshStopReason {
    MinMeshSizeReached,
    MinFrameSizeReached,
    GranularityReached,
}

/// Family of poll direction generator, selecting among §4.3's constructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionType {
    Ortho2N,
    Qr2N,
    NPlus1Uni,
    NPlus1NegQuad,
    Single,
    DoubleDir,
    Coordinate,
}
