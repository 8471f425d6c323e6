//! `Eval` and `EvalPoint`: a raw blackbox output vector, the `(f, h)`
//! derived from it, and the `Point` it was evaluated at.

use crate::double::Double;
use crate::arrays::Point;
use crate::types::{BbOutputType, BbOutputTypeList, EvalStatus};
use std::collections::HashMap;

/// Which evaluator tier an [`Eval`] belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EvalType {
    Blackbox,
    Surrogate,
    Model,
}

/// One evaluation record: the raw blackbox output vector under a given
/// output-type list, plus the `f`/`h` recomputed from it.
///
/// `f`/`h` are not stored as independent fields the caller can set directly;
/// they are always a pure function of `(bb_outputs, output_types)`, recomputed
/// by [`Eval::set_bb_outputs`] and [`Eval::recompute_fh`]. This keeps the
/// "f defined iff status OK" and "EB>0 forces h=+INF" invariants from §3
/// structurally impossible to violate by construction.
#[derive(Clone, Debug)]
pub struct Eval {
    status: EvalStatus,
    bb_outputs: Vec<Double>,
    output_types: BbOutputTypeList,
    f: Double,
    h: Double,
    /// Objective components, one per `Obj` output, in order. `f` is the
    /// first of these; multi-objective drivers (outside this crate's scope)
    /// read the full vector.
    objectives: Vec<Double>,
    /// When `true`, `f` holds the phase-one surrogate objective (sum of
    /// squared EB violations) rather than the real objective (§4.2 PhaseOne).
    phase_one: bool,
}

impl Eval {
    pub fn not_started(output_types: BbOutputTypeList) -> Self {
        Eval {
            status: EvalStatus::NotStarted,
            bb_outputs: Vec::new(),
            output_types,
            f: Double::Undefined,
            h: Double::Undefined,
            objectives: Vec::new(),
            phase_one: false,
        }
    }

    pub fn status(&self) -> EvalStatus {
        self.status
    }

    pub fn set_status(&mut self, status: EvalStatus) {
        self.status = status;
    }

    pub fn f(&self) -> Double {
        self.f
    }

    pub fn h(&self) -> Double {
        self.h
    }

    pub fn objectives(&self) -> &[Double] {
        &self.objectives
    }

    pub fn is_phase_one(&self) -> bool {
        self.phase_one
    }

    pub fn bb_outputs(&self) -> &[Double] {
        &self.bb_outputs
    }

    pub fn output_types(&self) -> &BbOutputTypeList {
        &self.output_types
    }

    /// `true` iff `h` is defined and exactly zero (§3 Invariants).
    pub fn is_feasible(&self) -> bool {
        self.h.is_defined() && self.h == Double::ZERO
    }

    /// Replace the raw output vector (e.g. after the blackbox returns) and
    /// recompute `f`/`h` immediately, as required by §3 ("f/h are
    /// recomputed whenever either the output vector or the output-type list
    /// changes").
    pub fn set_bb_outputs(&mut self, outputs: Vec<Double>, phase_one: bool) {
        self.bb_outputs = outputs;
        self.phase_one = phase_one;
        self.recompute_fh();
    }

    /// Reinterpret the same raw outputs under a new output-type list (used
    /// when reading a cache file written under a different `BB_OUTPUT_TYPE`).
    pub fn set_output_types(&mut self, output_types: BbOutputTypeList) {
        self.output_types = output_types;
        self.recompute_fh();
    }

    /// Recompute `f` and `h` from `(bb_outputs, output_types)`. Always safe
    /// to call; a mismatched-length pair yields `Undefined` for both.
    pub fn recompute_fh(&mut self) {
        if self.bb_outputs.len() != self.output_types.len() || self.bb_outputs.is_empty() {
            self.f = Double::Undefined;
            self.h = Double::Undefined;
            self.objectives.clear();
            return;
        }

        self.objectives = self
            .bb_outputs
            .iter()
            .zip(self.output_types.iter())
            .filter(|(_, t)| **t == BbOutputType::Obj)
            .map(|(v, _)| *v)
            .collect();

        if self.phase_one {
            let mut sum = Double::ZERO;
            let mut any_eb = false;
            for (v, t) in self.bb_outputs.iter().zip(self.output_types.iter()) {
                if *t == BbOutputType::Eb {
                    any_eb = true;
                    if v.is_defined() {
                        let viol = Double::max(*v, Double::ZERO);
                        sum = sum + viol * viol;
                    } else {
                        sum = Double::Undefined;
                    }
                }
            }
            self.f = if any_eb { sum } else { Double::ZERO };
            self.h = Double::ZERO;
            return;
        }

        self.f = self.objectives.first().copied().unwrap_or(Double::Undefined);

        let mut any_eb_violated = false;
        let mut pb_sum = Double::ZERO;
        for (v, t) in self.bb_outputs.iter().zip(self.output_types.iter()) {
            match t {
                BbOutputType::Eb => {
                    if !v.is_defined() || matches!(v.partial_cmp(&Double::ZERO), None) {
                        any_eb_violated = true;
                    } else if *v > Double::ZERO {
                        any_eb_violated = true;
                    }
                }
                BbOutputType::Pb | BbOutputType::RPb => {
                    if v.is_defined() {
                        let viol = Double::max(*v, Double::ZERO);
                        pb_sum = pb_sum + viol * viol;
                    } else {
                        pb_sum = Double::Undefined;
                    }
                }
                BbOutputType::Obj | BbOutputType::Info => {}
            }
        }

        self.h = if any_eb_violated { Double::PosInf } else { pb_sum };
    }
}

/// A `Point` plus one [`Eval`] per evaluator tier. Cache entries and barrier
/// incumbents are both `EvalPoint`s (the barrier's are shared references
/// into the same cache entries, per §3 Ownership).
#[derive(Clone, Debug)]
pub struct EvalPoint {
    point: Point,
    evals: HashMap<EvalType, Eval>,
}

impl EvalPoint {
    pub fn new(point: Point) -> Self {
        EvalPoint { point, evals: HashMap::new() }
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    pub fn eval(&self, tier: EvalType) -> Option<&Eval> {
        self.evals.get(&tier)
    }

    pub fn eval_mut(&mut self, tier: EvalType) -> Option<&mut Eval> {
        self.evals.get_mut(&tier)
    }

    pub fn set_eval(&mut self, tier: EvalType, eval: Eval) {
        self.evals.insert(tier, eval);
    }

    /// `f` under the given tier, or `Undefined` if that tier was never evaluated.
    pub fn f(&self, tier: EvalType) -> Double {
        self.evals.get(&tier).map(Eval::f).unwrap_or(Double::Undefined)
    }

    /// `h` under the given tier, or `Undefined` if that tier was never evaluated.
    pub fn h(&self, tier: EvalType) -> Double {
        self.evals.get(&tier).map(Eval::h).unwrap_or(Double::Undefined)
    }

    pub fn is_feasible(&self, tier: EvalType) -> bool {
        self.evals.get(&tier).map(Eval::is_feasible).unwrap_or(false)
    }

    /// Display form used by the cache file body: point coordinates in
    /// parentheses followed by the blackbox-tier raw output vector (§6).
    pub fn display_line(&self) -> String {
        let coords: Vec<String> = self.point.as_slice().iter().map(|d| d.to_string()).collect();
        let outputs = self
            .evals
            .get(&EvalType::Blackbox)
            .map(|e| {
                e.bb_outputs()
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        format!("( {} ) {}", coords.join(" "), outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outs(v: &[f64]) -> Vec<Double> {
        v.iter().map(|&x| Double::Finite(x)).collect()
    }

    #[test]
    fn eb_violation_forces_infinite_h_regardless_of_pb() {
        let mut e = Eval::not_started(vec![BbOutputType::Obj, BbOutputType::Eb, BbOutputType::Pb]);
        e.set_bb_outputs(outs(&[1.0, 0.5, -3.0]), false);
        assert_eq!(e.h(), Double::PosInf);
        assert!(!e.is_feasible());
    }

    #[test]
    fn feasible_iff_h_zero() {
        let mut e = Eval::not_started(vec![BbOutputType::Obj, BbOutputType::Pb]);
        e.set_bb_outputs(outs(&[2.0, -1.0]), false);
        assert_eq!(e.h(), Double::ZERO);
        assert!(e.is_feasible());
        assert_eq!(e.f(), Double::Finite(2.0));
    }

    #[test]
    fn pb_violation_is_sum_of_squares() {
        let mut e = Eval::not_started(vec![BbOutputType::Obj, BbOutputType::Pb, BbOutputType::Pb]);
        e.set_bb_outputs(outs(&[0.0, 2.0, 3.0]), false);
        assert_eq!(e.h(), Double::Finite(4.0 + 9.0));
    }

    #[test]
    fn phase_one_substitutes_sum_of_squared_eb_violations() {
        let mut e = Eval::not_started(vec![BbOutputType::Obj, BbOutputType::Eb]);
        e.set_bb_outputs(outs(&[100.0, 2.0]), true);
        assert_eq!(e.f(), Double::Finite(4.0));
        assert_eq!(e.h(), Double::ZERO);
        assert!(e.is_phase_one());
    }

    #[test]
    fn mismatched_lengths_yield_undefined_fh() {
        let mut e = Eval::not_started(vec![BbOutputType::Obj]);
        e.set_bb_outputs(outs(&[1.0, 2.0]), false);
        assert!(!e.f().is_defined());
        assert!(!e.h().is_defined());
    }
}
