//! `ProgressiveBarrier`: the constraint-handling structure that tracks the
//! current feasible and infeasible incumbents under a shrinking tolerance
//! `hMax` (§4.2). There is no C++ `Barrier` file in the retrieved source
//! pack; this module is grounded directly on the dominance and hMax-update
//! rules as specified, expressed in the crate's own `Eval`/`Double` vocabulary.

use crate::double::Double;
use crate::error::BarrierError;
use crate::eval::{EvalPoint, EvalType};
use crate::types::SuccessType;
use std::sync::Arc;
use tracing::{debug, warn};

/// One incumbent: a shared reference into the cache, so the barrier and the
/// cache never disagree about a point's evaluated state (§3 Ownership).
pub type Incumbent = Arc<EvalPoint>;

#[derive(Clone, Debug)]
pub struct ProgressiveBarrier {
    tier: EvalType,
    /// Ascending by `f`.
    feasible: Vec<Incumbent>,
    /// Ascending by `(h, f)`, all with `h <= hMax`.
    infeasible: Vec<Incumbent>,
    h_max: Double,
    phase_one: bool,
}

impl ProgressiveBarrier {
    pub fn new(tier: EvalType) -> Self {
        ProgressiveBarrier {
            tier,
            feasible: Vec::new(),
            infeasible: Vec::new(),
            h_max: Double::PosInf,
            phase_one: false,
        }
    }

    pub fn h_max(&self) -> Double {
        self.h_max
    }

    pub fn is_phase_one(&self) -> bool {
        self.phase_one
    }

    /// First (best) feasible incumbent, if any.
    pub fn current_incumbent_feas(&self) -> Option<&Incumbent> {
        self.feasible.first()
    }

    /// First (best) infeasible incumbent, if any.
    pub fn current_incumbent_inf(&self) -> Option<&Incumbent> {
        self.infeasible.first()
    }

    /// Primary frame center per the rho rule (§4.4): infeasible is primary
    /// when both exist, `rho >= 0`, and `f_feas - rho > f_inf`; otherwise the
    /// feasible incumbent is primary (falling back to infeasible alone).
    pub fn primary_frame_center(&self, rho: Double) -> Option<&Incumbent> {
        match (self.current_incumbent_feas(), self.current_incumbent_inf()) {
            (Some(feas), Some(inf)) => {
                let f_feas = feas.f(self.tier);
                let f_inf = inf.f(self.tier);
                let infeasible_is_primary = match rho {
                    Double::Finite(r) if r >= 0.0 => (f_feas - Double::Finite(r)) > f_inf,
                    _ => false,
                };
                Some(if infeasible_is_primary { inf } else { feas })
            }
            (Some(feas), None) => Some(feas),
            (None, Some(inf)) => Some(inf),
            (None, None) => None,
        }
    }

    /// Secondary frame center: whichever of {feasible, infeasible} was not
    /// chosen as primary, if it exists.
    pub fn secondary_frame_center(&self, rho: Double) -> Option<&Incumbent> {
        let primary = self.primary_frame_center(rho)?;
        match (self.current_incumbent_feas(), self.current_incumbent_inf()) {
            (Some(feas), Some(inf)) => {
                if Arc::ptr_eq(primary, feas) {
                    Some(inf)
                } else {
                    Some(feas)
                }
            }
            _ => None,
        }
    }

    /// Classify `candidate` against `reference` (§4.2 Dominance).
    pub fn compute_success_type(&self, candidate: &EvalPoint, reference: Option<&EvalPoint>) -> SuccessType {
        let tier = self.tier;
        let Some(reference) = reference else {
            return if candidate.is_feasible(tier) || candidate.h(tier).is_defined() {
                SuccessType::FullSuccess
            } else {
                SuccessType::Unsuccessful
            };
        };

        let cand_feas = candidate.is_feasible(tier);
        let ref_feas = reference.is_feasible(tier);

        if cand_feas && ref_feas {
            return match candidate.f(tier).partial_cmp(&reference.f(tier)) {
                Some(std::cmp::Ordering::Less) => SuccessType::FullSuccess,
                _ => SuccessType::Unsuccessful,
            };
        }

        if cand_feas && !ref_feas {
            return SuccessType::FullSuccess;
        }
        if !cand_feas && ref_feas {
            return SuccessType::Unsuccessful;
        }

        // Both infeasible: componentwise dominance in (f, h).
        let (ch, cf) = (candidate.h(tier), candidate.f(tier));
        let (rh, rf) = (reference.h(tier), reference.f(tier));
        if !ch.is_defined() || !cf.is_defined() || !rh.is_defined() || !rf.is_defined() {
            return SuccessType::Unsuccessful;
        }

        let h_better = ch < rh;
        let h_worse = ch > rh;
        let f_better = cf < rf;
        let f_worse = cf > rf;

        if (h_better || h_worse) && (f_better || f_worse) {
            // Both components moved: full success only if neither got worse.
            if !h_worse && !f_worse {
                SuccessType::FullSuccess
            } else if !h_worse || !f_worse {
                SuccessType::PartialSuccess
            } else {
                SuccessType::Unsuccessful
            }
        } else if h_better || f_better {
            // Exactly one component moved, and it improved.
            SuccessType::PartialSuccess
        } else {
            SuccessType::Unsuccessful
        }
    }

    /// Ingest a batch of freshly evaluated points, promoting incumbents and
    /// recomputing `hMax` (§4.2).
    pub fn update_with_points(&mut self, points: &[Incumbent]) -> Result<(), BarrierError> {
        for p in points {
            if !p.point().is_complete() {
                continue;
            }
            if self.phase_one {
                let f = p.f(self.tier);
                if let Double::Finite(v) = f {
                    if v <= 0.0 {
                        debug!("phase-one objective reached zero; leaving phase one");
                        self.phase_one = false;
                    }
                }
            }
            if p.is_feasible(self.tier) {
                self.insert_feasible(Arc::clone(p));
            } else {
                let h = p.h(self.tier);
                if h.is_defined() && h <= self.h_max {
                    self.insert_infeasible(Arc::clone(p));
                }
            }
        }

        self.feasible
            .sort_by(|a, b| cmp_double(a.f(self.tier), b.f(self.tier)));
        self.infeasible.sort_by(|a, b| {
            cmp_double(a.h(self.tier), b.h(self.tier)).then_with(|| cmp_double(a.f(self.tier), b.f(self.tier)))
        });

        let old_h_max = self.h_max;
        self.h_max = self
            .infeasible
            .last()
            .map(|p| p.h(self.tier))
            .unwrap_or(Double::PosInf);
        self.infeasible.retain(|p| {
            let h = p.h(self.tier);
            h.is_defined() && h <= self.h_max
        });

        if let (Double::Finite(old), Double::Finite(new)) = (old_h_max, self.h_max) {
            if new > old {
                return Err(BarrierError::HMaxIncreased { old: old.to_string(), new: new.to_string() });
            }
        }
        Ok(())
    }

    fn insert_feasible(&mut self, p: Incumbent) {
        if !self.feasible.iter().any(|e| Arc::ptr_eq(e, &p)) {
            self.feasible.push(p);
        }
    }

    fn insert_infeasible(&mut self, p: Incumbent) {
        if !self.infeasible.iter().any(|e| Arc::ptr_eq(e, &p)) {
            self.infeasible.push(p);
        }
    }

    /// Seed phase one when the starting point has an extreme-barrier
    /// violation (`h = +INF`); the barrier substitutes a squared-violation
    /// surrogate objective until that clears (§4.2 PhaseOne).
    pub fn enter_phase_one_if_needed(&mut self, initial: &EvalPoint) {
        if initial.h(self.tier) == Double::PosInf {
            warn!("initial point violates an extreme barrier constraint; entering phase one");
            self.phase_one = true;
        }
    }
}

fn cmp_double(a: Double, b: Double) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::Point;
    use crate::eval::Eval;
    use crate::types::BbOutputType;

    fn point_with_fh(coords: &[f64], f: f64, h: f64) -> Incumbent {
        let mut ep = EvalPoint::new(Point::from_f64(coords));
        let mut ev = Eval::not_started(vec![BbOutputType::Obj, BbOutputType::Pb]);
        let pb_violation = if h > 0.0 { h.sqrt() } else { -1.0 };
        ev.set_bb_outputs(vec![Double::Finite(f), Double::Finite(pb_violation)], false);
        ep.set_eval(EvalType::Blackbox, ev);
        Arc::new(ep)
    }

    #[test]
    fn feasible_incumbent_beats_infeasible_in_success_type() {
        let b = ProgressiveBarrier::new(EvalType::Blackbox);
        let feasible = point_with_fh(&[0.0], 1.0, 0.0);
        let infeasible = point_with_fh(&[1.0], 0.5, 4.0);
        assert_eq!(b.compute_success_type(&feasible, Some(&infeasible)), SuccessType::FullSuccess);
        assert_eq!(b.compute_success_type(&infeasible, Some(&feasible)), SuccessType::Unsuccessful);
    }

    #[test]
    fn smaller_f_among_feasible_is_full_success() {
        let b = ProgressiveBarrier::new(EvalType::Blackbox);
        let better = point_with_fh(&[0.0], 1.0, 0.0);
        let worse = point_with_fh(&[1.0], 2.0, 0.0);
        assert_eq!(b.compute_success_type(&better, Some(&worse)), SuccessType::FullSuccess);
        assert_eq!(b.compute_success_type(&worse, Some(&better)), SuccessType::Unsuccessful);
    }

    #[test]
    fn h_max_never_increases_after_update() {
        let mut b = ProgressiveBarrier::new(EvalType::Blackbox);
        let p1 = point_with_fh(&[0.0], 1.0, 4.0);
        b.update_with_points(&[p1]).unwrap();
        let first_h_max = b.h_max();
        let p2 = point_with_fh(&[1.0], 0.5, 1.0);
        b.update_with_points(&[p2]).unwrap();
        assert!(b.h_max() <= first_h_max);
    }

    #[test]
    fn phase_one_engages_on_eb_violation_and_clears_on_zero_objective() {
        let mut b = ProgressiveBarrier::new(EvalType::Blackbox);
        let mut ep = EvalPoint::new(Point::from_f64(&[0.0]));
        let mut ev = Eval::not_started(vec![BbOutputType::Obj, BbOutputType::Eb]);
        ev.set_bb_outputs(vec![Double::Finite(10.0), Double::Finite(3.0)], false);
        ep.set_eval(EvalType::Blackbox, ev);
        b.enter_phase_one_if_needed(&ep);
        assert!(b.is_phase_one());

        let mut ev2 = Eval::not_started(vec![BbOutputType::Obj, BbOutputType::Eb]);
        ev2.set_bb_outputs(vec![Double::Finite(10.0), Double::Finite(0.0)], true);
        let mut ep2 = EvalPoint::new(Point::from_f64(&[0.1]));
        ep2.set_eval(EvalType::Blackbox, ev2);
        b.update_with_points(&[Arc::new(ep2)]).unwrap();
        assert!(!b.is_phase_one());
    }
}
