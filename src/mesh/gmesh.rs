//! `GMesh`: the MADS default mesh geometry.
//!
//! Frame size is represented per coordinate as `(mantissa ∈ {1,2,5}, exponent
//! ∈ ℤ)`; mesh size derives from the exponent and its deviation from the
//! coordinate's initial exponent. The exact arithmetic here is transliterated
//! from the reference `GMesh` (not re-derived), because the distilled
//! algorithmic description leaves rounding underspecified and small
//! deviations break the method's convergence guarantees (§4.1).

use super::{decompose_mantissa_exponent, larger_mant_exp, smaller_mant_exp, MeshGeometry};
use crate::arrays::Direction;
use crate::double::Double;
use crate::error::MeshError;
use crate::types::MeshStopReason;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GMesh {
    n: usize,
    frame_size_mant: Vec<i64>,
    frame_size_exp: Vec<i64>,
    init_frame_size_exp: Vec<i64>,
    /// `0.0` means "no forced granularity" for that coordinate.
    granularity: Vec<f64>,
    min_mesh_size: Vec<f64>,
    min_frame_size: Vec<Option<f64>>,
}

impl GMesh {
    /// Build a `GMesh` from per-coordinate initial frame sizes, minimum mesh
    /// sizes (mandatory, per §4.1's `init()`), optional minimum frame sizes,
    /// and granularities.
    pub fn new(
        initial_frame_size: &[f64],
        min_mesh_size: &[f64],
        min_frame_size: &[Option<f64>],
        granularity: &[f64],
    ) -> Result<Self, MeshError> {
        let n = initial_frame_size.len();
        if min_mesh_size.len() != n {
            return Err(MeshError::DimensionMismatch { expected: n, got: min_mesh_size.len() });
        }
        if min_frame_size.len() != n {
            return Err(MeshError::DimensionMismatch { expected: n, got: min_frame_size.len() });
        }
        if granularity.len() != n {
            return Err(MeshError::DimensionMismatch { expected: n, got: granularity.len() });
        }

        let mut frame_size_mant = Vec::with_capacity(n);
        let mut frame_size_exp = Vec::with_capacity(n);
        for i in 0..n {
            let d_min = if granularity[i] > 0.0 { granularity[i] } else { 1.0 };
            let (mant, exp) = decompose_mantissa_exponent(initial_frame_size[i], d_min)?;
            frame_size_mant.push(mant);
            frame_size_exp.push(exp);
        }
        let init_frame_size_exp = frame_size_exp.clone();

        Ok(GMesh {
            n,
            frame_size_mant,
            frame_size_exp,
            init_frame_size_exp,
            granularity: granularity.to_vec(),
            min_mesh_size: min_mesh_size.to_vec(),
            min_frame_size: min_frame_size.to_vec(),
        })
    }

    fn rho_raw(&self, i: usize) -> f64 {
        let diff = (self.frame_size_exp[i] - self.init_frame_size_exp[i]).abs();
        let pow_diff = 10f64.powi(diff as i32);
        if self.granularity[i] > 0.0 {
            self.frame_size_mant[i] as f64 * 10f64.powi(self.frame_size_exp[i] as i32).min(pow_diff)
        } else {
            self.frame_size_mant[i] as f64 * pow_diff
        }
    }

    fn delta_mesh_size_raw(&self, i: usize) -> f64 {
        let diff = (self.frame_size_exp[i] - self.init_frame_size_exp[i]).abs();
        let exp_eff = self.frame_size_exp[i] - diff;
        let mut delta = 10f64.powi(exp_eff as i32);
        if self.granularity[i] > 0.0 {
            delta = self.granularity[i] * delta.max(1.0);
        }
        delta
    }

    fn delta_frame_size_raw(&self, i: usize) -> f64 {
        let mut delta = self.frame_size_mant[i] as f64 * 10f64.powi(self.frame_size_exp[i] as i32);
        if self.granularity[i] > 0.0 {
            delta = (delta / self.granularity[i]).ceil() * self.granularity[i];
        }
        delta
    }
}

impl MeshGeometry for GMesh {
    fn n(&self) -> usize {
        self.n
    }

    fn delta_frame_size(&self, i: usize) -> Double {
        Double::Finite(self.delta_frame_size_raw(i))
    }

    fn delta_mesh_size(&self, i: usize) -> Double {
        Double::Finite(self.delta_mesh_size_raw(i))
    }

    fn rho(&self, i: usize) -> Double {
        Double::Finite(self.rho_raw(i))
    }

    fn granularity(&self, i: usize) -> Double {
        Double::Finite(self.granularity[i])
    }

    fn refine_delta_frame_size(&mut self) {
        for i in 0..self.n {
            let (new_mant, new_exp) = smaller_mant_exp(self.frame_size_mant[i], self.frame_size_exp[i]);
            let (new_mant, new_exp) = if self.granularity[i] > 0.0 && new_exp <= 0 && new_mant != 1 {
                (1, 0)
            } else {
                (new_mant, new_exp)
            };

            // Guard against the *current* (pre-refine) mesh size, not the
            // candidate one: the reference computes `olddeltaMeshSize` from
            // the unmodified `_frameSizeExp[i]` before writing the refined
            // mantissa/exponent back (GMesh.cpp:213-219). Using the candidate
            // here would make the guard permanently self-reinforcing once a
            // coordinate first reaches minMeshSize, freezing refinement.
            let old_delta_mesh_size = self.delta_mesh_size_raw(i);

            if self.min_mesh_size[i] <= old_delta_mesh_size {
                self.frame_size_mant[i] = new_mant;
                self.frame_size_exp[i] = new_exp;
            }
        }
    }

    fn enlarge_delta_frame_size(
        &mut self,
        direction: Option<&Direction>,
        anisotropy_factor: Double,
        anisotropic: bool,
    ) -> bool {
        let mut min_rho = f64::INFINITY;
        for i in 0..self.n {
            if self.granularity[i] == 0.0 {
                min_rho = min_rho.min(self.rho_raw(i));
            }
        }

        let mut one_changed = false;
        for i in 0..self.n {
            let anisotropy_drift = self.granularity[i] == 0.0
                && self.frame_size_exp[i] < self.init_frame_size_exp[i]
                && self.rho_raw(i) > min_rho * min_rho;

            // "Undefined direction falls through to the no-anisotropy path":
            // an undefined (or absent) direction component never satisfies
            // the `> anisotropy_factor` test, so the other two disjuncts decide
            // it (Open Questions decision, DESIGN.md).
            let dir_test = match (direction, anisotropy_factor) {
                (Some(d), Double::Finite(factor)) => {
                    let delta_i = self.delta_mesh_size_raw(i);
                    let rho_i = self.rho_raw(i);
                    match d[i] {
                        Double::Finite(v) if delta_i > 0.0 && rho_i > 0.0 => {
                            (v.abs() / delta_i / rho_i) > factor
                        }
                        _ => false,
                    }
                }
                _ => false,
            };

            if !anisotropic || dir_test || anisotropy_drift {
                let (new_mant, new_exp) = larger_mant_exp(self.frame_size_mant[i], self.frame_size_exp[i]);
                self.frame_size_mant[i] = new_mant;
                self.frame_size_exp[i] = new_exp;
                one_changed = true;
            }
        }
        one_changed
    }

    fn check_mesh_for_stopping(&self) -> Option<MeshStopReason> {
        let all_granular = (0..self.n).all(|i| self.granularity[i] > 0.0);
        if all_granular {
            // All variables are on a true lattice: mesh-size termination is
            // disabled, the search is bounded only by the evaluation budget.
            return None;
        }

        let some_non_granular_coarse_enough = (0..self.n).any(|i| {
            self.granularity[i] == 0.0 && self.delta_mesh_size_raw(i) >= self.min_mesh_size[i]
        });
        if !some_non_granular_coarse_enough {
            return Some(MeshStopReason::MinMeshSizeReached);
        }

        let some_frame_large_enough = (0..self.n).any(|i| match self.min_frame_size[i] {
            Some(mfs) => self.delta_frame_size_raw(i) >= mfs,
            None => true,
        });
        if self.min_frame_size.iter().any(Option::is_some) && !some_frame_large_enough {
            return Some(MeshStopReason::MinFrameSizeReached);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::Direction;
    use crate::double::Double;

    fn mesh2() -> GMesh {
        GMesh::new(&[1.0, 1.0], &[1e-9, 1e-9], &[None, None], &[0.0, 0.0]).unwrap()
    }

    #[test]
    fn refine_never_increases_delta_or_frame() {
        let mut m = mesh2();
        let old_delta: Vec<f64> = (0..2).map(|i| m.delta_mesh_size_raw(i)).collect();
        let old_frame: Vec<f64> = (0..2).map(|i| m.delta_frame_size_raw(i)).collect();
        m.refine_delta_frame_size();
        for i in 0..2 {
            assert!(m.delta_mesh_size_raw(i) <= old_delta[i] + 1e-15);
            assert!(m.delta_frame_size_raw(i) <= old_frame[i] + 1e-15);
        }
    }

    #[test]
    fn refine_then_enlarge_cycle_returns_to_initial_frame_size() {
        let mut m = mesh2();
        let initial_frame: Vec<f64> = (0..2).map(|i| m.delta_frame_size_raw(i)).collect();
        m.refine_delta_frame_size();
        let dir = Direction::new(vec![Double::Finite(10.0), Double::Finite(10.0)]);
        m.enlarge_delta_frame_size(Some(&dir), Double::Finite(0.0), true);
        for i in 0..2 {
            assert!((m.delta_frame_size_raw(i) - initial_frame[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn refine_keeps_shrinking_past_the_old_guard_until_min_mesh_size_is_reached() {
        // Regression: guarding refinement against the *candidate* mesh size
        // (instead of the current, pre-refine one) would refuse the one
        // refine step that finally drops below `minMeshSize`, freezing the
        // mesh one notch above it forever and making `MinMeshSizeReached`
        // unreachable.
        let mut m = GMesh::new(&[1.0], &[0.01], &[None], &[0.0]).unwrap();
        let mut reached = false;
        for _ in 0..50 {
            if m.check_mesh_for_stopping() == Some(MeshStopReason::MinMeshSizeReached) {
                reached = true;
                break;
            }
            m.refine_delta_frame_size();
        }
        assert!(reached, "refine should eventually drive the mesh size below minMeshSize, not freeze just above it");
    }

    #[test]
    fn granular_mesh_never_reaches_min_mesh_size_stop() {
        let m = GMesh::new(&[4.0], &[0.1], &[None], &[1.0]).unwrap();
        assert_ne!(m.check_mesh_for_stopping(), Some(MeshStopReason::MinMeshSizeReached));
        assert_eq!(m.check_mesh_for_stopping(), None);
    }

    #[test]
    fn scale_and_project_uses_rho_times_mesh_size() {
        let m = mesh2();
        let scaled = m.scale_and_project_on_mesh(0, Double::Finite(1.3));
        // rho == 1 initially (exp == init_exp), delta == 1.0, round(1*1.3)=1
        assert_eq!(scaled, Double::Finite(1.0));
    }
}
