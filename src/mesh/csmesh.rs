//! `CsMesh`: the Coordinate Search mesh geometry.
//!
//! Isotropic: a single `(mantissa, exponent)` pair drives every coordinate's
//! frame size, with `δ = Δ/2` and `ρ = 2` fixed by construction (§4.1). Per
//! Open Questions decision (DESIGN.md), the initial frame size is computed
//! via the same [`super::decompose_mantissa_exponent`] helper `GMesh` uses
//! rather than transliterating the source's `pow(div * pow(10,-exp), exp)`
//! expression, which is numerically unstable for negative exponents.

use super::{decompose_mantissa_exponent, larger_mant_exp, smaller_mant_exp, MeshGeometry};
use crate::arrays::Direction;
use crate::double::Double;
use crate::error::MeshError;
use crate::types::MeshStopReason;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsMesh {
    n: usize,
    frame_size_mant: i64,
    frame_size_exp: i64,
    granularity: Vec<f64>,
    min_mesh_size: f64,
}

impl CsMesh {
    pub fn new(n: usize, initial_frame_size: f64, min_mesh_size: f64, granularity: &[f64]) -> Result<Self, MeshError> {
        if granularity.len() != n {
            return Err(MeshError::DimensionMismatch { expected: n, got: granularity.len() });
        }
        let d_min = granularity.iter().cloned().fold(0.0f64, f64::max).max(1.0);
        let (mant, exp) = decompose_mantissa_exponent(initial_frame_size, if d_min > 0.0 { d_min } else { 1.0 })?;
        Ok(CsMesh {
            n,
            frame_size_mant: mant,
            frame_size_exp: exp,
            granularity: granularity.to_vec(),
            min_mesh_size,
        })
    }

    fn delta_frame_size_raw(&self) -> f64 {
        self.frame_size_mant as f64 * 10f64.powi(self.frame_size_exp as i32)
    }

    fn delta_mesh_size_raw(&self) -> f64 {
        self.delta_frame_size_raw() / 2.0
    }
}

impl MeshGeometry for CsMesh {
    fn n(&self) -> usize {
        self.n
    }

    fn delta_frame_size(&self, _i: usize) -> Double {
        Double::Finite(self.delta_frame_size_raw())
    }

    fn delta_mesh_size(&self, _i: usize) -> Double {
        Double::Finite(self.delta_mesh_size_raw())
    }

    fn rho(&self, _i: usize) -> Double {
        Double::Finite(2.0)
    }

    fn granularity(&self, i: usize) -> Double {
        Double::Finite(self.granularity[i])
    }

    fn refine_delta_frame_size(&mut self) {
        let (new_mant, new_exp) = smaller_mant_exp(self.frame_size_mant, self.frame_size_exp);
        // Guard against the *current* (pre-refine) mesh size, matching
        // CSMesh.cpp:179-184's `olddeltaMeshSize` computed from the
        // unmodified `_frameSize[i]` before the refined value is written
        // back; guarding on the candidate would freeze refinement the first
        // time a coordinate reaches minMeshSize.
        let old_delta_mesh_size = self.delta_mesh_size_raw();
        if self.min_mesh_size <= old_delta_mesh_size {
            self.frame_size_mant = new_mant;
            self.frame_size_exp = new_exp;
        }
    }

    fn enlarge_delta_frame_size(
        &mut self,
        _direction: Option<&Direction>,
        _anisotropy_factor: Double,
        _anisotropic: bool,
    ) -> bool {
        // Coordinate Search has no anisotropy axis to protect: every
        // successful iteration enlarges the single shared frame size.
        let (new_mant, new_exp) = larger_mant_exp(self.frame_size_mant, self.frame_size_exp);
        self.frame_size_mant = new_mant;
        self.frame_size_exp = new_exp;
        true
    }

    fn check_mesh_for_stopping(&self) -> Option<MeshStopReason> {
        let all_granular = self.granularity.iter().all(|&g| g > 0.0);
        if all_granular {
            return None;
        }
        if self.delta_mesh_size_raw() < self.min_mesh_size {
            Some(MeshStopReason::MinMeshSizeReached)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_mesh_size_is_half_frame_size() {
        let m = CsMesh::new(2, 4.0, 1e-9, &[0.0, 0.0]).unwrap();
        let frame = m.delta_frame_size(0);
        let mesh = m.delta_mesh_size(0);
        assert_eq!(frame, mesh * Double::Finite(2.0));
    }

    #[test]
    fn refine_halves_and_enlarge_doubles_back() {
        let mut m = CsMesh::new(1, 4.0, 1e-9, &[0.0]).unwrap();
        let before = m.delta_frame_size_raw();
        m.refine_delta_frame_size();
        assert!(m.delta_frame_size_raw() < before);
        m.enlarge_delta_frame_size(None, Double::ZERO, false);
        assert!((m.delta_frame_size_raw() - before).abs() < 1e-9);
    }

    #[test]
    fn refine_keeps_shrinking_past_the_old_guard_until_min_mesh_size_is_reached() {
        // Regression: same guard-on-the-candidate bug as GMesh (see its
        // analogous test) would freeze CsMesh's single shared frame size one
        // notch above `minMeshSize` forever.
        let mut m = CsMesh::new(1, 1.0, 0.01, &[0.0]).unwrap();
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
    fn all_granular_disables_mesh_size_stop() {
        let m = CsMesh::new(1, 4.0, 1e9, &[1.0]).unwrap();
        assert_eq!(m.check_mesh_for_stopping(), None);
    }

    #[test]
    fn rho_is_constant_two() {
        let m = CsMesh::new(1, 4.0, 1e-9, &[0.0]).unwrap();
        assert_eq!(m.rho(0), Double::Finite(2.0));
    }
}
