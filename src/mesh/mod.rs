//! Mesh / frame geometry: the discretization of the search space.
//!
//! Two concrete geometries — [`gmesh::GMesh`] (the MADS default, anisotropic,
//! `(mantissa, exponent)`-encoded frame size) and [`csmesh::CsMesh`]
//! (Coordinate Search, a single isotropic frame size) — both implement
//! [`MeshGeometry`], the small set of pure contracts every poll/evaluator
//! component is written against (§4.1). Adding a third geometry means adding
//! a variant and an impl, never touching the two that exist.

pub mod csmesh;
pub mod gmesh;

use crate::arrays::{Direction, Point};
use crate::double::Double;
use crate::error::MeshError;
use crate::types::MeshStopReason;

pub use csmesh::CsMesh;
pub use gmesh::GMesh;

/// The pure contracts every mesh geometry exposes (§4.1).
pub trait MeshGeometry {
    /// Number of coordinates.
    fn n(&self) -> usize;

    /// `Δ_i`: current frame size (poll radius) for coordinate `i`.
    fn delta_frame_size(&self, i: usize) -> Double;

    /// `δ_i`: current mesh size (lattice spacing) for coordinate `i`.
    fn delta_mesh_size(&self, i: usize) -> Double;

    /// `ρ_i = Δ_i / δ_i`.
    fn rho(&self, i: usize) -> Double;

    /// Per-coordinate granularity (`0` means "none").
    fn granularity(&self, i: usize) -> Double;

    /// Scale a unit-norm direction component onto the mesh:
    /// `round(ρ_i · ℓ) · δ_i`.
    fn scale_and_project_on_mesh(&self, i: usize, l: Double) -> Double {
        let rounded = match l {
            Double::Finite(v) => {
                let scaled = match self.rho(i) {
                    Double::Finite(rho) => rho * v,
                    _ => return Double::Undefined,
                };
                Double::Finite(scaled.round())
            }
            _ => return Double::Undefined,
        };
        rounded * self.delta_mesh_size(i)
    }

    /// Snap `x` onto the lattice centered on `center`, coordinate by
    /// coordinate, with a bounded retry (≤ 10 attempts) against
    /// floating-point edge cases (§4.1, §8 Invariant 2). On persistent
    /// failure for a coordinate, the original value is kept and a warning
    /// is logged — this never aborts.
    fn project_on_mesh(&self, x: &Point, center: &Point) -> Point {
        assert_eq!(x.len(), self.n());
        assert_eq!(center.len(), self.n());
        let mut out = Vec::with_capacity(self.n());
        for i in 0..self.n() {
            out.push(project_coordinate(x[i], center[i], self.delta_mesh_size(i), i));
        }
        Point::new(out)
    }

    /// Shrink `Δ`/`δ` after an unsuccessful iteration. Guaranteed
    /// non-increasing per coordinate (§8 Invariant 3).
    fn refine_delta_frame_size(&mut self);

    /// Grow `Δ`/`δ` after a successful iteration, gated by anisotropy.
    /// Returns `true` if any coordinate's frame size actually changed.
    fn enlarge_delta_frame_size(
        &mut self,
        direction: Option<&Direction>,
        anisotropy_factor: Double,
        anisotropic: bool,
    ) -> bool;

    /// Which, if any, stopping condition the mesh has reached (§4.1 "Stopping").
    fn check_mesh_for_stopping(&self) -> Option<MeshStopReason>;
}

/// Snap one coordinate of `x` onto the lattice of spacing `delta` centered on `center`.
fn project_coordinate(x: Double, center: Double, delta: Double, coord_index: usize) -> Double {
    let (Double::Finite(xv), Double::Finite(cv), Double::Finite(dv)) = (x, center, delta) else {
        return x;
    };
    if dv <= 0.0 {
        return x;
    }
    let offset = xv - cv;
    for _attempt in 0..10 {
        let snapped_offset = (offset / dv).round() * dv;
        let candidate = cv + snapped_offset;
        let residual = (candidate - cv) / dv;
        if (residual - residual.round()).abs() <= 1e-9 {
            return Double::Finite(candidate);
        }
    }
    tracing::warn!(
        coord_index,
        x = xv,
        center = cv,
        delta = dv,
        "projectOnMesh: coordinate not a multiple of delta after 10 retries; keeping original value"
    );
    x
}

/// Decompose `value / d_min` into `(mantissa in {1,2,5}, exponent)` such that
/// `mantissa * 10^exponent` approximates `value / d_min`. Shared by `GMesh`'s
/// `initFrameSizeGranular` and, per the Open Questions decision recorded in
/// DESIGN.md, by `CsMesh`'s initial isotropic frame-size computation —
/// replacing the source's numerically dubious `pow(div * pow(10,-exp), exp)`
/// expression with this explicit, auditable decomposition.
pub(crate) fn decompose_mantissa_exponent(value: f64, d_min: f64) -> Result<(i64, i64), MeshError> {
    if d_min <= 0.0 {
        return Err(MeshError::IncompleteInitialFrameSize { n: 0 });
    }
    let div = value / d_min;
    let exponent = div.abs().log10().trunc() as i64;
    let mant_raw = div * 10f64.powi(-(exponent as i32));
    let mantissa = round_to_125(mant_raw);
    Ok((mantissa, exponent))
}

/// Round a value to the nearest of `{1, 2, 5}` using the source's thresholds.
pub(crate) fn round_to_125(mant: f64) -> i64 {
    if mant < 1.5 {
        1
    } else if mant < 3.5 {
        2
    } else {
        5
    }
}

/// Mantissa walk used by `refineDeltaFrameSize`: `1 -> 5` (decrement
/// exponent), `2 -> 1`, `5 -> 2` (exponent unchanged in the last two cases).
pub(crate) fn smaller_mant_exp(mant: i64, exp: i64) -> (i64, i64) {
    match mant {
        1 => (5, exp - 1),
        2 => (1, exp),
        5 => (2, exp),
        _ => (mant, exp),
    }
}

/// Mantissa walk used by `enlargeDeltaFrameSize`: the inverse cycle,
/// `1 -> 2`, `2 -> 5`, `5 -> 1` (increment exponent).
pub(crate) fn larger_mant_exp(mant: i64, exp: i64) -> (i64, i64) {
    match mant {
        1 => (2, exp),
        2 => (5, exp),
        5 => (1, exp + 1),
        _ => (mant, exp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mantissa_cycles_are_mutual_inverses() {
        for &(m, e) in &[(1i64, 0i64), (2, 0), (5, 0)] {
            let (m2, e2) = larger_mant_exp(m, e);
            let (m3, e3) = smaller_mant_exp(m2, e2);
            assert_eq!((m3, e3), (m, e));
        }
    }

    #[test]
    fn decompose_matches_round_trip_order_of_magnitude() {
        let (mant, exp) = decompose_mantissa_exponent(1.0, 1.0).unwrap();
        let reconstructed = mant as f64 * 10f64.powi(exp as i32);
        assert!((reconstructed - 1.0).abs() / 1.0 < 0.6);
    }
}
