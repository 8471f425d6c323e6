//! Poll direction generation (§4.3): every generator produces a list of
//! unit-norm directions on ℝⁿ; the caller scales each by
//! [`crate::mesh::MeshGeometry::scale_and_project_on_mesh`] and adds it to
//! the frame center.

pub mod householder;

use crate::arrays::Direction;
use crate::double::Double;
use crate::types::DirectionType;
use rand::Rng;

/// Unit-norm sampling and the finite families exposed as poll directions.
pub trait DirectionGenerator {
    /// Generate this family's first-pass directions for dimension `n`.
    fn generate(&self, n: usize, rng: &mut impl Rng) -> Vec<Direction>;
}

/// Sample a direction uniformly on the unit `(n-1)`-sphere via Marsaglia's
/// method: draw i.i.d. standard normal coordinates and renormalize. Retries
/// (rather than aborting, unlike the reference) on the zero-norm edge case,
/// which has probability zero but is not impossible in floating point.
pub fn dir_on_unit_sphere(n: usize, rng: &mut impl Rng) -> Direction {
    use rand_distr::{Distribution, StandardNormal};
    for _attempt in 0..8 {
        let raw: Vec<f64> = (0..n).map(|_| StandardNormal.sample(rng)).collect();
        let norm = raw.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            let values = raw.iter().map(|&v| Double::Finite(v / norm)).collect();
            return Direction::new(values);
        }
    }
    tracing::warn!(n, "dirOnUnitSphere: degenerate (all-zero) sample after 8 retries; falling back to e_0");
    let mut values = vec![Double::ZERO; n];
    if n > 0 {
        values[0] = Double::Finite(1.0);
    }
    Direction::new(values)
}

/// Generate the named family's first-pass unit directions.
pub fn generate_unit_poll_directions(kind: DirectionType, n: usize, rng: &mut impl Rng) -> Vec<Direction> {
    match kind {
        DirectionType::Ortho2N => householder::ortho_2n(n, rng),
        DirectionType::Qr2N => householder::qr_2n(n, rng),
        DirectionType::NPlus1Uni => householder::n_plus_1_uni(n, rng),
        DirectionType::NPlus1NegQuad => householder::ortho_2n(n, rng),
        DirectionType::Single => vec![dir_on_unit_sphere(n, rng)],
        DirectionType::DoubleDir => {
            let d = dir_on_unit_sphere(n, rng);
            let neg = d.negate();
            vec![d, neg]
        }
        DirectionType::Coordinate => coordinate_directions(n),
    }
}

/// `±e_i` for each coordinate (Coordinate Search's poll set).
fn coordinate_directions(n: usize) -> Vec<Direction> {
    let mut out = Vec::with_capacity(2 * n);
    for i in 0..n {
        let mut plus = vec![Double::ZERO; n];
        plus[i] = Double::Finite(1.0);
        let mut minus = vec![Double::ZERO; n];
        minus[i] = Double::Finite(-1.0);
        out.push(Direction::new(plus));
        out.push(Direction::new(minus));
    }
    out
}

/// Second-pass direction for the `N+1 neg/quad` family: when the first `n`
/// directions of a reduced Ortho-2N basis fail to make progress, add one
/// final direction. The `NEG` variant (implemented here) is the negative sum
/// of the generating directions; the `QUAD` variant (a step toward the
/// optimum of a local quadratic surrogate) is left to the caller building
/// that surrogate, since it needs evaluated `f` values this module doesn't see.
pub fn second_pass_negative_sum(generating: &[Direction]) -> Direction {
    let n = generating.first().map(Direction::len).unwrap_or(0);
    generating
        .iter()
        .fold(Direction::zeros(n), |acc, d| acc + d.clone())
        .negate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::NormType;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn sampled_direction_is_unit_norm() {
        let mut rng = StdRng::seed_from_u64(7);
        let d = dir_on_unit_sphere(5, &mut rng);
        match d.norm(NormType::L2) {
            Double::Finite(v) => assert!((v - 1.0).abs() < 1e-9),
            _ => panic!("expected finite norm"),
        }
    }

    #[test]
    fn coordinate_directions_cover_every_axis_both_signs() {
        let dirs = coordinate_directions(3);
        assert_eq!(dirs.len(), 6);
        assert_eq!(dirs[0][0], Double::Finite(1.0));
        assert_eq!(dirs[1][0], Double::Finite(-1.0));
    }

    #[test]
    fn second_pass_negative_sum_is_negation_of_total() {
        let a = Direction::new(vec![Double::Finite(1.0), Double::Finite(0.0)]);
        let b = Direction::new(vec![Double::Finite(0.0), Double::Finite(1.0)]);
        let neg = second_pass_negative_sum(&[a, b]);
        assert_eq!(neg[0], Double::Finite(-1.0));
        assert_eq!(neg[1], Double::Finite(-1.0));
    }
}
