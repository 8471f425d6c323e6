//! Householder-reflection-based direction families: `Ortho 2N`, `QR 2N`, and
//! `N+1 Uni`. Grounded directly on `Math/Direction.cpp`'s `householder` and
//! on `Ortho2NPollMethod.cpp` / `QR2NPollMethod.cpp` / `OrthoNPlus1PollMethod.cpp`.

use super::dir_on_unit_sphere;
use crate::arrays::Direction;
use crate::double::Double;
use rand::Rng;

/// Reflect a unit direction `dir` into `n` Householder directions
/// `H_i = norm2·e_i − 2·dir_i·dir` (not itself unit-norm, but norm `norm2`,
/// which is `1` when `dir` is unit). When `complete_to_2n`, also returns the
/// `n` negations, interleaved as `[H_0, -H_0, H_1, -H_1, ...]` to match the
/// reference's `D_k` ordering.
pub fn householder(dir: &Direction, complete_to_2n: bool) -> Vec<Direction> {
    let n = dir.len();
    let norm2 = match dir.squared_l2_norm() {
        Double::Finite(v) => v,
        _ => return Vec::new(),
    };

    let mut out = Vec::with_capacity(if complete_to_2n { 2 * n } else { n });
    for i in 0..n {
        let dir_i = dir[i].to_f64().unwrap_or(0.0);
        let h2i = 2.0 * dir_i;
        let mut row = Vec::with_capacity(n);
        for j in 0..n {
            let dir_j = dir[j].to_f64().unwrap_or(0.0);
            let v = if i == j { norm2 - h2i * dir_j } else { -h2i * dir_j };
            row.push(Double::Finite(v));
        }
        let h_i = Direction::new(row);
        if complete_to_2n {
            out.push(h_i.clone());
            out.push(h_i.negate());
        } else {
            out.push(h_i);
        }
    }
    out
}

/// Ortho-MADS 2N: one sampled unit direction, Householder-reflected into `n`
/// orthonormal-up-to-scale basis vectors, each paired with its negation.
pub fn ortho_2n(n: usize, rng: &mut impl Rng) -> Vec<Direction> {
    let dir_unit = dir_on_unit_sphere(n, rng);
    householder(&dir_unit, true)
}

/// QR-MADS 2N: sample a unit direction with a nonzero first coordinate, form
/// `M = [v | I_{n×(n-1)}]`, QR-factor it (modified Gram-Schmidt), and emit the
/// `Q` columns with their negations, interleaved.
pub fn qr_2n(n: usize, rng: &mut impl Rng) -> Vec<Direction> {
    if n == 0 {
        return Vec::new();
    }
    let mut dir_unit = dir_on_unit_sphere(n, rng);
    let mut attempts = 0;
    while dir_unit[0] == Double::ZERO && attempts < 8 {
        dir_unit = dir_on_unit_sphere(n, rng);
        attempts += 1;
    }

    // Column-major M: M[j] is column j, an n-vector.
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(n);
    let v0: Vec<f64> = (0..n).map(|i| dir_unit[i].to_f64().unwrap_or(0.0)).collect();
    columns.push(v0);
    for j in 1..n {
        let mut col = vec![0.0; n];
        col[j] = 1.0;
        columns.push(col);
    }

    let q_columns = modified_gram_schmidt(&columns);

    let mut out = Vec::with_capacity(2 * n);
    for q in &q_columns {
        let d = Direction::new(q.iter().map(|&v| Double::Finite(v)).collect());
        out.push(d.clone());
        out.push(d.negate());
    }
    out
}

/// Modified Gram-Schmidt orthonormalization of a set of column vectors.
/// Falls back to the unmodified column (normalized if possible, otherwise an
/// axis vector) if a column collapses onto the span of its predecessors —
/// this happens with probability zero for a sampled direction but is not
/// something to let panic.
fn modified_gram_schmidt(columns: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = columns.len();
    let mut q: Vec<Vec<f64>> = Vec::with_capacity(n);
    for (idx, col) in columns.iter().enumerate() {
        let mut v = col.clone();
        for prev in &q {
            let dot: f64 = v.iter().zip(prev.iter()).map(|(a, b)| a * b).sum();
            for k in 0..v.len() {
                v[k] -= dot * prev[k];
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 1e-12 {
            for x in v.iter_mut() {
                *x /= norm;
            }
            q.push(v);
        } else {
            tracing::warn!(column = idx, "QR2N: Gram-Schmidt column collapsed; substituting axis vector");
            let mut axis = vec![0.0; col.len()];
            axis[idx.min(axis.len().saturating_sub(1))] = 1.0;
            q.push(axis);
        }
    }
    q
}

/// `N+1 Uni`: build an Ortho-2N basis, keep its first `n` (non-negated)
/// directions `H`, emit `d_0 = -(1/√n) Σ H_i`, then `d_i = (H_i - d_0·β)/√n`
/// with `β = (√(n+1) - 1)/√n`.
pub fn n_plus_1_uni(n: usize, rng: &mut impl Rng) -> Vec<Direction> {
    if n == 0 {
        return Vec::new();
    }
    let dir_unit = dir_on_unit_sphere(n, rng);
    let h = householder(&dir_unit, false);

    let sqrt_n = (n as f64).sqrt();
    let beta = ((n as f64 + 1.0).sqrt() - 1.0) / sqrt_n;

    let sum = h.iter().cloned().fold(Direction::zeros(n), |acc, d| acc + d);
    let d0 = sum.scale(Double::Finite(-1.0 / sqrt_n));

    let mut out = Vec::with_capacity(n + 1);
    out.push(d0.clone());
    for h_i in &h {
        let scaled_d0 = d0.scale(Double::Finite(beta));
        let diff = h_i.clone() - scaled_d0;
        out.push(diff.scale(Double::Finite(1.0 / sqrt_n)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::NormType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn householder_directions_pair_with_their_negation() {
        let mut rng = StdRng::seed_from_u64(1);
        let dir = dir_on_unit_sphere(4, &mut rng);
        let hs = householder(&dir, true);
        assert_eq!(hs.len(), 8);
        for pair in hs.chunks(2) {
            for i in 0..4 {
                assert_eq!(pair[0][i], -pair[1][i]);
            }
        }
    }

    #[test]
    fn ortho_2n_has_2n_directions_of_unit_like_norm() {
        let mut rng = StdRng::seed_from_u64(2);
        let dirs = ortho_2n(3, &mut rng);
        assert_eq!(dirs.len(), 6);
        for d in &dirs {
            if let Double::Finite(v) = d.norm(NormType::L2) {
                assert!((v - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn qr_2n_columns_are_pairwise_orthonormal() {
        let mut rng = StdRng::seed_from_u64(3);
        let dirs = qr_2n(3, &mut rng);
        assert_eq!(dirs.len(), 6);
        let d0 = &dirs[0];
        let d2 = &dirs[2];
        let dot = Direction::dot_product(d0, d2);
        if let Double::Finite(v) = dot {
            assert!(v.abs() < 1e-6);
        }
    }

    #[test]
    fn n_plus_1_uni_produces_n_plus_1_directions() {
        let mut rng = StdRng::seed_from_u64(4);
        let dirs = n_plus_1_uni(3, &mut rng);
        assert_eq!(dirs.len(), 4);
    }
}
