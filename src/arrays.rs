//! `ArrayOfDouble`, `Point`, and `Direction`: fixed-length sequences of
//! [`Double`] with position semantics (`Point`) or vector semantics
//! (`Direction`).

use crate::double::Double;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Index, IndexMut, Sub};

/// Vector norm family used throughout the mesh/cache/direction contracts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NormType {
    L1,
    L2,
    LInf,
}

/// A fixed-length ordered sequence of [`Double`]. The common storage behind
/// [`Point`] and [`Direction`]; those two newtypes carry the semantic
/// distinction (position vs. vector) that the rest of the crate relies on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayOfDouble {
    values: Vec<Double>,
}

impl ArrayOfDouble {
    pub fn new(values: Vec<Double>) -> Self {
        ArrayOfDouble { values }
    }

    pub fn undefined(n: usize) -> Self {
        ArrayOfDouble { values: vec![Double::Undefined; n] }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[Double] {
        &self.values
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Double::is_defined)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Double> {
        self.values.iter()
    }
}

impl Index<usize> for ArrayOfDouble {
    type Output = Double;
    fn index(&self, i: usize) -> &Double {
        &self.values[i]
    }
}

impl IndexMut<usize> for ArrayOfDouble {
    fn index_mut(&mut self, i: usize) -> &mut Double {
        &mut self.values[i]
    }
}

/// A position in the variable space. Equality is coordinate-wise on all
/// `Double`s (two points are equal only if every coordinate is defined and
/// equal — consistent with `Double`'s refusal to treat `Undefined == Undefined`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point(ArrayOfDouble);

impl Point {
    pub fn new(values: Vec<Double>) -> Self {
        Point(ArrayOfDouble::new(values))
    }

    pub fn from_f64(values: &[f64]) -> Self {
        Point(ArrayOfDouble::new(values.iter().map(|&v| Double::Finite(v)).collect()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.0.is_complete()
    }

    pub fn as_slice(&self) -> &[Double] {
        self.0.as_slice()
    }

    /// Coordinate-wise addition of a [`Direction`], producing a new `Point`.
    pub fn plus_direction(&self, dir: &Direction) -> Point {
        assert_eq!(self.len(), dir.len(), "Point + Direction: dimension mismatch");
        let values = (0..self.len()).map(|i| self.0[i] + dir.0[i]).collect();
        Point(ArrayOfDouble::new(values))
    }

    /// Directed difference `self - other`, as a [`Direction`].
    pub fn diff(&self, other: &Point) -> Direction {
        assert_eq!(self.len(), other.len(), "Point diff: dimension mismatch");
        let values = (0..self.len()).map(|i| self.0[i] - other.0[i]).collect();
        Direction(ArrayOfDouble::new(values))
    }
}

impl Index<usize> for Point {
    type Output = Double;
    fn index(&self, i: usize) -> &Double {
        &self.0[i]
    }
}

/// A vector in the variable space: direction of travel from a frame center,
/// with norms, dot product, and unit-sphere sampling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Direction(ArrayOfDouble);

impl Direction {
    pub fn new(values: Vec<Double>) -> Self {
        Direction(ArrayOfDouble::new(values))
    }

    pub fn zeros(n: usize) -> Self {
        Direction(ArrayOfDouble::new(vec![Double::ZERO; n]))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Double] {
        self.0.as_slice()
    }

    pub fn squared_l2_norm(&self) -> Double {
        (0..self.len()).fold(Double::ZERO, |acc, i| acc + self.0[i] * self.0[i])
    }

    pub fn norm(&self, norm_type: NormType) -> Double {
        match norm_type {
            NormType::L1 => (0..self.len()).fold(Double::ZERO, |acc, i| acc + self.0[i].abs()),
            NormType::L2 => match self.squared_l2_norm() {
                Double::Finite(v) => Double::Finite(v.sqrt()),
                other => other,
            },
            NormType::LInf => {
                (0..self.len()).fold(Double::ZERO, |acc, i| Double::max(acc, self.0[i].abs()))
            }
        }
    }

    pub fn dot_product(a: &Direction, b: &Direction) -> Double {
        assert_eq!(a.len(), b.len(), "dot_product: dimension mismatch");
        (0..a.len()).fold(Double::ZERO, |acc, i| acc + a.0[i] * b.0[i])
    }

    /// Negation, coordinate-wise.
    pub fn negate(&self) -> Direction {
        let values = self.0.iter().map(|d| -*d).collect();
        Direction(ArrayOfDouble::new(values))
    }

    /// Embed a subspace direction (over `indices`, in order) into the full
    /// `n`-dimensional space, zero elsewhere. Used when variable groups
    /// split the poll across coordinate subsets.
    pub fn embed(sub: &Direction, indices: &[usize], n: usize) -> Direction {
        assert_eq!(sub.len(), indices.len(), "embed: index/direction length mismatch");
        let mut values = vec![Double::ZERO; n];
        for (k, &i) in indices.iter().enumerate() {
            values[i] = sub.0[k];
        }
        Direction(ArrayOfDouble::new(values))
    }

    /// Rescale every coordinate by a finite scalar (`Undefined` propagates).
    pub fn scale(&self, s: Double) -> Direction {
        let values = self.0.iter().map(|&d| d * s).collect();
        Direction(ArrayOfDouble::new(values))
    }
}

impl Index<usize> for Direction {
    type Output = Double;
    fn index(&self, i: usize) -> &Double {
        &self.0[i]
    }
}
impl IndexMut<usize> for Direction {
    fn index_mut(&mut self, i: usize) -> &mut Double {
        &mut self.0[i]
    }
}

impl Add for Direction {
    type Output = Direction;
    fn add(self, rhs: Direction) -> Direction {
        assert_eq!(self.len(), rhs.len());
        let values = (0..self.len()).map(|i| self.0[i] + rhs.0[i]).collect();
        Direction(ArrayOfDouble::new(values))
    }
}

impl Sub for Direction {
    type Output = Direction;
    fn sub(self, rhs: Direction) -> Direction {
        assert_eq!(self.len(), rhs.len());
        let values = (0..self.len()).map(|i| self.0[i] - rhs.0[i]).collect();
        Direction(ArrayOfDouble::new(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_plus_direction_roundtrips_to_diff() {
        let p = Point::from_f64(&[1.0, 2.0]);
        let d = Direction::new(vec![Double::Finite(0.5), Double::Finite(-1.0)]);
        let q = p.plus_direction(&d);
        let back = q.diff(&p);
        assert_eq!(back, d);
    }

    #[test]
    fn norms_agree_on_axis_vector() {
        let d = Direction::new(vec![Double::Finite(3.0), Double::Finite(4.0)]);
        assert_eq!(d.norm(NormType::L2), Double::Finite(5.0));
        assert_eq!(d.norm(NormType::L1), Double::Finite(7.0));
        assert_eq!(d.norm(NormType::LInf), Double::Finite(4.0));
    }

    #[test]
    fn embed_zero_fills_outside_group() {
        let sub = Direction::new(vec![Double::Finite(1.0)]);
        let full = Direction::embed(&sub, &[1], 3);
        assert_eq!(full[0], Double::ZERO);
        assert_eq!(full[1], Double::Finite(1.0));
        assert_eq!(full[2], Double::ZERO);
    }
}
