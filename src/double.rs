//! `Double`: a real scalar extended with undefined/infinity sentinels.
//!
//! Unlike a bare `f64`, `Double` never produces `NaN`. "Undefined" is a
//! distinct state from either infinity, and every arithmetic operator has an
//! explicit entry in its propagation table instead of relying on IEEE 754
//! NaN propagation. This matters for comparisons: two `Undefined` values are
//! neither equal, less, nor greater — whereas two `NaN`s under IEEE rules
//! happen to agree with that only for equality, not ordering intent.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A real scalar with explicit undefined/infinity sentinels.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub enum Double {
    /// Not computed / not applicable. Propagates through arithmetic.
    Undefined,
    /// An ordinary finite value.
    Finite(f64),
    /// Positive infinity, distinct from an overflowed finite value.
    PosInf,
    /// Negative infinity.
    NegInf,
}

impl Double {
    /// The additive identity.
    pub const ZERO: Double = Double::Finite(0.0);

    /// Build a finite `Double`, rejecting `NaN` and mapping infinities to
    /// the dedicated sentinels rather than carrying them as `f64::INFINITY`.
    pub fn new(v: f64) -> Double {
        if v.is_nan() {
            Double::Undefined
        } else if v == f64::INFINITY {
            Double::PosInf
        } else if v == f64::NEG_INFINITY {
            Double::NegInf
        } else {
            Double::Finite(v)
        }
    }

    /// `true` unless this is `Undefined`.
    pub fn is_defined(&self) -> bool {
        !matches!(self, Double::Undefined)
    }

    /// `true` for `Finite`, `false` for everything else (including infinities).
    pub fn is_finite(&self) -> bool {
        matches!(self, Double::Finite(_))
    }

    /// The underlying `f64` for a finite value, otherwise `None`.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Double::Finite(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer-valued predicate: defined, finite, and equal to its own round.
    pub fn is_integer(&self) -> bool {
        matches!(self, Double::Finite(v) if v.fract() == 0.0)
    }

    /// Absolute value. `Undefined` stays `Undefined`; infinities stay infinite (as `PosInf`).
    pub fn abs(&self) -> Double {
        match self {
            Double::Undefined => Double::Undefined,
            Double::Finite(v) => Double::Finite(v.abs()),
            Double::PosInf | Double::NegInf => Double::PosInf,
        }
    }

    /// `true` iff this value is a finite integer multiple of `delta` (also finite, > 0).
    pub fn is_multiple_of(&self, delta: Double) -> bool {
        match (self, delta) {
            (Double::Finite(v), Double::Finite(d)) if d > 0.0 => {
                let q = v / d;
                (q - q.round()).abs() <= 1e-9 * q.round().abs().max(1.0)
            }
            _ => false,
        }
    }

    /// Round to the nearest multiple of `delta` (round-half-away-from-zero on the quotient).
    pub fn round_mult(&self, delta: Double) -> Double {
        match (self, delta) {
            (Double::Finite(v), Double::Finite(d)) if d > 0.0 => {
                Double::Finite((v / d).round() * d)
            }
            _ => Double::Undefined,
        }
    }

    /// Round up (away from zero in the direction of `self`'s sign) to the next multiple of `delta`.
    pub fn next_mult(&self, delta: Double) -> Double {
        match (self, delta) {
            (Double::Finite(v), Double::Finite(d)) if d > 0.0 => {
                let q = (v / d).abs().ceil() * d;
                Double::Finite(if *v < 0.0 { -q } else { q })
            }
            _ => Double::Undefined,
        }
    }

    /// Total-order-free minimum: `Undefined` poisons the result, matching
    /// the "conservative propagation" invariant in the crate's numerics.
    pub fn min(a: Double, b: Double) -> Double {
        match (a, b) {
            (Double::Undefined, _) | (_, Double::Undefined) => Double::Undefined,
            (Double::NegInf, _) | (_, Double::NegInf) => Double::NegInf,
            (Double::PosInf, other) => other,
            (other, Double::PosInf) => other,
            (Double::Finite(x), Double::Finite(y)) => Double::Finite(x.min(y)),
        }
    }

    /// See [`Double::min`]; symmetric for maximum.
    pub fn max(a: Double, b: Double) -> Double {
        match (a, b) {
            (Double::Undefined, _) | (_, Double::Undefined) => Double::Undefined,
            (Double::PosInf, _) | (_, Double::PosInf) => Double::PosInf,
            (Double::NegInf, other) => other,
            (other, Double::NegInf) => other,
            (Double::Finite(x), Double::Finite(y)) => Double::Finite(x.max(y)),
        }
    }

    /// `10^self` for a finite exponent; `Undefined` otherwise.
    pub fn pow10(&self) -> Double {
        match self {
            Double::Finite(v) => Double::Finite(10f64.powf(*v)),
            _ => Double::Undefined,
        }
    }
}

impl PartialEq for Double {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Double::Undefined, _) | (_, Double::Undefined) => false,
            (Double::PosInf, Double::PosInf) => true,
            (Double::NegInf, Double::NegInf) => true,
            (Double::Finite(a), Double::Finite(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Double {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Double::Undefined, _) | (_, Double::Undefined) => None,
            (Double::NegInf, Double::NegInf) | (Double::PosInf, Double::PosInf) => {
                Some(Ordering::Equal)
            }
            (Double::NegInf, _) => Some(Ordering::Less),
            (_, Double::NegInf) => Some(Ordering::Greater),
            (Double::PosInf, _) => Some(Ordering::Greater),
            (_, Double::PosInf) => Some(Ordering::Less),
            (Double::Finite(a), Double::Finite(b)) => a.partial_cmp(b),
        }
    }
}

impl Add for Double {
    type Output = Double;
    fn add(self, rhs: Double) -> Double {
        match (self, rhs) {
            (Double::Undefined, _) | (_, Double::Undefined) => Double::Undefined,
            (Double::PosInf, Double::NegInf) | (Double::NegInf, Double::PosInf) => {
                Double::Undefined
            }
            (Double::PosInf, _) | (_, Double::PosInf) => Double::PosInf,
            (Double::NegInf, _) | (_, Double::NegInf) => Double::NegInf,
            (Double::Finite(a), Double::Finite(b)) => Double::new(a + b),
        }
    }
}

impl Sub for Double {
    type Output = Double;
    fn sub(self, rhs: Double) -> Double {
        self + (-rhs)
    }
}

impl Neg for Double {
    type Output = Double;
    fn neg(self) -> Double {
        match self {
            Double::Undefined => Double::Undefined,
            Double::Finite(v) => Double::Finite(-v),
            Double::PosInf => Double::NegInf,
            Double::NegInf => Double::PosInf,
        }
    }
}

impl Mul for Double {
    type Output = Double;
    fn mul(self, rhs: Double) -> Double {
        match (self, rhs) {
            (Double::Undefined, _) | (_, Double::Undefined) => Double::Undefined,
            (Double::Finite(a), Double::Finite(b)) => Double::new(a * b),
            (a, b) => {
                let sign_a = sign_of(a);
                let sign_b = sign_of(b);
                match (sign_a, sign_b) {
                    (0, _) | (_, 0) => Double::Undefined,
                    (sa, sb) if sa * sb > 0 => Double::PosInf,
                    _ => Double::NegInf,
                }
            }
        }
    }
}

impl Div for Double {
    type Output = Double;
    fn div(self, rhs: Double) -> Double {
        match (self, rhs) {
            (Double::Undefined, _) | (_, Double::Undefined) => Double::Undefined,
            (Double::Finite(_), Double::Finite(b)) if b == 0.0 => Double::Undefined,
            (Double::Finite(a), Double::Finite(b)) => Double::new(a / b),
            (Double::Finite(_), Double::PosInf) | (Double::Finite(_), Double::NegInf) => {
                Double::ZERO
            }
            (a, Double::Finite(b)) => {
                let sb = if b < 0.0 { -1 } else { 1 };
                scale_inf(a, sb)
            }
            _ => Double::Undefined,
        }
    }
}

fn sign_of(d: Double) -> i32 {
    match d {
        Double::Finite(v) if v > 0.0 => 1,
        Double::Finite(v) if v < 0.0 => -1,
        Double::Finite(_) => 0,
        Double::PosInf => 1,
        Double::NegInf => -1,
        Double::Undefined => 0,
    }
}

fn scale_inf(a: Double, sign: i32) -> Double {
    match (a, sign) {
        (Double::PosInf, 1) => Double::PosInf,
        (Double::PosInf, -1) => Double::NegInf,
        (Double::NegInf, 1) => Double::NegInf,
        (Double::NegInf, -1) => Double::PosInf,
        _ => Double::Undefined,
    }
}

impl fmt::Display for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Double::Undefined => write!(f, "-"),
            Double::Finite(v) => write!(f, "{v}"),
            Double::PosInf => write!(f, "+INF"),
            Double::NegInf => write!(f, "-INF"),
        }
    }
}

impl From<f64> for Double {
    fn from(v: f64) -> Double {
        Double::new(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_never_equal_even_to_itself() {
        assert!(!(Double::Undefined == Double::Undefined));
        assert_eq!(Double::Undefined.partial_cmp(&Double::Undefined), None);
    }

    #[test]
    fn undefined_poisons_addition_and_min_max() {
        let u = Double::Undefined;
        let f = Double::Finite(3.0);
        assert!(!(u + f).is_defined());
        assert!(!Double::min(u, f).is_defined());
        assert!(!Double::max(u, f).is_defined());
    }

    #[test]
    fn infinities_survive_and_cancel_correctly() {
        assert_eq!(Double::PosInf + Double::Finite(1.0), Double::PosInf);
        assert!(!(Double::PosInf + Double::NegInf).is_defined());
        assert_eq!(Double::max(Double::PosInf, Double::Finite(1e9)), Double::PosInf);
    }

    #[test]
    fn is_multiple_of_and_round_mult() {
        let delta = Double::Finite(0.25);
        assert!(Double::Finite(1.0).is_multiple_of(delta));
        assert!(!Double::Finite(1.1).is_multiple_of(delta));
        assert_eq!(Double::Finite(1.1).round_mult(delta), Double::Finite(1.0));
    }

    #[test]
    fn nan_is_never_constructed() {
        let d = Double::new(f64::NAN);
        assert!(!d.is_defined());
        assert!(matches!(d, Double::Undefined));
    }
}
