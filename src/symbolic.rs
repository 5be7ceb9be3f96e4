//! Symbolic zero and infinity multiplication
//!
//! Zero-frequency and infinite-frequency radiation problems are solved by
//! the same code path as ordinary frequencies: the indeterminate scalar
//! prefactors (such as `-iω` with `ω = 0`) are carried symbolically
//! around the linear solve instead of being multiplied in. A value tagged
//! with `n` symbolic zero factors (negative `n` meaning infinity factors)
//! behaves as an ordinary number under multiplication and division, with
//! symbols cancelling; converting to a float collapses the tag, yielding
//! NaN for the indeterminate `0 × ∞` combinations.

use ndarray::Array1;
use num_complex::Complex64;
use std::ops::{Div, Mul};

/// Collapse one real component according to the symbolic exponent.
fn collapse(exponent: i32, x: f64) -> f64 {
    if exponent == 0 {
        x
    } else if exponent > 0 {
        // x × 0^n: zero unless x itself is infinite.
        if x.is_finite() {
            0.0
        } else {
            f64::NAN
        }
    } else {
        // x × ∞^n: signed infinity unless x is zero.
        if x == 0.0 {
            f64::NAN
        } else if x.is_nan() {
            f64::NAN
        } else {
            x.signum() * f64::INFINITY
        }
    }
}

/// A real value multiplied by a net number of symbolic zeros.
///
/// `exponent > 0` counts symbolic zero factors, `exponent < 0` symbolic
/// infinity factors, `exponent == 0` is a plain number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolicScalar {
    exponent: i32,
    value: f64,
}

impl SymbolicScalar {
    /// A plain (untagged) value.
    pub fn plain(value: f64) -> Self {
        Self { exponent: 0, value }
    }

    /// The symbolic zero, `0 × 1.0`.
    pub fn zero() -> Self {
        Self {
            exponent: 1,
            value: 1.0,
        }
    }

    /// The symbolic infinity, `∞ × 1.0`.
    pub fn infinity() -> Self {
        Self {
            exponent: -1,
            value: 1.0,
        }
    }

    /// Tag an angular frequency: exact zero and infinity become symbolic
    /// so that they can flow through the ordinary solve path.
    pub fn from_omega(omega: f64) -> Self {
        if omega == 0.0 {
            Self::zero()
        } else if omega.is_infinite() {
            Self::infinity()
        } else {
            Self::plain(omega)
        }
    }

    /// Net count of symbolic zero factors.
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// The finite part of the value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Collapse to an ordinary float. NaN for indeterminate `0 × ∞`.
    pub fn to_f64(&self) -> f64 {
        collapse(self.exponent, self.value)
    }

    /// Square of the scalar, symbols included.
    pub fn squared(&self) -> Self {
        Self {
            exponent: 2 * self.exponent,
            value: self.value * self.value,
        }
    }
}

impl Mul<SymbolicScalar> for SymbolicScalar {
    type Output = SymbolicScalar;
    fn mul(self, rhs: SymbolicScalar) -> SymbolicScalar {
        SymbolicScalar {
            exponent: self.exponent + rhs.exponent,
            value: self.value * rhs.value,
        }
    }
}

impl Mul<f64> for SymbolicScalar {
    type Output = SymbolicScalar;
    fn mul(self, rhs: f64) -> SymbolicScalar {
        SymbolicScalar {
            exponent: self.exponent,
            value: self.value * rhs,
        }
    }
}

impl Mul<SymbolicScalar> for f64 {
    type Output = SymbolicScalar;
    fn mul(self, rhs: SymbolicScalar) -> SymbolicScalar {
        rhs * self
    }
}

impl Div<SymbolicScalar> for SymbolicScalar {
    type Output = SymbolicScalar;
    fn div(self, rhs: SymbolicScalar) -> SymbolicScalar {
        SymbolicScalar {
            exponent: self.exponent - rhs.exponent,
            value: self.value / rhs.value,
        }
    }
}

/// A complex value with a symbolic-zero exponent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolicComplex {
    exponent: i32,
    value: Complex64,
}

impl SymbolicComplex {
    /// A plain complex value.
    pub fn plain(value: Complex64) -> Self {
        Self { exponent: 0, value }
    }

    /// Promote a real symbolic scalar.
    pub fn from_scalar(s: SymbolicScalar) -> Self {
        Self {
            exponent: s.exponent,
            value: Complex64::new(s.value, 0.0),
        }
    }

    /// A complex value with an explicit symbolic exponent.
    pub fn with_exponent(exponent: i32, value: Complex64) -> Self {
        Self { exponent, value }
    }

    /// Net count of symbolic zero factors.
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// The finite part of the value.
    pub fn value(&self) -> Complex64 {
        self.value
    }

    /// Multiply by a plain complex factor.
    pub fn times(&self, factor: Complex64) -> Self {
        Self {
            exponent: self.exponent,
            value: self.value * factor,
        }
    }

    /// Divide by a real symbolic scalar, cancelling symbols.
    pub fn div_scalar(&self, rhs: SymbolicScalar) -> Self {
        Self {
            exponent: self.exponent - rhs.exponent(),
            value: self.value / rhs.value(),
        }
    }

    /// Collapse to an ordinary complex number, component-wise.
    pub fn to_complex(&self) -> Complex64 {
        Complex64::new(
            collapse(self.exponent, self.value.re),
            collapse(self.exponent, self.value.im),
        )
    }
}

/// A complex vector with a shared symbolic-zero exponent.
///
/// This is the type flowing through the solver: boundary conditions,
/// source distributions, potentials and pressures all carry the symbolic
/// prefactor of the problem's frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicVector {
    exponent: i32,
    values: Array1<Complex64>,
}

impl SymbolicVector {
    /// A plain (untagged) vector.
    pub fn plain(values: Array1<Complex64>) -> Self {
        Self {
            exponent: 0,
            values,
        }
    }

    /// A vector with an explicit symbolic exponent.
    pub fn with_exponent(exponent: i32, values: Array1<Complex64>) -> Self {
        Self { exponent, values }
    }

    /// Net count of symbolic zero factors.
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// The finite part of the vector.
    pub fn values(&self) -> &Array1<Complex64> {
        &self.values
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector has no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Apply a linear map to the finite part, keeping the symbols.
    pub fn map_values(&self, f: impl FnOnce(&Array1<Complex64>) -> Array1<Complex64>) -> Self {
        Self {
            exponent: self.exponent,
            values: f(&self.values),
        }
    }

    /// Multiply by a symbolic complex scalar.
    pub fn scale(&self, s: SymbolicComplex) -> Self {
        Self {
            exponent: self.exponent + s.exponent(),
            values: self.values.mapv(|v| v * s.value()),
        }
    }

    /// Add a plain vector. The sum of a symbolic-prefixed term and a
    /// plain term carries no common prefactor, so a nonzero exponent is
    /// collapsed away first.
    pub fn add_plain(&mut self, rhs: &Array1<Complex64>) {
        if self.exponent != 0 {
            self.values = self.to_plain();
            self.exponent = 0;
        }
        self.values = &self.values + rhs;
    }

    /// Collapse to an ordinary complex vector, component-wise.
    pub fn to_plain(&self) -> Array1<Complex64> {
        if self.exponent == 0 {
            self.values.clone()
        } else {
            self.values.mapv(|v| {
                Complex64::new(collapse(self.exponent, v.re), collapse(self.exponent, v.im))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_multiplication_keeps_value() {
        let zero = SymbolicScalar::zero();
        let b = 2.0 * zero;
        assert_eq!(b.value(), 2.0 * zero.value());
        assert_eq!(b.exponent(), 1);
    }

    #[test]
    fn test_division_cancels_symbol() {
        let zero = SymbolicScalar::zero();
        let b = 2.0 * zero;
        assert_eq!((b / zero).to_f64(), 2.0);
    }

    #[test]
    fn test_double_division() {
        let zero = SymbolicScalar::zero();
        let b = 7.0 * zero * zero;
        assert_eq!((b / (zero * zero)).to_f64(), 7.0);
    }

    #[test]
    fn test_invert_division() {
        let zero = SymbolicScalar::zero();
        let b = 9.0 * zero;
        assert_relative_eq!((zero / b).to_f64(), 1.0 / 9.0);
    }

    #[test]
    fn test_collapse_to_float() {
        let b = 4.5 * SymbolicScalar::zero();
        assert_eq!(b.to_f64(), 0.0);
        let c = 4.5 * SymbolicScalar::infinity();
        assert_eq!(c.to_f64(), f64::INFINITY);
        let d = -4.5 * SymbolicScalar::infinity();
        assert_eq!(d.to_f64(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_undefined_case_is_nan() {
        // 0 × ∞ in either order.
        assert!((f64::INFINITY * SymbolicScalar::zero()).to_f64().is_nan());
        assert!((0.0 * SymbolicScalar::infinity()).to_f64().is_nan());
    }

    #[test]
    fn test_vector_roundtrip_through_symbols() {
        let v = SymbolicVector::with_exponent(
            1,
            array![Complex64::new(1.0, 0.0), Complex64::new(0.0, -2.0)],
        );
        // Dividing the pressure-like quantity by the same symbolic factor
        // recovers the finite part.
        let recovered = v.scale(SymbolicComplex::from_scalar(
            SymbolicScalar::plain(1.0) / SymbolicScalar::zero(),
        ));
        assert_eq!(recovered.exponent(), 0);
        assert_eq!(recovered.to_plain(), *v.values());
    }

    #[test]
    fn test_vector_collapse() {
        let v = SymbolicVector::with_exponent(1, array![Complex64::new(3.0, -1.0)]);
        let plain = v.to_plain();
        assert_eq!(plain[0], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_add_plain_collapses_symbolic_prefactor() {
        // A symbolically-zero term vanishes under the collapse; the
        // plain addend survives unchanged.
        let mut v = SymbolicVector::with_exponent(1, array![Complex64::new(3.0, -1.0)]);
        v.add_plain(&array![Complex64::new(2.0, 0.5)]);
        assert_eq!(v.exponent(), 0);
        assert_eq!(v.values()[0], Complex64::new(2.0, 0.5));
    }

    #[test]
    fn test_from_omega() {
        assert_eq!(SymbolicScalar::from_omega(0.0).exponent(), 1);
        assert_eq!(SymbolicScalar::from_omega(f64::INFINITY).exponent(), -1);
        assert_eq!(SymbolicScalar::from_omega(1.5).to_f64(), 1.5);
    }
}
