//! Scalar polynomials over the BLS12-381 scalar field.
//!
//! A member's secret contribution to the group key is the constant term of a
//! random degree-t polynomial; shares handed to other members are evaluations
//! at their member index. Reconstruction of a lost contribution is Lagrange
//! interpolation over at least t+1 such evaluations.

use bls12_381::Scalar;
use ff::Field;
use rand::{CryptoRng, RngCore};

use crate::error::CryptoError;

/// A polynomial with secret coefficients.
///
/// Coefficients are overwritten with zero when the polynomial is dropped.
pub struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    /// Generate a random polynomial of the given degree.
    ///
    /// Produces `degree + 1` coefficients; the constant term is the secret.
    pub fn random<R: RngCore + CryptoRng>(degree: usize, rng: &mut R) -> Self {
        let mut coefficients = Vec::with_capacity(degree + 1);
        for _ in 0..=degree {
            let mut bytes = [0u8; 64];
            rng.fill_bytes(&mut bytes);
            coefficients.push(Scalar::from_bytes_wide(&bytes));
        }
        Self { coefficients }
    }

    /// Generate a random polynomial with a fixed constant term.
    pub fn random_with_constant<R: RngCore + CryptoRng>(
        constant: Scalar,
        degree: usize,
        rng: &mut R,
    ) -> Self {
        let mut poly = Self::random(degree, rng);
        poly.coefficients[0] = constant;
        poly
    }

    /// Evaluate the polynomial at a member index using Horner's method.
    pub fn evaluate_at(&self, index: u32) -> Scalar {
        let x = Scalar::from(index as u64);
        let mut result = Scalar::ZERO;
        for coeff in self.coefficients.iter().rev() {
            result = result * x + coeff;
        }
        result
    }

    /// The polynomial's degree.
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Borrow the raw coefficients.
    pub fn coefficients(&self) -> &[Scalar] {
        &self.coefficients
    }
}

impl Drop for Polynomial {
    fn drop(&mut self) {
        for coeff in self.coefficients.iter_mut() {
            *coeff = Scalar::ZERO;
        }
    }
}

/// Interpolate the value of a degree-(n-1) polynomial at `x` from `n` points.
///
/// f(x) = Σ y_i · Π_{j≠i} (x - x_j) / (x_i - x_j)
///
/// Duplicate x-coordinates make the interpolation singular and are rejected.
pub fn interpolate_at(points: &[(u32, Scalar)], x: u32) -> Result<Scalar, CryptoError> {
    if points.is_empty() {
        return Err(CryptoError::LagrangeInterpolationFailed);
    }

    let x_scalar = Scalar::from(x as u64);
    let mut result = Scalar::ZERO;

    for (i, (x_i, y_i)) in points.iter().enumerate() {
        let x_i_scalar = Scalar::from(*x_i as u64);

        let mut numerator = Scalar::ONE;
        let mut denominator = Scalar::ONE;

        for (j, (x_j, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            let x_j_scalar = Scalar::from(*x_j as u64);
            numerator *= x_scalar - x_j_scalar;
            denominator *= x_i_scalar - x_j_scalar;
        }

        let denom_inv = denominator.invert();
        if denom_inv.is_none().into() {
            return Err(CryptoError::LagrangeInterpolationFailed);
        }

        result += y_i * numerator * denom_inv.unwrap();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_polynomial_evaluation() {
        // f(x) = 5 + 3x + 2x^2
        let poly = Polynomial {
            coefficients: vec![Scalar::from(5u64), Scalar::from(3u64), Scalar::from(2u64)],
        };

        assert_eq!(poly.evaluate_at(0), Scalar::from(5u64));
        assert_eq!(poly.evaluate_at(1), Scalar::from(10u64));
        assert_eq!(poly.evaluate_at(2), Scalar::from(19u64));
    }

    #[test]
    fn test_interpolation_recovers_constant_term() {
        let mut rng = OsRng;
        let poly = Polynomial::random(2, &mut rng);
        let secret = poly.evaluate_at(0);

        let points: Vec<(u32, Scalar)> = (1..=5).map(|i| (i, poly.evaluate_at(i))).collect();

        // Any 3 points of a degree-2 polynomial recover f(0).
        assert_eq!(interpolate_at(&points[..3], 0).unwrap(), secret);
        assert_eq!(interpolate_at(&points[2..5], 0).unwrap(), secret);
    }

    #[test]
    fn test_interpolation_at_arbitrary_point() {
        let mut rng = OsRng;
        let poly = Polynomial::random(3, &mut rng);

        let points: Vec<(u32, Scalar)> = (1..=4).map(|i| (i, poly.evaluate_at(i))).collect();

        assert_eq!(interpolate_at(&points, 7).unwrap(), poly.evaluate_at(7));
    }

    #[test]
    fn test_interpolation_rejects_empty_input() {
        assert!(matches!(
            interpolate_at(&[], 0),
            Err(CryptoError::LagrangeInterpolationFailed)
        ));
    }

    #[test]
    fn test_fixed_constant_term() {
        let mut rng = OsRng;
        let secret = Scalar::from(42u64);
        let poly = Polynomial::random_with_constant(secret, 4, &mut rng);

        assert_eq!(poly.evaluate_at(0), secret);
        assert_eq!(poly.degree(), 4);
    }
}
