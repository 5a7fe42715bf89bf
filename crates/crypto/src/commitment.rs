//! Pedersen commitments to polynomial coefficients on BLS12-381 G2.
//!
//! A Pedersen commitment C = g^v · h^r is:
//! - **Hiding**: Given C, cannot determine v without r
//! - **Binding**: Cannot find different (v', r') with same C
//!
//! Each member commits to the coefficients of its secret polynomial F and
//! blinding polynomial G as C_k = g^{F_k} · h^{G_k}; a share pair (s, t)
//! sent to member j verifies against g^s · h^t = Π C_k^{j^k}.
//!
//! Feldman-style public key share points A_k = g^{F_k} use the same power
//! loop without the blinding base.

use std::sync::OnceLock;

use bls12_381::{G2Affine, G2Projective, Scalar};
use ff::Field;
use group::Curve;
use sha2::{Digest, Sha256};

use beacon_types::G2Point;

use crate::bls::{compress_g2, decompress_g2};
use crate::polynomial::Polynomial;

/// Bases for Pedersen commitments.
pub struct CommitmentParams {
    /// Base point g
    pub g: G2Affine,
    /// Base point h (nothing-up-my-sleeve generation)
    pub h: G2Affine,
}

static PARAMS: OnceLock<CommitmentParams> = OnceLock::new();

/// Process-wide commitment bases, derived once.
pub fn params() -> &'static CommitmentParams {
    PARAMS.get_or_init(|| CommitmentParams {
        g: G2Affine::generator(),
        h: derive_h_point(),
    })
}

/// Derive the h point using a nothing-up-my-sleeve method.
fn derive_h_point() -> G2Affine {
    // Hash a well-known string to derive h
    let mut hasher = Sha256::new();
    hasher.update(b"BEACON_DKG_PEDERSEN_H_POINT_BLS12381G2_V1");
    let hash = hasher.finalize();

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);

    let scalar = Scalar::from_bytes(&bytes);
    if scalar.is_some().into() {
        (G2Projective::generator() * scalar.unwrap()).to_affine()
    } else {
        // Fallback for a non-canonical digest; unreachable with this input
        (G2Projective::generator() * Scalar::from(0x4845_u64)).to_affine()
    }
}

/// Commit to the coefficients of a secret/blinding polynomial pair.
///
/// C_k = g^{F_k} · h^{G_k} for k in 0..=degree.
pub fn commit_to_polynomials(secret: &Polynomial, blinding: &Polynomial) -> Vec<G2Point> {
    let params = params();

    secret
        .coefficients()
        .iter()
        .zip(blinding.coefficients().iter())
        .map(|(f_k, g_k)| {
            let point = G2Projective::from(params.g) * f_k + G2Projective::from(params.h) * g_k;
            compress_g2(&point.to_affine())
        })
        .collect()
}

/// Verify a share pair against a member's coefficient commitments.
///
/// Checks g^{share} · h^{blinding} = Π C_k^{j^k} for receiver index j.
pub fn verify_share(
    share: &Scalar,
    blinding: &Scalar,
    receiver_index: u32,
    commitments: &[G2Point],
) -> bool {
    let params = params();

    let lhs = G2Projective::from(params.g) * share + G2Projective::from(params.h) * blinding;

    match evaluate_in_exponent(receiver_index, commitments) {
        Some(rhs) => lhs.to_affine() == rhs.to_affine(),
        None => false,
    }
}

/// Compute the Feldman public key share points A_k = g^{F_k}.
pub fn public_key_share_points(secret: &Polynomial) -> Vec<G2Point> {
    secret
        .coefficients()
        .iter()
        .map(|f_k| compress_g2(&(G2Projective::generator() * f_k).to_affine()))
        .collect()
}

/// Verify a share against a member's public key share points.
///
/// Checks g^{share} = Π A_k^{j^k} for receiver index j.
pub fn verify_share_against_points(share: &Scalar, receiver_index: u32, points: &[G2Point]) -> bool {
    let lhs = G2Projective::generator() * share;

    match evaluate_in_exponent(receiver_index, points) {
        Some(rhs) => lhs.to_affine() == rhs.to_affine(),
        None => false,
    }
}

/// Evaluate Π P_k^{j^k} over a list of compressed points.
fn evaluate_in_exponent(index: u32, points: &[G2Point]) -> Option<G2Projective> {
    let x = Scalar::from(index as u64);
    let mut x_power = Scalar::ONE;
    let mut result = G2Projective::identity();

    for point in points {
        let p = decompress_g2(&point.0).ok()?;
        result += G2Projective::from(p) * x_power;
        x_power *= x;
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_share_verifies_against_commitments() {
        let mut rng = OsRng;
        let secret = Polynomial::random(2, &mut rng);
        let blinding = Polynomial::random(2, &mut rng);

        let commitments = commit_to_polynomials(&secret, &blinding);
        assert_eq!(commitments.len(), 3);

        for j in 1..=5 {
            let s = secret.evaluate_at(j);
            let t = blinding.evaluate_at(j);
            assert!(verify_share(&s, &t, j, &commitments));
        }
    }

    #[test]
    fn test_tampered_share_fails_verification() {
        let mut rng = OsRng;
        let secret = Polynomial::random(2, &mut rng);
        let blinding = Polynomial::random(2, &mut rng);

        let commitments = commit_to_polynomials(&secret, &blinding);

        let s = secret.evaluate_at(3) + bls12_381::Scalar::ONE;
        let t = blinding.evaluate_at(3);
        assert!(!verify_share(&s, &t, 3, &commitments));
    }

    #[test]
    fn test_share_verifies_against_points() {
        let mut rng = OsRng;
        let secret = Polynomial::random(3, &mut rng);

        let points = public_key_share_points(&secret);

        for j in 1..=5 {
            assert!(verify_share_against_points(&secret.evaluate_at(j), j, &points));
        }
        assert!(!verify_share_against_points(&secret.evaluate_at(1), 2, &points));
    }

    #[test]
    fn test_malformed_commitment_rejected() {
        let mut rng = OsRng;
        let secret = Polynomial::random(1, &mut rng);
        let blinding = Polynomial::random(1, &mut rng);

        let mut commitments = commit_to_polynomials(&secret, &blinding);
        commitments[0] = G2Point([0xff; 96]);

        let s = secret.evaluate_at(1);
        let t = blinding.evaluate_at(1);
        assert!(!verify_share(&s, &t, 1, &commitments));
    }
}
