//! BLS12-381 primitives for threshold signing.
//!
//! In a (t, n) threshold scheme:
//! - n members each hold a secret share x_i produced by the DKG
//! - Any t+1 members can produce a group signature
//! - Fewer than t+1 members learn nothing about the group key
//!
//! # Signature shares
//!
//! For message `m`, member i computes σ_i = x_i · H(m) in G1.
//!
//! # Combination
//!
//! Given t+1 signature shares, the group signature is
//!
//! σ = Σ λ_i · σ_i
//!
//! where λ_i are Lagrange coefficients at zero. Verification is the pairing
//! check e(σ, g2) = e(H(m), Y) against the group public key Y in G2.

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, Scalar};
use ff::Field;
use group::Curve;
use rand::{CryptoRng, RngCore};
use std::collections::HashSet;

use beacon_types::{G1Point, G2Point};

use crate::error::CryptoError;

/// Compress a G1 point to bytes.
pub fn compress_g1(point: &G1Affine) -> G1Point {
    G1Point(point.to_compressed())
}

/// Decompress a G1 point from bytes.
pub fn decompress_g1(bytes: &[u8; 48]) -> Result<G1Affine, CryptoError> {
    let point = G1Affine::from_compressed(bytes);
    if point.is_some().into() {
        Ok(point.unwrap())
    } else {
        Err(CryptoError::InvalidG1Point)
    }
}

/// Compress a G2 point to bytes.
pub fn compress_g2(point: &G2Affine) -> G2Point {
    G2Point(point.to_compressed())
}

/// Decompress a G2 point from bytes.
pub fn decompress_g2(bytes: &[u8; 96]) -> Result<G2Affine, CryptoError> {
    let point = G2Affine::from_compressed(bytes);
    if point.is_some().into() {
        Ok(point.unwrap())
    } else {
        Err(CryptoError::InvalidG2Point)
    }
}

/// Generate a uniformly random scalar.
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    Scalar::from_bytes_wide(&bytes)
}

/// Decode a canonical 32-byte little-endian scalar.
pub fn scalar_from_bytes(bytes: &[u8; 32]) -> Result<Scalar, CryptoError> {
    let scalar = Scalar::from_bytes(bytes);
    if scalar.is_some().into() {
        Ok(scalar.unwrap())
    } else {
        Err(CryptoError::InvalidScalar)
    }
}

/// Hash arbitrary data to a G1 point.
///
/// Try-and-increment over a domain-separated SHA-256 digest.
pub fn hash_to_g1(data: &[u8]) -> G1Affine {
    use sha2::{Digest, Sha256};

    let mut counter = 0u64;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(b"BEACON_DKG_BLS12381G1_H2C_V1");
        hasher.update(data);
        hasher.update(counter.to_le_bytes());
        let hash = hasher.finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);

        let scalar = Scalar::from_bytes(&bytes);
        if scalar.is_some().into() {
            return (G1Projective::generator() * scalar.unwrap()).to_affine();
        }
        counter += 1;
    }
}

/// Produce a signature share for a message: σ_i = x_i · H(m).
pub fn sign_with_share(secret_share: &Scalar, message: &[u8]) -> G1Point {
    let msg_point = hash_to_g1(message);
    compress_g1(&(G1Projective::from(msg_point) * secret_share).to_affine())
}

/// Combine signature shares into a group signature using Lagrange
/// interpolation at zero.
///
/// # Arguments
/// * `shares` - (member_index, signature_share) pairs
/// * `threshold` - minimum number of shares required
pub fn combine_signature_shares(
    shares: &[(u32, G1Point)],
    threshold: usize,
) -> Result<G1Point, CryptoError> {
    if shares.len() < threshold {
        return Err(CryptoError::InsufficientShares {
            required: threshold,
            got: shares.len(),
        });
    }

    let unique: HashSet<u32> = shares.iter().map(|(idx, _)| *idx).collect();
    if unique.len() != shares.len() {
        return Err(CryptoError::DuplicateShareIndex);
    }

    let indices: Vec<u32> = shares.iter().map(|(idx, _)| *idx).collect();

    let mut result = G1Projective::identity();
    for (idx, sig_point) in shares {
        let sig = decompress_g1(&sig_point.0)?;
        let lambda = lagrange_coefficient(*idx, &indices)?;
        result += G1Projective::from(sig) * lambda;
    }

    Ok(compress_g1(&result.to_affine()))
}

/// Verify a group signature against the group public key.
///
/// Checks e(σ, g2) = e(H(m), Y).
pub fn verify_signature(
    group_public_key: &G2Point,
    message: &[u8],
    signature: &G1Point,
) -> Result<(), CryptoError> {
    let y = decompress_g2(&group_public_key.0)?;
    let sig = decompress_g1(&signature.0)?;
    let msg_point = hash_to_g1(message);

    if pairing(&sig, &G2Affine::generator()) == pairing(&msg_point, &y) {
        Ok(())
    } else {
        Err(CryptoError::SignatureInvalid)
    }
}

/// Compute the Lagrange coefficient at zero for index i given all indices.
///
/// λ_i = Π_{j≠i} (x_j / (x_j - x_i))
pub(crate) fn lagrange_coefficient(i: u32, indices: &[u32]) -> Result<Scalar, CryptoError> {
    let i_scalar = Scalar::from(i as u64);
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;

    for &j in indices {
        if j == i {
            continue;
        }

        let j_scalar = Scalar::from(j as u64);
        numerator *= j_scalar;
        denominator *= j_scalar - i_scalar;
    }

    let denom_inv = denominator.invert();
    if denom_inv.is_none().into() {
        return Err(CryptoError::LagrangeInterpolationFailed);
    }

    Ok(numerator * denom_inv.unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff::Field;
    use rand::rngs::OsRng;

    use crate::polynomial::Polynomial;

    #[test]
    fn test_hash_to_g1_deterministic() {
        let p1 = hash_to_g1(b"entry one");
        let p2 = hash_to_g1(b"entry two");
        let p3 = hash_to_g1(b"entry one");

        assert_ne!(p1, p2);
        assert_eq!(p1, p3);
    }

    #[test]
    fn test_lagrange_coefficients_sum_to_one() {
        let indices = vec![1, 2, 3];

        let l1 = lagrange_coefficient(1, &indices).unwrap();
        let l2 = lagrange_coefficient(2, &indices).unwrap();
        let l3 = lagrange_coefficient(3, &indices).unwrap();

        assert_eq!(l1 + l2 + l3, Scalar::ONE);
    }

    #[test]
    fn test_threshold_signature_roundtrip() {
        let mut rng = OsRng;

        // Shamir-share a group secret over 5 members, threshold 2.
        let group_secret = random_scalar(&mut rng);
        let poly = Polynomial::random_with_constant(group_secret, 2, &mut rng);

        let group_pk = compress_g2(
            &(bls12_381::G2Projective::generator() * group_secret).to_affine(),
        );

        let message = b"beacon entry 42";
        let shares: Vec<(u32, G1Point)> = (1..=3)
            .map(|i| (i, sign_with_share(&poly.evaluate_at(i), message)))
            .collect();

        let signature = combine_signature_shares(&shares, 3).unwrap();
        assert!(verify_signature(&group_pk, message, &signature).is_ok());

        // A different message does not verify.
        assert!(verify_signature(&group_pk, b"other entry", &signature).is_err());
    }

    #[test]
    fn test_combine_rejects_insufficient_shares() {
        let shares = vec![(1u32, G1Point::default())];
        let result = combine_signature_shares(&shares, 2);
        assert!(matches!(result, Err(CryptoError::InsufficientShares { .. })));
    }

    #[test]
    fn test_combine_rejects_duplicate_indices() {
        let shares = vec![(1u32, G1Point::default()), (1u32, G1Point::default())];
        let result = combine_signature_shares(&shares, 2);
        assert!(matches!(result, Err(CryptoError::DuplicateShareIndex)));
    }
}
