//! Final output of a DKG session.

use bls12_381::Scalar;
use zeroize::{Zeroize, ZeroizeOnDrop};

use beacon_crypto::bls::{scalar_from_bytes, sign_with_share};
use beacon_crypto::CryptoError;
use beacon_types::{G1Point, G2Point, MemberIndex};

/// This member's share of the group secret key.
///
/// The raw bytes are overwritten on drop. The share never leaves the
/// process; it only produces signature shares.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyShare([u8; 32]);

impl SecretKeyShare {
    pub(crate) fn new(share: Scalar) -> Self {
        Self(share.to_bytes())
    }

    /// Decode back into a scalar for signing.
    pub fn to_scalar(&self) -> Result<Scalar, CryptoError> {
        scalar_from_bytes(&self.0)
    }

    /// Produce a signature share for a message: σ_self = x_self · H(m).
    ///
    /// Any T+1 such shares combine into a group signature via
    /// [`beacon_crypto::combine_signature_shares`].
    pub fn sign(&self, message: &[u8]) -> Result<G1Point, CryptoError> {
        Ok(sign_with_share(&self.to_scalar()?, message))
    }
}

/// Everything a finalized session hands back to the caller.
///
/// The disqualified and inactive lists are part of the result for audit;
/// both sets are disjoint from each other and from the qualified list, and
/// the three together cover the whole group.
pub struct DkgResult {
    /// The 96-byte compressed BLS group public key, Σ A_{i,0} over
    /// qualified members plus reconstructed contributions
    pub group_public_key: G2Point,
    /// This member's private signing share
    pub secret_share: SecretKeyShare,
    /// Members that can sign, ascending
    pub qualified: Vec<MemberIndex>,
    /// Members excluded for provable misbehavior, ascending
    pub disqualified: Vec<MemberIndex>,
    /// Members excluded for failing to participate, ascending
    pub inactive: Vec<MemberIndex>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff::Field;
    use rand::rngs::OsRng;

    use beacon_crypto::bls::random_scalar;

    #[test]
    fn test_secret_share_roundtrip() {
        let scalar = random_scalar(&mut OsRng);
        let share = SecretKeyShare::new(scalar);
        assert_eq!(share.to_scalar().unwrap(), scalar);
    }

    #[test]
    fn test_sign_produces_share_signature() {
        let scalar = Scalar::from(1234u64);
        let share = SecretKeyShare::new(scalar);

        let signature = share.sign(b"entry").unwrap();
        assert_eq!(signature, sign_with_share(&scalar, b"entry"));
        assert_ne!(signature, sign_with_share(&Scalar::ONE, b"entry"));
    }
}
