//! Core type definitions for the random-beacon DKG engine.
//!
//! This crate provides the byte-level primitives shared across the group
//! selection and distributed key generation crates: compressed curve points,
//! scalar field elements, and session identifiers.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Compressed G1 point on BLS12-381 (48 bytes).
///
/// Signature shares and combined threshold signatures live in G1.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct G1Point(#[serde_as(as = "[_; 48]")] pub [u8; 48]);

impl Default for G1Point {
    fn default() -> Self {
        Self([0u8; 48])
    }
}

/// Compressed G2 point on BLS12-381 (96 bytes).
///
/// Polynomial commitments, public key share points, and the group public key
/// live in G2.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct G2Point(#[serde_as(as = "[_; 96]")] pub [u8; 96]);

impl Default for G2Point {
    fn default() -> Self {
        Self([0u8; 96])
    }
}

/// Scalar field element (32 bytes, little-endian).
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Scalar(#[serde_as(as = "[_; 32]")] pub [u8; 32]);

impl Default for Scalar {
    fn default() -> Self {
        Self([0u8; 32])
    }
}

/// Index of a group member, dense in `1..=group_size`.
///
/// Assigned by ascending ticket order during group selection and unique
/// within one DKG session.
pub type MemberIndex = u32;

/// Identifier of a single DKG session, derived from the beacon seed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SessionId(pub [u8; 32]);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borsh_roundtrip_points() {
        let g1 = G1Point([7u8; 48]);
        let bytes = borsh::to_vec(&g1).unwrap();
        assert_eq!(bytes.len(), 48);
        assert_eq!(G1Point::try_from_slice(&bytes).unwrap(), g1);

        let g2 = G2Point([9u8; 96]);
        let bytes = borsh::to_vec(&g2).unwrap();
        assert_eq!(bytes.len(), 96);
        assert_eq!(G2Point::try_from_slice(&bytes).unwrap(), g2);
    }

    #[test]
    fn test_session_id_display_is_short_hex() {
        let id = SessionId([0xab; 32]);
        assert_eq!(id.to_string(), "abababababababab");
    }
}
