//! Cryptographic primitives for the random-beacon DKG engine.
//!
//! This crate wraps the curve arithmetic the protocol needs:
//!
//! 1. **BLS12-381** (`bls`): signature shares, Lagrange combination, and
//!    pairing verification of group signatures.
//!
//! 2. **Polynomials** (`polynomial`): random secret polynomials over the BLS
//!    scalar field, share evaluation, and Lagrange interpolation for
//!    reconstructing disqualified members' contributions.
//!
//! 3. **Pedersen commitments** (`commitment`): hiding commitments to
//!    polynomial coefficients on G2 and the share verification equation.
//!
//! 4. **Ephemeral key exchange** (`ephemeral`): per-peer secp256k1 ECDH,
//!    HKDF key derivation, and AES-256-GCM share encryption.

pub mod bls;
pub mod commitment;
pub mod ephemeral;
pub mod error;
pub mod polynomial;

pub use bls::{combine_signature_shares, sign_with_share, verify_signature};
pub use commitment::{commit_to_polynomials, public_key_share_points, verify_share};
pub use ephemeral::{EncryptedShares, EphemeralKeypair, SymmetricKey};
pub use error::CryptoError;
pub use polynomial::Polynomial;
