//! Ephemeral secp256k1 key exchange for pairwise share encryption.
//!
//! Each member generates a distinct ephemeral keypair for every other member
//! of the group and broadcasts the public halves. Both sides of a pair then
//! derive the same symmetric key:
//!
//! sym = HKDF-SHA256(ECDH(eph_priv_self, eph_pub_peer))
//!
//! and use it to AES-256-GCM encrypt the secret share travelling between
//! them. A private half is revealed only when the peer is accused or
//! disqualified, at which point the whole group can reproduce the symmetric
//! key and decrypt the disputed share.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use k256::ecdh;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Compressed secp256k1 public key bytes.
pub type EphemeralPublicKeyBytes = [u8; 33];

/// Raw secp256k1 private key bytes, as revealed during justification.
pub type EphemeralPrivateKeyBytes = [u8; 32];

/// An ephemeral keypair generated for exactly one peer.
///
/// The private half zeroizes itself on drop (`k256::SecretKey`).
pub struct EphemeralKeypair {
    secret: SecretKey,
    public: PublicKey,
}

impl EphemeralKeypair {
    /// Generate a fresh keypair.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = SecretKey::random(rng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Restore a keypair from revealed private key bytes.
    pub fn from_private_bytes(bytes: &EphemeralPrivateKeyBytes) -> Result<Self, CryptoError> {
        let secret =
            SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidEphemeralPrivateKey)?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// The compressed public half.
    pub fn public_bytes(&self) -> EphemeralPublicKeyBytes {
        let encoded = self.public.to_encoded_point(true);
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(encoded.as_bytes());
        bytes
    }

    /// Export the private half for a justification or reveal message.
    pub fn reveal_private_bytes(&self) -> EphemeralPrivateKeyBytes {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.secret.to_bytes());
        bytes
    }

    /// Derive the pairwise symmetric key with a peer's ephemeral public key.
    pub fn derive_symmetric_key(
        &self,
        peer_public: &EphemeralPublicKeyBytes,
    ) -> Result<SymmetricKey, CryptoError> {
        let peer = PublicKey::from_sec1_bytes(peer_public)
            .map_err(|_| CryptoError::InvalidEphemeralPublicKey)?;

        let shared = ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());

        let hk = Hkdf::<Sha256>::new(None, shared.raw_secret_bytes());
        let mut key = [0u8; 32];
        hk.expand(b"BEACON_DKG_SHARE_KEY", &mut key)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        Ok(SymmetricKey(key))
    }
}

/// Check that revealed private key bytes match an announced public key.
pub fn private_key_matches_public(
    private: &EphemeralPrivateKeyBytes,
    public: &EphemeralPublicKeyBytes,
) -> bool {
    match EphemeralKeypair::from_private_bytes(private) {
        Ok(keypair) => &keypair.public_bytes() == public,
        Err(_) => false,
    }
}

/// An AES-256-GCM key shared by exactly one pair of members.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

/// An encrypted share pair as carried in a peer-shares message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedShares {
    /// AEAD nonce, fresh per recipient
    pub nonce: [u8; 12],
    /// AES-256-GCM ciphertext with appended tag
    pub ciphertext: Vec<u8>,
}

impl SymmetricKey {
    /// Encrypt a plaintext under a fresh random nonce.
    pub fn encrypt<R: RngCore + CryptoRng>(
        &self,
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<EncryptedShares, CryptoError> {
        let mut nonce_bytes = [0u8; 12];
        rng.fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| CryptoError::EncryptionFailed(format!("failed to create cipher: {e}")))?;

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(format!("AES-GCM encryption failed: {e}")))?;

        Ok(EncryptedShares {
            nonce: nonce_bytes,
            ciphertext,
        })
    }

    /// Decrypt and authenticate a ciphertext.
    pub fn decrypt(&self, encrypted: &EncryptedShares) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| CryptoError::EncryptionFailed(format!("failed to create cipher: {e}")))?;

        cipher
            .decrypt(Nonce::from_slice(&encrypted.nonce), encrypted.ciphertext.as_ref())
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_both_sides_derive_same_key() {
        let mut rng = OsRng;

        // Member 1's keypair for member 2, and vice versa.
        let pair_1_2 = EphemeralKeypair::generate(&mut rng);
        let pair_2_1 = EphemeralKeypair::generate(&mut rng);

        let key_at_1 = pair_1_2.derive_symmetric_key(&pair_2_1.public_bytes()).unwrap();
        let key_at_2 = pair_2_1.derive_symmetric_key(&pair_1_2.public_bytes()).unwrap();

        let encrypted = key_at_1.encrypt(b"share material", &mut rng).unwrap();
        let decrypted = key_at_2.decrypt(&encrypted).unwrap();

        assert_eq!(decrypted, b"share material");
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let mut rng = OsRng;

        let pair_a = EphemeralKeypair::generate(&mut rng);
        let pair_b = EphemeralKeypair::generate(&mut rng);
        let pair_c = EphemeralKeypair::generate(&mut rng);

        let key_ab = pair_a.derive_symmetric_key(&pair_b.public_bytes()).unwrap();
        let key_ac = pair_a.derive_symmetric_key(&pair_c.public_bytes()).unwrap();

        let encrypted = key_ab.encrypt(b"for b only", &mut rng).unwrap();
        assert!(matches!(
            key_ac.decrypt(&encrypted),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_revealed_private_key_reproduces_symmetric_key() {
        let mut rng = OsRng;

        let pair_1_2 = EphemeralKeypair::generate(&mut rng);
        let pair_2_1 = EphemeralKeypair::generate(&mut rng);

        let key = pair_1_2.derive_symmetric_key(&pair_2_1.public_bytes()).unwrap();
        let encrypted = key.encrypt(b"disputed share", &mut rng).unwrap();

        // A third party learns member 1's private half and decrypts.
        let revealed = pair_1_2.reveal_private_bytes();
        let restored = EphemeralKeypair::from_private_bytes(&revealed).unwrap();
        let restored_key = restored.derive_symmetric_key(&pair_2_1.public_bytes()).unwrap();

        assert_eq!(restored_key.decrypt(&encrypted).unwrap(), b"disputed share");
    }

    #[test]
    fn test_private_key_public_key_match() {
        let mut rng = OsRng;
        let pair = EphemeralKeypair::generate(&mut rng);
        let other = EphemeralKeypair::generate(&mut rng);

        assert!(private_key_matches_public(
            &pair.reveal_private_bytes(),
            &pair.public_bytes()
        ));
        assert!(!private_key_matches_public(
            &pair.reveal_private_bytes(),
            &other.public_bytes()
        ));
        assert!(!private_key_matches_public(&[0u8; 32], &pair.public_bytes()));
    }
}
