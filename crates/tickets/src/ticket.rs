//! Ticket computation and verification.
//!
//! A ticket is a pseudorandom value anchored to the fresh beacon entry and a
//! staker's long-lived public key: cheap to verify, expensive to grind. The
//! lowest tickets win group membership, giving a fixed expected cutoff.

use std::cmp::Ordering;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sha2::{Digest, Sha256};

use crate::error::TicketError;

/// Compressed secp256k1 public key identifying a staker.
pub type StakerPublicKey = [u8; 33];

/// A staker eligible to submit tickets.
///
/// The virtual staker count is proportional to stake; a staker with
/// `virtual_stakers = 5` may submit five independent tickets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Staker {
    /// Long-lived ECDSA public key, compressed
    pub public_key: StakerPublicKey,
    /// Number of virtual stakers backed by this staker's stake
    pub virtual_stakers: u64,
}

impl Staker {
    pub fn new(public_key: StakerPublicKey, virtual_stakers: u64) -> Self {
        Self {
            public_key,
            virtual_stakers,
        }
    }

    /// Compute the ticket for one of this staker's virtual stakers.
    ///
    /// Deterministic in `(seed, public_key, virtual_staker_index)`. Fails if
    /// the index is outside `[1, virtual_stakers]`.
    pub fn calculate_ticket(
        &self,
        seed: &[u8; 32],
        virtual_staker_index: u64,
    ) -> Result<Ticket, TicketError> {
        if virtual_staker_index < 1 || virtual_staker_index > self.virtual_stakers {
            return Err(TicketError::VirtualStakerIndexOutOfRange {
                index: virtual_staker_index,
                max: self.virtual_stakers,
            });
        }

        Ok(Ticket {
            value: ticket_value(seed, &self.public_key, virtual_staker_index),
            proof: TicketProof {
                public_key: self.public_key,
                virtual_staker_index,
            },
        })
    }

    /// Compute tickets for all of this staker's virtual stakers.
    pub fn all_tickets(&self, seed: &[u8; 32]) -> Vec<Ticket> {
        (1..=self.virtual_stakers)
            .filter_map(|vs| self.calculate_ticket(seed, vs).ok())
            .collect()
    }
}

/// The components needed to reconstruct a ticket's value, doubling as
/// evidence in an accusing challenge against it.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct TicketProof {
    /// Staker-specific value Q_j
    #[serde_as(as = "[_; 33]")]
    pub public_key: StakerPublicKey,
    /// Virtual staker index vs
    pub virtual_staker_index: u64,
}

/// A group-selection lottery ticket.
///
/// `value` is W = SHA-256(seed ‖ public_key ‖ vs_bytes); the lowest values
/// win membership.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Ticket {
    /// W_k
    pub value: [u8; 32],
    /// Proof(Q_j, vs)
    pub proof: TicketProof,
}

impl Ticket {
    /// Verify this ticket against the seed and the claimed staker's virtual
    /// staker count.
    pub fn verify(&self, seed: &[u8; 32], virtual_stakers: u64) -> Result<(), TicketError> {
        let index = self.proof.virtual_staker_index;
        if index < 1 || index > virtual_stakers {
            return Err(TicketError::VirtualStakerIndexOutOfRange {
                index,
                max: virtual_stakers,
            });
        }

        let expected = ticket_value(seed, &self.proof.public_key, index);
        if self.value != expected {
            return Err(TicketError::ValueMismatch);
        }

        Ok(())
    }
}

impl Ord for Ticket {
    /// Ascending bytewise order on the ticket value, with ties broken by
    /// `(public_key, virtual_staker_index)` so the order is total.
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.proof.public_key.cmp(&other.proof.public_key))
            .then_with(|| {
                self.proof
                    .virtual_staker_index
                    .cmp(&other.proof.virtual_staker_index)
            })
    }
}

impl PartialOrd for Ticket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// W = SHA-256(seed ‖ compressed public key ‖ virtual staker index bytes).
///
/// The index is written as 8 little-endian bytes into a 64-byte zero buffer
/// and all 64 bytes are hashed. The oversized buffer is required for
/// compatibility with the on-chain ticket verifier, which hashes the index
/// as a 64-byte word; do not shrink it.
fn ticket_value(seed: &[u8; 32], public_key: &StakerPublicKey, index: u64) -> [u8; 32] {
    let mut index_bytes = [0u8; 64];
    index_bytes[..8].copy_from_slice(&index.to_le_bytes());

    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(public_key);
    hasher.update(index_bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_staker(byte: u8, virtual_stakers: u64) -> Staker {
        Staker::new([byte; 33], virtual_stakers)
    }

    #[test]
    fn test_ticket_is_deterministic() {
        let seed = [1u8; 32];
        let staker = test_staker(2, 10);

        let t1 = staker.calculate_ticket(&seed, 3).unwrap();
        let t2 = staker.calculate_ticket(&seed, 3).unwrap();
        assert_eq!(t1, t2);

        let t3 = staker.calculate_ticket(&seed, 4).unwrap();
        assert_ne!(t1.value, t3.value);
    }

    #[test]
    fn test_index_bounds_rejected() {
        let seed = [1u8; 32];
        let staker = test_staker(2, 5);

        assert!(matches!(
            staker.calculate_ticket(&seed, 0),
            Err(TicketError::VirtualStakerIndexOutOfRange { index: 0, max: 5 })
        ));
        assert!(matches!(
            staker.calculate_ticket(&seed, 6),
            Err(TicketError::VirtualStakerIndexOutOfRange { index: 6, max: 5 })
        ));
    }

    #[test]
    fn test_calculate_then_verify() {
        let seed = [7u8; 32];
        let staker = test_staker(9, 4);

        for vs in 1..=4 {
            let ticket = staker.calculate_ticket(&seed, vs).unwrap();
            assert!(ticket.verify(&seed, staker.virtual_stakers).is_ok());
        }
    }

    #[test]
    fn test_verify_rejects_tampered_value() {
        let seed = [7u8; 32];
        let staker = test_staker(9, 4);

        let mut ticket = staker.calculate_ticket(&seed, 1).unwrap();
        ticket.value[0] ^= 0x01;

        assert!(matches!(
            ticket.verify(&seed, staker.virtual_stakers),
            Err(TicketError::ValueMismatch)
        ));
    }

    #[test]
    fn test_verify_rejects_out_of_range_claim() {
        let seed = [7u8; 32];
        let staker = test_staker(9, 10);

        let ticket = staker.calculate_ticket(&seed, 8).unwrap();
        // The registry says this staker only backs 5 virtual stakers.
        assert!(matches!(
            ticket.verify(&seed, 5),
            Err(TicketError::VirtualStakerIndexOutOfRange { index: 8, max: 5 })
        ));
    }

    #[test]
    fn test_ordering_is_total() {
        let seed = [3u8; 32];
        let a = test_staker(1, 3);
        let b = test_staker(2, 3);

        let mut tickets: Vec<Ticket> = a
            .all_tickets(&seed)
            .into_iter()
            .chain(b.all_tickets(&seed))
            .collect();
        tickets.sort();

        for pair in tickets.windows(2) {
            assert!(pair[0].value <= pair[1].value);
            assert_ne!(pair[0].cmp(&pair[1]), Ordering::Greater);
        }

        // Equal values fall back to the proof for a strict order.
        let mut t1 = tickets[0].clone();
        let t2 = tickets[0].clone();
        t1.proof.virtual_staker_index += 1;
        assert_eq!(t2.cmp(&t1), Ordering::Less);
    }
}
