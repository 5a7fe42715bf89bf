//! Typed wire messages and the deterministic envelope codec.
//!
//! Every message travels as
//!
//! `session_id [32] ‖ sender_index [u32 LE] ‖ phase_tag [u8] ‖ payload`
//!
//! with the payload borsh-encoded (maps as `BTreeMap`, so encoding is
//! deterministic and length-prefixed). Unknown phase tags decode to `None`
//! and are silently dropped by the coordinator.

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};

use beacon_types::{G2Point, MemberIndex, SessionId};

use crate::error::DkgError;

pub const TAG_JOIN: u8 = 0x01;
pub const TAG_EPHEMERAL_PUBLIC_KEYS: u8 = 0x02;
pub const TAG_PEER_SHARES: u8 = 0x03;
pub const TAG_MEMBER_COMMITMENTS: u8 = 0x04;
pub const TAG_SECRET_SHARES_ACCUSATIONS: u8 = 0x05;
pub const TAG_PUBLIC_KEY_SHARE_POINTS: u8 = 0x06;
pub const TAG_POINTS_ACCUSATIONS: u8 = 0x07;
pub const TAG_DISQUALIFIED_EPHEMERAL_KEYS: u8 = 0x08;

/// Announcement of presence in the key generation channel.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct JoinPayload {
    pub sender_index: MemberIndex,
}

/// Ephemeral public keys, one per other member of the group.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EphemeralPublicKeysPayload {
    /// receiver index -> compressed secp256k1 public key
    pub keys: BTreeMap<MemberIndex, [u8; 33]>,
}

/// One AES-256-GCM encrypted share pair.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EncryptedSharesEntry {
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

/// Encrypted secret shares, one per other member of the group.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PeerSharesPayload {
    /// receiver index -> encrypted (share, blinding share) pair
    pub shares: BTreeMap<MemberIndex, EncryptedSharesEntry>,
}

/// Pedersen commitments to the sender's polynomial coefficients.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct MemberCommitmentsPayload {
    /// C_0 .. C_T
    pub commitments: Vec<G2Point>,
}

/// Accusations of invalid secret shares, with the accuser-side ephemeral
/// private key revealed so the whole group can adjudicate.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SecretSharesAccusationsPayload {
    /// accused index -> accuser's ephemeral private key for the accused
    pub accusations: BTreeMap<MemberIndex, [u8; 32]>,
}

/// Feldman public key share points A_0 .. A_T of the sender.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PublicKeySharePointsPayload {
    pub points: Vec<G2Point>,
}

/// Accusations of inconsistent public key share points.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PointsAccusationsPayload {
    pub accused: BTreeSet<MemberIndex>,
}

/// Ephemeral private keys the sender had generated for now-disqualified
/// members, revealed for share reconstruction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DisqualifiedEphemeralKeysPayload {
    /// disqualified index -> revealer's ephemeral private key for them
    pub private_keys: BTreeMap<MemberIndex, [u8; 32]>,
}

/// The payload of a protocol message, tagged by phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessagePayload {
    Join(JoinPayload),
    EphemeralPublicKeys(EphemeralPublicKeysPayload),
    PeerShares(PeerSharesPayload),
    MemberCommitments(MemberCommitmentsPayload),
    SecretSharesAccusations(SecretSharesAccusationsPayload),
    PublicKeySharePoints(PublicKeySharePointsPayload),
    PointsAccusations(PointsAccusationsPayload),
    DisqualifiedEphemeralKeys(DisqualifiedEphemeralKeysPayload),
}

impl MessagePayload {
    pub fn phase_tag(&self) -> u8 {
        match self {
            Self::Join(_) => TAG_JOIN,
            Self::EphemeralPublicKeys(_) => TAG_EPHEMERAL_PUBLIC_KEYS,
            Self::PeerShares(_) => TAG_PEER_SHARES,
            Self::MemberCommitments(_) => TAG_MEMBER_COMMITMENTS,
            Self::SecretSharesAccusations(_) => TAG_SECRET_SHARES_ACCUSATIONS,
            Self::PublicKeySharePoints(_) => TAG_PUBLIC_KEY_SHARE_POINTS,
            Self::PointsAccusations(_) => TAG_POINTS_ACCUSATIONS,
            Self::DisqualifiedEphemeralKeys(_) => TAG_DISQUALIFIED_EPHEMERAL_KEYS,
        }
    }

    fn serialize_into(&self, out: &mut Vec<u8>) -> Result<(), DkgError> {
        let result = match self {
            Self::Join(p) => borsh::to_writer(&mut *out, p),
            Self::EphemeralPublicKeys(p) => borsh::to_writer(&mut *out, p),
            Self::PeerShares(p) => borsh::to_writer(&mut *out, p),
            Self::MemberCommitments(p) => borsh::to_writer(&mut *out, p),
            Self::SecretSharesAccusations(p) => borsh::to_writer(&mut *out, p),
            Self::PublicKeySharePoints(p) => borsh::to_writer(&mut *out, p),
            Self::PointsAccusations(p) => borsh::to_writer(&mut *out, p),
            Self::DisqualifiedEphemeralKeys(p) => borsh::to_writer(&mut *out, p),
        };
        result.map_err(|_| DkgError::MalformedMessage)
    }
}

/// A protocol message as it travels over the broadcast channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireMessage {
    pub session_id: SessionId,
    pub sender: MemberIndex,
    pub payload: MessagePayload,
}

impl WireMessage {
    pub fn new(session_id: SessionId, sender: MemberIndex, payload: MessagePayload) -> Self {
        Self {
            session_id,
            sender,
            payload,
        }
    }

    /// Encode the envelope and payload into bytes.
    pub fn encode(&self) -> Result<Vec<u8>, DkgError> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.session_id.0);
        out.extend_from_slice(&self.sender.to_le_bytes());
        out.push(self.payload.phase_tag());
        self.payload.serialize_into(&mut out)?;
        Ok(out)
    }

    /// Decode a message from bytes.
    ///
    /// Returns `Ok(None)` for an unknown phase tag; any other malformation
    /// is an error. Trailing bytes after the payload are rejected.
    pub fn decode(bytes: &[u8]) -> Result<Option<Self>, DkgError> {
        if bytes.len() < 32 + 4 + 1 {
            return Err(DkgError::MalformedMessage);
        }

        let mut session_id = [0u8; 32];
        session_id.copy_from_slice(&bytes[..32]);

        let mut sender_bytes = [0u8; 4];
        sender_bytes.copy_from_slice(&bytes[32..36]);
        let sender = MemberIndex::from_le_bytes(sender_bytes);

        let tag = bytes[36];
        let body = &bytes[37..];

        let payload = match tag {
            TAG_JOIN => MessagePayload::Join(decode_payload(body)?),
            TAG_EPHEMERAL_PUBLIC_KEYS => {
                MessagePayload::EphemeralPublicKeys(decode_payload(body)?)
            }
            TAG_PEER_SHARES => MessagePayload::PeerShares(decode_payload(body)?),
            TAG_MEMBER_COMMITMENTS => MessagePayload::MemberCommitments(decode_payload(body)?),
            TAG_SECRET_SHARES_ACCUSATIONS => {
                MessagePayload::SecretSharesAccusations(decode_payload(body)?)
            }
            TAG_PUBLIC_KEY_SHARE_POINTS => {
                MessagePayload::PublicKeySharePoints(decode_payload(body)?)
            }
            TAG_POINTS_ACCUSATIONS => MessagePayload::PointsAccusations(decode_payload(body)?),
            TAG_DISQUALIFIED_EPHEMERAL_KEYS => {
                MessagePayload::DisqualifiedEphemeralKeys(decode_payload(body)?)
            }
            _ => return Ok(None),
        };

        Ok(Some(Self {
            session_id: SessionId(session_id),
            sender,
            payload,
        }))
    }
}

fn decode_payload<T: BorshDeserialize>(bytes: &[u8]) -> Result<T, DkgError> {
    T::try_from_slice(bytes).map_err(|_| DkgError::MalformedMessage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId([0x42; 32])
    }

    fn roundtrip(payload: MessagePayload) {
        let msg = WireMessage::new(session(), 3, payload);
        let bytes = msg.encode().unwrap();
        let decoded = WireMessage::decode(&bytes).unwrap().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_roundtrip_join() {
        roundtrip(MessagePayload::Join(JoinPayload { sender_index: 3 }));
    }

    #[test]
    fn test_roundtrip_ephemeral_public_keys() {
        let mut keys = BTreeMap::new();
        keys.insert(1, [0x02; 33]);
        keys.insert(2, [0x03; 33]);
        roundtrip(MessagePayload::EphemeralPublicKeys(
            EphemeralPublicKeysPayload { keys },
        ));
    }

    #[test]
    fn test_roundtrip_peer_shares() {
        let mut shares = BTreeMap::new();
        shares.insert(
            4,
            EncryptedSharesEntry {
                nonce: [7u8; 12],
                ciphertext: vec![1, 2, 3, 4, 5],
            },
        );
        roundtrip(MessagePayload::PeerShares(PeerSharesPayload { shares }));
    }

    #[test]
    fn test_roundtrip_member_commitments() {
        roundtrip(MessagePayload::MemberCommitments(MemberCommitmentsPayload {
            commitments: vec![G2Point([5u8; 96]), G2Point([6u8; 96])],
        }));
    }

    #[test]
    fn test_roundtrip_secret_shares_accusations() {
        let mut accusations = BTreeMap::new();
        accusations.insert(2, [9u8; 32]);
        roundtrip(MessagePayload::SecretSharesAccusations(
            SecretSharesAccusationsPayload { accusations },
        ));
    }

    #[test]
    fn test_roundtrip_public_key_share_points() {
        roundtrip(MessagePayload::PublicKeySharePoints(
            PublicKeySharePointsPayload {
                points: vec![G2Point([8u8; 96])],
            },
        ));
    }

    #[test]
    fn test_roundtrip_points_accusations() {
        let accused: BTreeSet<MemberIndex> = [1, 4].into_iter().collect();
        roundtrip(MessagePayload::PointsAccusations(PointsAccusationsPayload {
            accused,
        }));
    }

    #[test]
    fn test_roundtrip_disqualified_ephemeral_keys() {
        let mut private_keys = BTreeMap::new();
        private_keys.insert(5, [3u8; 32]);
        roundtrip(MessagePayload::DisqualifiedEphemeralKeys(
            DisqualifiedEphemeralKeysPayload { private_keys },
        ));
    }

    #[test]
    fn test_unknown_tag_is_dropped() {
        let msg = WireMessage::new(session(), 1, MessagePayload::Join(JoinPayload {
            sender_index: 1,
        }));
        let mut bytes = msg.encode().unwrap();
        bytes[36] = 0x7f;
        assert!(WireMessage::decode(&bytes).unwrap().is_none());
    }

    #[test]
    fn test_truncated_message_is_an_error() {
        let msg = WireMessage::new(session(), 1, MessagePayload::Join(JoinPayload {
            sender_index: 1,
        }));
        let bytes = msg.encode().unwrap();
        assert!(WireMessage::decode(&bytes[..20]).is_err());
        assert!(WireMessage::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_phase_tags_match_wire_table() {
        assert_eq!(
            MessagePayload::Join(JoinPayload { sender_index: 1 }).phase_tag(),
            0x01
        );
        assert_eq!(
            MessagePayload::DisqualifiedEphemeralKeys(DisqualifiedEphemeralKeysPayload {
                private_keys: BTreeMap::new(),
            })
            .phase_tag(),
            0x08
        );
    }
}
