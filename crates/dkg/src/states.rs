//! The key generation state chain.
//!
//! Fifteen states, initialization through finalization, each with a fixed
//! number of active blocks, a set of accepted message tags, an initiation
//! step that may broadcast, and a successor. The coordinator drives the
//! chain; all protocol data lives in the [`Member`].
//!
//! Work attributed to a phase happens when the phase *initiates*: marking
//! absentees of the previous phase inactive, verifying what arrived, and
//! producing this phase's outbound messages.

use rand::{CryptoRng, RngCore};
use tracing::debug;

use beacon_types::MemberIndex;

use crate::config::ProtocolConfig;
use crate::error::DkgError;
use crate::member::Member;
use crate::messages::{
    MessagePayload, TAG_EPHEMERAL_PUBLIC_KEYS, TAG_JOIN, TAG_MEMBER_COMMITMENTS,
    TAG_PEER_SHARES, TAG_POINTS_ACCUSATIONS, TAG_PUBLIC_KEY_SHARE_POINTS,
    TAG_SECRET_SHARES_ACCUSATIONS, TAG_DISQUALIFIED_EPHEMERAL_KEYS,
};
use crate::messages::JoinPayload;

/// One state of the key generation protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyGenerationState {
    /// Waits out the initial synchronization window; no messages are valid.
    Initialization,
    /// Members announce themselves on the broadcast channel.
    Join,
    /// Members broadcast ephemeral public keys for every other member.
    EphemeralKeyPairGeneration,
    /// Pairwise symmetric keys are derived; absentees become inactive.
    SymmetricKeyGeneration,
    /// Members broadcast encrypted shares and coefficient commitments.
    Commitment,
    /// Received shares are verified; failures are accused publicly.
    CommitmentsVerification,
    /// Accusations are adjudicated from the revealed channel keys.
    SharesJustification,
    /// Surviving shares are combined into the member's secret share.
    Qualification,
    /// Members publish their public key share points.
    PointsShare,
    /// Published points are validated against held shares.
    PointsValidation,
    /// Points accusations are adjudicated.
    PointsJustification,
    /// Keys for dropped members are revealed for reconstruction.
    KeyReveal,
    /// Dropped members' contributions are reconstructed.
    Reconstruction,
    /// The group public key is combined.
    Combination,
    /// Terminal state; the result is ready to emit.
    Finalization,
}

/// Block counts for the states outside the configurable GJKR phases.
const INITIALIZATION_BLOCKS: u64 = 3;
const JOIN_BLOCKS: u64 = 3;

impl KeyGenerationState {
    /// How many block ticks this state stays active.
    pub fn active_blocks(&self, config: &ProtocolConfig) -> u64 {
        match self {
            Self::Initialization => INITIALIZATION_BLOCKS,
            Self::Join => JOIN_BLOCKS,
            Self::Finalization => 0,
            _ => {
                let phase = self.gjkr_phase_index();
                config.blocks_per_phase[phase] as u64
            }
        }
    }

    /// Index into `blocks_per_phase` for the twelve GJKR phases.
    fn gjkr_phase_index(&self) -> usize {
        match self {
            Self::EphemeralKeyPairGeneration => 0,
            Self::SymmetricKeyGeneration => 1,
            Self::Commitment => 2,
            Self::CommitmentsVerification => 3,
            Self::SharesJustification => 4,
            Self::Qualification => 5,
            Self::PointsShare => 6,
            Self::PointsValidation => 7,
            Self::PointsJustification => 8,
            Self::KeyReveal => 9,
            Self::Reconstruction => 10,
            Self::Combination => 11,
            Self::Initialization | Self::Join | Self::Finalization => unreachable!(),
        }
    }

    /// Whether a message with this phase tag is valid in this state.
    pub fn accepts(&self, tag: u8) -> bool {
        match self {
            Self::Join => tag == TAG_JOIN,
            Self::EphemeralKeyPairGeneration => tag == TAG_EPHEMERAL_PUBLIC_KEYS,
            Self::Commitment => tag == TAG_PEER_SHARES || tag == TAG_MEMBER_COMMITMENTS,
            Self::CommitmentsVerification => tag == TAG_SECRET_SHARES_ACCUSATIONS,
            Self::PointsShare => tag == TAG_PUBLIC_KEY_SHARE_POINTS,
            Self::PointsValidation => tag == TAG_POINTS_ACCUSATIONS,
            Self::KeyReveal => tag == TAG_DISQUALIFIED_EPHEMERAL_KEYS,
            _ => false,
        }
    }

    /// Enter the state: settle the previous phase's bookkeeping and produce
    /// the messages to broadcast.
    pub fn initiate<R: RngCore + CryptoRng>(
        &self,
        member: &mut Member,
        rng: &mut R,
    ) -> Result<Vec<MessagePayload>, DkgError> {
        debug!(member = member.index(), state = ?self, "Initiating state");

        match self {
            Self::Initialization => Ok(vec![]),
            Self::Join => {
                member.mark_self_joined();
                Ok(vec![MessagePayload::Join(JoinPayload {
                    sender_index: member.index(),
                })])
            }
            Self::EphemeralKeyPairGeneration => {
                member.mark_inactive_non_joiners();
                let payload = member.generate_ephemeral_keypairs(rng);
                Ok(vec![MessagePayload::EphemeralPublicKeys(payload)])
            }
            Self::SymmetricKeyGeneration => {
                member.derive_symmetric_keys();
                Ok(vec![])
            }
            Self::Commitment => {
                let (shares, commitments) = member.calculate_shares_and_commitments(rng)?;
                Ok(vec![
                    MessagePayload::PeerShares(shares),
                    MessagePayload::MemberCommitments(commitments),
                ])
            }
            Self::CommitmentsVerification => {
                let accusations = member.verify_shares_and_accuse();
                Ok(vec![MessagePayload::SecretSharesAccusations(accusations)])
            }
            Self::SharesJustification => {
                member.resolve_share_accusations();
                Ok(vec![])
            }
            Self::Qualification => {
                member.combine_member_shares();
                Ok(vec![])
            }
            Self::PointsShare => {
                let points = member.calculate_public_key_share_points()?;
                Ok(vec![MessagePayload::PublicKeySharePoints(points)])
            }
            Self::PointsValidation => {
                let accusations = member.validate_share_points();
                Ok(vec![MessagePayload::PointsAccusations(accusations)])
            }
            Self::PointsJustification => {
                member.resolve_points_accusations();
                Ok(vec![])
            }
            Self::KeyReveal => {
                let reveal = member.reveal_disqualified_member_keys();
                Ok(vec![MessagePayload::DisqualifiedEphemeralKeys(reveal)])
            }
            Self::Reconstruction => {
                member.reconstruct_disqualified_contributions();
                Ok(vec![])
            }
            Self::Combination => {
                member.combine_group_public_key()?;
                Ok(vec![])
            }
            Self::Finalization => Ok(vec![]),
        }
    }

    /// Route an accepted message into the member's state.
    ///
    /// Duplicate `(sender, phase)` messages are kept first-wins inside the
    /// member's per-peer slots.
    pub fn receive(&self, member: &mut Member, sender: MemberIndex, payload: MessagePayload) {
        match (self, payload) {
            (Self::Join, MessagePayload::Join(_)) => member.record_join(sender),
            (Self::EphemeralKeyPairGeneration, MessagePayload::EphemeralPublicKeys(p)) => {
                member.record_ephemeral_public_keys(sender, p)
            }
            (Self::Commitment, MessagePayload::PeerShares(p)) => {
                member.record_peer_shares(sender, p)
            }
            (Self::Commitment, MessagePayload::MemberCommitments(p)) => {
                member.record_commitments(sender, p)
            }
            (Self::CommitmentsVerification, MessagePayload::SecretSharesAccusations(p)) => {
                member.record_share_accusations(sender, p)
            }
            (Self::PointsShare, MessagePayload::PublicKeySharePoints(p)) => {
                member.record_share_points(sender, p)
            }
            (Self::PointsValidation, MessagePayload::PointsAccusations(p)) => {
                member.record_points_accusations(sender, p)
            }
            (Self::KeyReveal, MessagePayload::DisqualifiedEphemeralKeys(p)) => {
                member.record_revealed_keys(sender, p)
            }
            _ => {}
        }
    }

    /// The successor state; `None` from the terminal state.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Initialization => Some(Self::Join),
            Self::Join => Some(Self::EphemeralKeyPairGeneration),
            Self::EphemeralKeyPairGeneration => Some(Self::SymmetricKeyGeneration),
            Self::SymmetricKeyGeneration => Some(Self::Commitment),
            Self::Commitment => Some(Self::CommitmentsVerification),
            Self::CommitmentsVerification => Some(Self::SharesJustification),
            Self::SharesJustification => Some(Self::Qualification),
            Self::Qualification => Some(Self::PointsShare),
            Self::PointsShare => Some(Self::PointsValidation),
            Self::PointsValidation => Some(Self::PointsJustification),
            Self::PointsJustification => Some(Self::KeyReveal),
            Self::KeyReveal => Some(Self::Reconstruction),
            Self::Reconstruction => Some(Self::Combination),
            Self::Combination => Some(Self::Finalization),
            Self::Finalization => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalization)
    }
}
