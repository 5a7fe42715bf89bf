//! Error types for the distributed key generation protocol.

use std::fmt;

use thiserror::Error;

use beacon_crypto::CryptoError;
use beacon_types::MemberIndex;

/// Errors during a DKG session.
///
/// A single bad peer never aborts a session: peer misbehavior is recorded in
/// the disqualified set and the protocol continues. Only structural failures
/// (invalid configuration, channel death, qualified-set collapse) are fatal.
#[derive(Debug, Error)]
pub enum DkgError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Cryptographic operation failed: {0}")]
    CryptoFailure(#[from] CryptoError),

    #[error("Peer misbehavior ({kind}) by member {peer}")]
    PeerMisbehavior {
        kind: MisbehaviorKind,
        peer: MemberIndex,
    },

    #[error("Broadcast channel failure: {0}")]
    ChannelFailure(String),

    #[error("Session aborted: {reason}")]
    SessionAborted { reason: String },

    #[error("Malformed message")]
    MalformedMessage,

    #[error("Protocol phase out of order")]
    PhaseOutOfOrder,
}

/// Classification of accusation-worthy peer behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisbehaviorKind {
    /// A privately-sent share failed the commitment equation
    InvalidShare,
    /// Published public key share points are inconsistent with the shares
    InvalidPoints,
    /// An accusation that named the accuser itself or an invalid member
    InvalidAccusation,
    /// A revealed ephemeral key does not match its announcement
    InvalidKeyReveal,
}

impl fmt::Display for MisbehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidShare => "invalid share",
            Self::InvalidPoints => "invalid public key share points",
            Self::InvalidAccusation => "invalid accusation",
            Self::InvalidKeyReveal => "invalid key reveal",
        };
        f.write_str(label)
    }
}
